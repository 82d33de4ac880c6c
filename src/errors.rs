use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing or invalid credential")]
    Unauthenticated,

    #[error("caller is not a registered administrator")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("allocation conflicted with a concurrent request")]
    TransactionConflict,

    #[error("sequence store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AppError::TransactionConflict,
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, msg) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "missing or invalid credential".to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "caller is not a registered administrator".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::TransactionConflict => {
                // Only surfaced after the allocator's retries are exhausted.
                tracing::warn!("allocation retries exhausted under contention");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "token allocation did not complete; please retry".to_string(),
                )
            }
            AppError::StoreUnavailable(e) => {
                tracing::error!("sequence store unavailable: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "token allocation did not complete; please retry".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": kind,
            "message": msg,
        }));

        (status, body).into_response()
    }
}
