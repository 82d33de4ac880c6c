use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::allocator::TokenScope;
use crate::errors::AppError;
use crate::store::{AllocationFilter, AllocationRecord};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize, Default)]
pub struct IssueParams {
    pub prefix: Option<String>,
}

#[derive(Serialize)]
pub struct IssueResponse {
    pub success: bool,
    pub token: String,
    pub year: i32,
    pub month: String,
    pub serial: i64,
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub prefix: Option<String>,
    pub year: Option<i32>,
    pub month: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /issue — authorize the caller, derive the current scope from server
/// time, and allocate the next serial. Exactly one allocation record is
/// created per success; none on any error path.
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<IssueParams>,
    body: Option<Json<IssueParams>>,
) -> Result<Json<IssueResponse>, AppError> {
    let admin = state.gate.authorize(&headers).await?;

    // Prefix comes from the JSON body or the query string; year/month never
    // do — callers must not spoof scope boundaries.
    let prefix = body
        .and_then(|Json(b)| b.prefix)
        .or(query.prefix)
        .ok_or_else(|| AppError::BadRequest("prefix is required".into()))?;

    let scope = TokenScope::current(&prefix)?;
    let allocation = state.allocator.allocate(&scope, &admin.principal_id).await?;

    tracing::info!(
        token = %allocation.token,
        issued_by = %admin.principal_id,
        "registration token issued"
    );

    Ok(Json(IssueResponse {
        success: true,
        token: allocation.token,
        year: allocation.year,
        month: allocation.month,
        serial: allocation.serial,
    }))
}

/// OPTIONS /issue — CORS preflight from the admin panel.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// GET /tokens — admin-gated listing of issued tokens for the panel's table
/// and export views.
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AllocationRecord>>, AppError> {
    state.gate.authorize(&headers).await?;

    let filter = AllocationFilter {
        prefix: params.prefix,
        year: params.year,
        month: params.month,
    };
    let records = state.store.list_allocations(&filter).await?;
    Ok(Json(records))
}
