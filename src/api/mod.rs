use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Build the service router.
///
/// The admin panel calls `/issue` cross-origin, so every response carries
/// permissive CORS headers and bare `OPTIONS /issue` is answered with 204.
/// The headers are attached by `cross_origin` below rather than a CORS layer:
/// a layer would answer OPTIONS itself before the 204 route is reached.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route(
            "/issue",
            post(handlers::issue_token).options(handlers::preflight),
        )
        .route("/tokens", get(handlers::list_tokens))
        .with_state(state)
        .layer(middleware::from_fn(cross_origin))
        .layer(TraceLayer::new_for_http())
}

/// Attach permissive CORS headers to every response, preflight included.
async fn cross_origin(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    response
}

async fn readiness_check() -> &'static str {
    "ok"
}
