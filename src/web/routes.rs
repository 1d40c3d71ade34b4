//! Web router construction.

use axum::{Router, http::StatusCode, routing::get};
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::middleware::security_headers::SecurityHeadersLayer;
use crate::web::{connectivity, status};

/// Creates the web server router
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/", get(connectivity::connectivity))
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .with_state(app_state);

    router.layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        SecurityHeadersLayer,
        // Backstop only: the connectivity check has its own shorter bound.
        TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout),
    ))
}
