//! Liveness and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::state::AppState;
use crate::web::connectivity;

/// Database reachability as reported by `/status`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Error,
}

#[derive(Serialize)]
pub struct StatusResponse {
    version: &'static str,
    commit: &'static str,
    database: DatabaseStatus,
}

/// Liveness probe; never touches the database.
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Build metadata plus a fresh connectivity check.
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let report = connectivity::check(state.sessions.as_ref(), state.check_timeout).await;
    let database = if report.is_connected() {
        DatabaseStatus::Connected
    } else {
        DatabaseStatus::Error
    };

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_HASH"),
        database,
    })
}
