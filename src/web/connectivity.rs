//! `GET /`: database connectivity check.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::db;
use crate::state::AppState;
use crate::utils::fmt_duration;

pub const CONNECTED_MESSAGE: &str = "Database connected successfully";

/// Outcome of a connectivity check. Serializes to exactly one of
/// `{"message": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConnectivityReport {
    Connected { message: String },
    Failed { error: String },
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Run one connectivity check against the session provider, bounded by `limit`.
///
/// Every failure collapses into [`ConnectivityReport::Failed`] carrying the
/// error's display text; the structured error only goes to the log. A check
/// that outlives `limit` is abandoned (dropping its session) and reported the
/// same way.
pub async fn check(provider: &dyn db::SessionProvider, limit: Duration) -> ConnectivityReport {
    match tokio::time::timeout(limit, db::ping(provider)).await {
        Ok(Ok(())) => {
            debug!("database connectivity check passed");
            ConnectivityReport::Connected {
                message: CONNECTED_MESSAGE.to_string(),
            }
        }
        Err(_) => {
            let limit = fmt_duration(limit);
            warn!(limit = %limit, "database connectivity check timed out");
            ConnectivityReport::Failed {
                error: format!("database connectivity check timed out after {limit}"),
            }
        }
        Ok(Err(e)) => {
            warn!(error = ?e, "database connectivity check failed");
            let mut error = e.to_string();
            if error.is_empty() {
                error = format!("{e:?}");
            }
            ConnectivityReport::Failed { error }
        }
    }
}

/// Always answers 200; callers inspect the body to tell success from failure.
pub(super) async fn connectivity(State(state): State<AppState>) -> Json<ConnectivityReport> {
    Json(check(state.sessions.as_ref(), state.check_timeout).await)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{DbError, Session, SessionProvider};
    use crate::web::create_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Which step of the check a stub provider should fail at.
    #[derive(Clone, Copy)]
    pub(crate) enum Behavior {
        Healthy,
        AcquireFails,
        ExecuteFails,
        /// `execute` never finishes within any test's time limit.
        Stalls,
    }

    pub(crate) struct StubProvider {
        behavior: Behavior,
        pub(crate) statements: Arc<std::sync::Mutex<Vec<String>>>,
        pub(crate) released: Arc<AtomicUsize>,
    }

    impl StubProvider {
        pub(crate) fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                statements: Arc::default(),
                released: Arc::default(),
            }
        }
    }

    struct StubSession {
        behavior: Behavior,
        statements: Arc<std::sync::Mutex<Vec<String>>>,
        released: Arc<AtomicUsize>,
    }

    impl Drop for StubSession {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionProvider for StubProvider {
        async fn session(&self) -> Result<Box<dyn Session>, DbError> {
            match self.behavior {
                Behavior::AcquireFails => Err(DbError::Database(sqlx::Error::PoolTimedOut)),
                behavior => Ok(Box::new(StubSession {
                    behavior,
                    statements: self.statements.clone(),
                    released: self.released.clone(),
                })),
            }
        }
    }

    #[async_trait]
    impl Session for StubSession {
        async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
            self.statements
                .lock()
                .unwrap()
                .push(statement.to_string());
            match self.behavior {
                Behavior::ExecuteFails => Err(DbError::Database(sqlx::Error::Protocol(
                    "password authentication failed for user \"app\"".into(),
                ))),
                Behavior::Stalls => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(1)
                }
                _ => Ok(1),
            }
        }
    }

    pub(crate) fn router_with(provider: StubProvider) -> axum::Router {
        router_with_timeouts(provider, Duration::from_secs(1), Duration::from_secs(5))
    }

    fn router_with_timeouts(
        provider: StubProvider,
        check_timeout: Duration,
        request_timeout: Duration,
    ) -> axum::Router {
        let state = AppState::new(Arc::new(provider), check_timeout);
        create_router(state, request_timeout)
    }

    async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn reports_success_when_query_runs() {
        let provider = StubProvider::new(Behavior::Healthy);
        let statements = provider.statements.clone();
        let released = provider.released.clone();

        let (status, body) = get_json(router_with(provider), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Database connected successfully" }));
        assert_eq!(*statements.lock().unwrap(), vec!["SELECT 1".to_string()]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_failure_is_reported_with_ok_status() {
        let provider = StubProvider::new(Behavior::ExecuteFails);
        let released = provider.released.clone();

        let (status, body) = get_json(router_with(provider), "/").await;

        assert_eq!(status, StatusCode::OK);
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        let error = object["error"].as_str().unwrap();
        assert!(error.contains("password authentication failed"));
        // Session is released on the failure path too.
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquire_failure_is_reported_with_ok_status() {
        let (status, body) =
            get_json(router_with(StubProvider::new(Behavior::AcquireFails)), "/").await;

        assert_eq!(status, StatusCode::OK);
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(!object["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn query_parameters_are_ignored() {
        let (_, plain) = get_json(router_with(StubProvider::new(Behavior::Healthy)), "/").await;
        let (_, with_query) = get_json(
            router_with(StubProvider::new(Behavior::Healthy)),
            "/?verbose=true&db=other",
        )
        .await;
        assert_eq!(plain, with_query);
    }

    #[tokio::test]
    async fn repeated_checks_give_the_same_outcome() {
        let router = router_with(StubProvider::new(Behavior::ExecuteFails));
        let (_, first) = get_json(router.clone(), "/").await;
        let (_, second) = get_json(router, "/").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn stalled_query_is_reported_before_the_request_times_out() {
        let provider = StubProvider::new(Behavior::Stalls);
        let released = provider.released.clone();
        let router = router_with_timeouts(
            provider,
            Duration::from_millis(50),
            Duration::from_millis(500),
        );

        let (status, body) = get_json(router, "/").await;

        assert_eq!(status, StatusCode::OK);
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert!(object["error"].as_str().unwrap().contains("timed out"));
        // Abandoning the check drops its session.
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn report_serializes_to_a_single_key() {
        let connected = serde_json::to_value(ConnectivityReport::Connected {
            message: CONNECTED_MESSAGE.to_string(),
        })
        .unwrap();
        assert_eq!(connected, json!({ "message": CONNECTED_MESSAGE }));

        let failed = serde_json::to_value(ConnectivityReport::Failed {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(failed, json!({ "error": "boom" }));
    }
}
