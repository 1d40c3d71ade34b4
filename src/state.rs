//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::db::SessionProvider;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionProvider>,
    /// Bound on a single connectivity check.
    pub check_timeout: Duration,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionProvider>, check_timeout: Duration) -> Self {
        Self {
            sessions,
            check_timeout,
        }
    }
}
