//! Postgres-backed session provider.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use super::{DbError, Session, SessionProvider};
use crate::config::Config;
use crate::utils::fmt_duration;

/// Hands out pooled Postgres connections as sessions.
///
/// The pool connects lazily, so constructing the provider never touches the
/// network. A `DATABASE_URL` that fails to parse is kept as an error and
/// reported on every session request instead of aborting startup.
#[derive(Clone)]
pub struct PgSessionProvider {
    pool: Result<PgPool, String>,
}

impl PgSessionProvider {
    /// Build a provider from application configuration.
    pub fn from_config(config: &Config) -> Self {
        let pool = PgConnectOptions::from_str(&config.database_url)
            .map(|options| {
                let options = options
                    .log_statements(tracing::log::LevelFilter::Debug)
                    .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));
                Self::pool_options(config).connect_lazy_with(options)
            })
            .map_err(|e| e.to_string());

        match &pool {
            Ok(_) => info!(
                min_connections = 0,
                max_connections = config.db_max_connections,
                acquire_timeout = fmt_duration(config.db_acquire_timeout),
                idle_timeout = "2m",
                max_lifetime = "30m",
                "database pool configured"
            ),
            Err(e) => warn!(error = %e, "DATABASE_URL is invalid; connectivity checks will fail"),
        }

        Self { pool }
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool: Ok(pool) }
    }

    fn pool_options(config: &Config) -> PgPoolOptions {
        PgPoolOptions::new()
            .min_connections(0)
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        if let Ok(pool) = &self.pool {
            pool.close().await;
        }
    }
}

#[async_trait]
impl SessionProvider for PgSessionProvider {
    async fn session(&self) -> Result<Box<dyn Session>, DbError> {
        let pool = self
            .pool
            .as_ref()
            .map_err(|e| DbError::InvalidUrl(e.clone()))?;
        let conn = pool.acquire().await?;
        Ok(Box::new(PgSession { conn }))
    }
}

/// A pooled connection; returned to the pool on drop.
struct PgSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl Session for PgSession {
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError> {
        let result = sqlx::query(statement).execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }
}
