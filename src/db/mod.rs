//! Database session abstraction.
//!
//! Handlers never touch the pool directly: they ask a [`SessionProvider`] for a
//! request-scoped [`Session`] and drop it when done. Dropping the session
//! returns the underlying connection to the pool on every path.

pub mod postgres;

use async_trait::async_trait;

pub use postgres::PgSessionProvider;

/// Trivial statement used to verify the database is reachable and answering.
pub const PING_STATEMENT: &str = "SELECT 1";

/// Errors raised while acquiring a session or executing a statement.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DATABASE_URL` could not be parsed into connection options.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Yields database sessions scoped to a single request.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(&self) -> Result<Box<dyn Session>, DbError>;
}

/// A live database session.
#[async_trait]
pub trait Session: Send {
    /// Execute one statement, returning the number of rows affected.
    async fn execute(&mut self, statement: &str) -> Result<u64, DbError>;
}

/// Acquire a session and run [`PING_STATEMENT`] against it.
///
/// Acquisition and execution failures both surface as the returned error.
pub async fn ping(provider: &dyn SessionProvider) -> Result<(), DbError> {
    let mut session = provider.session().await?;
    session.execute(PING_STATEMENT).await?;
    Ok(())
}
