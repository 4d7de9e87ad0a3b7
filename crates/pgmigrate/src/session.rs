//! The narrow slice of a database session the migrator needs.

use async_trait::async_trait;
use thiserror::Error;

/// An error from the underlying database session, reduced to its display
/// text.
///
/// The driver's error values are internal details we do not want to support
/// as part of this crate's API, so they are repackaged as text at the seam.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SessionError(pub String);

impl From<tokio_postgres::Error> for SessionError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self(err.to_string())
    }
}

/// The database capabilities the migration engine uses.
///
/// Implemented for [`tokio_postgres::Client`]; tests substitute an in-memory
/// fake. A `Session` must wrap exactly one database connection — the
/// advisory lock taken through it belongs to that connection for its
/// lifetime, so handing out pooled connections here would release the lock
/// to the wrong owner.
#[async_trait]
pub trait Session: Send + Sync {
    /// Execute one or more semicolon-terminated statements in a single call.
    async fn batch_execute(&self, sql: &str) -> Result<(), SessionError>;

    /// Execute a single statement, binding one text parameter as `$1`.
    async fn execute_with_text(&self, sql: &str, value: &str) -> Result<(), SessionError>;

    /// Run a query that returns a single boolean scalar.
    async fn query_scalar_bool(&self, sql: &str) -> Result<bool, SessionError>;

    /// Run a query that returns a single text scalar.
    async fn query_scalar_text(&self, sql: &str) -> Result<String, SessionError>;
}

#[async_trait]
impl Session for tokio_postgres::Client {
    async fn batch_execute(&self, sql: &str) -> Result<(), SessionError> {
        tokio_postgres::Client::batch_execute(self, sql).await?;
        Ok(())
    }

    async fn execute_with_text(&self, sql: &str, value: &str) -> Result<(), SessionError> {
        self.execute(sql, &[&value]).await?;
        Ok(())
    }

    async fn query_scalar_bool(&self, sql: &str) -> Result<bool, SessionError> {
        let row = self.query_one(sql, &[]).await?;
        row.try_get(0).map_err(SessionError::from)
    }

    async fn query_scalar_text(&self, sql: &str) -> Result<String, SessionError> {
        let row = self.query_one(sql, &[]).await?;
        row.try_get(0).map_err(SessionError::from)
    }
}
