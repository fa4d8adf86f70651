//! Warehouse client abstraction.
//!
//! The executor only needs two operations: run a statement, and run a
//! query that returns rows. Concrete drivers live outside this crate;
//! tests use an in-memory recording client.

use async_trait::async_trait;
use thiserror::Error;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by a warehouse client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The statement was rejected or failed mid-execution.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The warehouse connection is gone.
    #[error("connection error: {0}")]
    Connection(String),

    /// Statement ran past the client's deadline.
    #[error("statement timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// An async connection to a SQL warehouse.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Execute a statement, discarding any result rows.
    async fn execute(&self, sql: &str) -> Result<(), ClientError>;

    /// Execute a query and collect its rows.
    async fn execute_returning_rows(&self, sql: &str) -> Result<Vec<Row>, ClientError>;
}
