//! Store session interface.
//!
//! The adapter never talks to the wire itself. A [`Connector`] turns a
//! [`ConnectionConfig`] into a shared [`Session`], and every collection on
//! that connection submits statements through it concurrently, so
//! implementations must be safe to share.

mod recording;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;

use cassorm_proto::{CompiledStatement, Row, RowSet};

use crate::config::ConnectionConfig;

pub use recording::{Recorded, RecordingConnector, RecordingSession};

/// Category of a store error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The addressed object does not exist.
    NotFound,
    /// The object to create already exists.
    AlreadyExists,
    /// The store rejected the statement.
    Invalid,
    /// No node could serve the request.
    Unavailable,
    /// The store did not answer in time.
    Timeout,
    /// Anything else.
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreErrorKind::NotFound => "not found",
            StoreErrorKind::AlreadyExists => "already exists",
            StoreErrorKind::Invalid => "invalid request",
            StoreErrorKind::Unavailable => "unavailable",
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Other => "error",
        })
    }
}

/// Error reported by a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    /// Error category.
    pub kind: StoreErrorKind,
    /// Message from the store.
    pub message: String,
}

impl StoreError {
    /// Create a store error.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The addressed object does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    /// Whether the error only says the target is already gone.
    pub fn is_absent(&self) -> bool {
        self.kind == StoreErrorKind::NotFound
    }
}

/// Forward-only sequence of rows.
pub type RowStream = BoxStream<'static, Result<Row, StoreError>>;

/// An open session to the store.
#[async_trait]
pub trait Session: Send + Sync {
    /// Keyspace the session is bound to.
    fn keyspace(&self) -> Option<&str>;

    /// Execute one statement and collect its rows.
    async fn execute(&self, statement: &CompiledStatement) -> Result<RowSet, StoreError>;

    /// Execute statements as one batch, in order.
    async fn batch(&self, statements: &[CompiledStatement]) -> Result<(), StoreError>;

    /// Execute one statement and yield its rows as they arrive.
    async fn stream(&self, statement: &CompiledStatement) -> Result<RowStream, StoreError>;

    /// Feed every row to `on_row` with its index and return the row count.
    async fn each_row(
        &self,
        statement: &CompiledStatement,
        on_row: &mut (dyn FnMut(usize, Row) + Send),
    ) -> Result<usize, StoreError> {
        let mut rows = self.stream(statement).await?;
        let mut count = 0;
        while let Some(row) = rows.next().await {
            on_row(count, row?);
            count += 1;
        }
        Ok(count)
    }

    /// Release the session. Calling it again is a no-op.
    async fn shutdown(&self) -> Result<(), StoreError>;
}

/// Opens sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and authenticate.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Session>, StoreError>;
}
