//! Protocol error types.

use thiserror::Error;

/// Errors raised while normalising caller-supplied shapes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Criteria object has the wrong shape.
    #[error("invalid criteria: {0}")]
    InvalidCriteria(String),

    /// Record is not an object.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Sort specification could not be understood.
    #[error("invalid sort: {0}")]
    InvalidSort(String),
}
