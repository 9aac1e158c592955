//! cassorm protocol types.
//!
//! Shared vocabulary between the statement compilers and the store session:
//!
//! - [`value`] - native values, rows and generic records
//! - [`criteria`] - normalised criteria trees
//! - [`statement`] - compiled statements, batches and raw queries
//! - [`error`] - shape errors raised while normalising caller input

pub mod criteria;
pub mod error;
pub mod statement;
pub mod value;

pub use criteria::{Criteria, CriteriaNode, CriteriaValue, SortDirection, SortSpec};
pub use error::Error;
pub use statement::{Batch, CompiledStatement, RawQuery, StatementKind};
pub use value::{NativeValue, Record, Row, RowSet};

/// Generic attribute value as the ORM sees it.
pub use serde_json::Value;
