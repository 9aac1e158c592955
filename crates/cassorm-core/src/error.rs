//! Core error types.

use thiserror::Error;

/// Compilation errors.
///
/// Every variant is raised before a statement reaches the store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Bad model definition.
    #[error("schema error: {0}")]
    Schema(String),

    /// Criteria, record or sort references a name the schema does not know.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// Two bounds on the same side of a range.
    #[error("mutually exclusive operators '{first}' and '{second}' on '{field}'")]
    ConflictingOperator {
        /// Attribute the bounds were given for.
        field: String,
        /// Operator seen first.
        first: String,
        /// Operator that collided with it.
        second: String,
    },

    /// Attempt to assign a generated or key attribute.
    #[error("key attribute '{0}' cannot be assigned")]
    ImmutableKey(String),

    /// Insert without a required key attribute.
    #[error("missing key attribute '{0}' in the insert request")]
    MissingKey(String),

    /// Unrecognised attribute type name.
    #[error("unsupported type '{0}'")]
    UnsupportedType(String),

    /// Operator token that is neither a comparison nor an alias of one.
    #[error("unsupported operator '{op}' on '{field}'")]
    UnsupportedOperator {
        /// Attribute the operator was given for.
        field: String,
        /// Operator as written.
        op: String,
    },

    /// Comparison operand that is not a string or a number.
    #[error("invalid operand {value} for '{op}' on '{field}'")]
    InvalidOperand {
        /// Attribute the operand was given for.
        field: String,
        /// Normalised operator.
        op: String,
        /// Offending operand.
        value: String,
    },

    /// Value that cannot be converted to the column's native type.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Malformed caller input.
    #[error("protocol error: {0}")]
    Protocol(#[from] cassorm_proto::Error),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
