//! Client error types.

use thiserror::Error;

use crate::session::StoreError;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection registered without an identity.
    #[error("connection is missing an identity")]
    IdentityMissing,

    /// Connection identity already registered.
    #[error("connection '{0}' is already registered")]
    IdentityDuplicate(String),

    /// No connection registered under this identity.
    #[error("invalid connection '{0}'")]
    InvalidConnection(String),

    /// Connection exists but the collection was not registered with it.
    #[error("collection '{collection}' is not registered with connection '{connection}'")]
    CollectionNotRegistered {
        /// Connection identity.
        connection: String,
        /// Collection identity.
        collection: String,
    },

    /// Bad connection configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Schema or criteria compilation failed; nothing reached the store.
    #[error(transparent)]
    Compile(#[from] cassorm_core::Error),

    /// Error reported by the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed caller input.
    #[error("protocol error: {0}")]
    Protocol(#[from] cassorm_proto::Error),

    /// The receiving end of a row sink went away.
    #[error("stream receiver dropped")]
    Stream,
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
