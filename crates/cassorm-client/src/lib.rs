//! cassorm client - runs compiled statements against a Cassandra-family
//! store.
//!
//! - [`Session`] / [`Connector`] - the store interface the adapter consumes
//! - [`Collection`] - per-model execution facade
//! - [`Adapter`] - connection registry and the operation surface the ORM calls
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use cassorm_client::{Adapter, ConnectionConfig};
//! use cassorm_core::ModelDef;
//!
//! let adapter = Adapter::new(Arc::new(my_connector));
//! let user = ModelDef::from_json(&model_json)?;
//! adapter
//!     .register_connection(ConnectionConfig::new("main").with_keyspace("shop"), &[user])
//!     .await?;
//!
//! let adults = adapter
//!     .find("main", "user", &serde_json::json!({"where": {"age": {">=": 18}}, "limit": 10}))
//!     .await?;
//! adapter.teardown(None).await?;
//! ```

pub mod adapter;
pub mod collection;
pub mod config;
pub mod error;
pub mod session;

pub use adapter::{Adapter, Connection};
pub use collection::{Collection, RecordStream};
pub use config::{ConnectionConfig, Credentials};
pub use error::{Error, Result};
pub use session::{
    Connector, Recorded, RecordingConnector, RecordingSession, RowStream, Session, StoreError,
    StoreErrorKind,
};

/// Re-export protocol types.
pub use cassorm_proto as proto;
