//! cassorm core.
//!
//! Compiles ORM model definitions and criteria into CQL for
//! Cassandra-family stores:
//!
//! - [`catalog`] - attribute types, model definitions and compiled schemas
//! - [`query`] - criteria compiler, statement builder and value coercion
//! - [`migration`] - live table description and schema synchronisation plans
//!
//! Nothing in this crate talks to a store; every error it raises is raised
//! before a statement is dispatched.

pub mod catalog;
pub mod error;
pub mod migration;
pub mod query;

pub use catalog::{AttributeDef, GenericType, ModelDef, NativeType, SchemaDescriptor};
pub use error::{Error, Result};
pub use migration::{MigrateMode, MigrationStep, TableDescription};
pub use query::{CriteriaCompiler, MutationPlan, StatementBuilder};
