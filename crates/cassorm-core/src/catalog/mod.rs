//! Model catalog: attribute types, model definitions and compiled schemas.

mod attribute;
mod model;
mod schema;
mod types;

pub use attribute::{AttributeDef, AUDIT_ATTRIBUTES};
pub use model::ModelDef;
pub use schema::{index_name, ColumnDef, SchemaDescriptor};
pub use types::{from_native_type, to_native_type, GenericType, NativeType};

pub(crate) use schema::quoted_list;
