//! Statement compilation.
//!
//! [`CriteriaCompiler`] turns criteria into `WHERE` clause bodies,
//! [`StatementBuilder`] assembles full statements and mutation plans, and
//! [`value_codec`] converts values between the store and the ORM.

mod builder;
mod criteria;
mod plan;
pub mod value_codec;

pub use builder::{new_time_uuid, InsertPlan, PinnedKey, StatementBuilder, UpdatePlan};
pub use criteria::{CompiledClause, CriteriaCompiler, Operator};
pub use plan::{merge_record, MutationPlan, MutationTemplate};
pub use value_codec::{decode_raw_row, decode_row, from_native_value, to_native_value};
