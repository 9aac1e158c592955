//! Mutation plans for update and delete.
//!
//! The store cannot update or delete by a non-key predicate, so a mutation
//! that does not pin the full key is split into a key `SELECT` followed by
//! one keyed mutation per returned row. The two steps are not atomic: a row
//! may change or disappear between the read and the batched write.

use cassorm_proto::{CompiledStatement, Record, Row, StatementKind, Value};

use super::value_codec::{decode_attribute, from_native_value};
use crate::catalog::{ColumnDef, SchemaDescriptor};
use crate::error::{Error, Result};

/// How an update or delete reaches the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationPlan {
    /// The criteria pins the full key: one statement, no read.
    Direct {
        /// Keyed mutation.
        statement: CompiledStatement,
        /// Key attributes and their values.
        key: Record,
    },
    /// Read the matching keys, then mutate each row in one batch.
    SelectThenMutate {
        /// Key projection with the compiled criteria.
        select: CompiledStatement,
        /// Mutation to bind per selected row.
        template: MutationTemplate,
    },
}

impl MutationPlan {
    /// Whether the plan starts with a read.
    pub fn is_two_phase(&self) -> bool {
        matches!(self, MutationPlan::SelectThenMutate { .. })
    }
}

/// A keyed mutation waiting for its key values.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTemplate {
    kind: StatementKind,
    head: String,
    params: Vec<Value>,
    keys: Vec<ColumnDef>,
}

impl MutationTemplate {
    pub(crate) fn new(
        kind: StatementKind,
        head: String,
        params: Vec<Value>,
        schema: &SchemaDescriptor,
    ) -> Self {
        let keys = schema
            .key_columns()
            .filter_map(|column| schema.column(column).cloned())
            .collect();
        Self {
            kind,
            head,
            params,
            keys,
        }
    }

    /// Statement kind produced by [`bind`](Self::bind).
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Bind the key values of one selected row.
    pub fn bind(&self, row: &Row) -> Result<CompiledStatement> {
        let mut params = self.params.clone();
        for key in &self.keys {
            let value = row.get(&key.name).ok_or_else(|| {
                Error::InvalidValue(format!("selected row lacks key column '{}'", key.name))
            })?;
            params.push(from_native_value(value));
        }
        Ok(CompiledStatement::new(self.kind, self.keyed_text()).with_params(params))
    }

    /// The per-row statement with only the non-key parameters bound.
    pub fn unbound(&self) -> CompiledStatement {
        CompiledStatement::new(self.kind, self.keyed_text()).with_params(self.params.clone())
    }

    fn keyed_text(&self) -> String {
        let predicates: Vec<String> = self
            .keys
            .iter()
            .map(|key| format!("\"{}\" = ?", key.name))
            .collect();
        format!("{} WHERE {};", self.head, predicates.join(" AND "))
    }

    /// Key attributes of one selected row, decoded.
    pub fn key_record(&self, row: &Row) -> Record {
        let mut record = Record::new();
        for key in &self.keys {
            let Some(value) = row.get(&key.name) else {
                continue;
            };
            let value = from_native_value(value);
            let value = match key.generic_type {
                Some(ty) => decode_attribute(ty, value),
                None => value,
            };
            record.insert(key.attribute.clone(), value);
        }
        record
    }
}

/// Merge update values over a key record.
pub fn merge_record(mut key: Record, values: &Record) -> Record {
    for (name, value) in values {
        key.insert(name.clone(), value.clone());
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, ModelDef};
    use cassorm_proto::NativeValue;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        let model = ModelDef::new("events")
            .with_attribute(AttributeDef::new("day", "string"))
            .with_attribute(AttributeDef::new("deviceId", "string").primary_key().clustered_by(["day"]))
            .with_attribute(AttributeDef::new("reading", "float"));
        SchemaDescriptor::compile(&model).unwrap()
    }

    #[test]
    fn test_bind_appends_key_predicates() {
        let schema = schema();
        let template = MutationTemplate::new(
            StatementKind::Update,
            "UPDATE events SET \"reading\" = ?".to_string(),
            vec![json!(1.5)],
            &schema,
        );
        let row = Row::new()
            .with("deviceid", NativeValue::Text("d1".into()))
            .with("day", NativeValue::Text("mon".into()));

        let stmt = template.bind(&row).unwrap();
        assert_eq!(
            stmt.text,
            "UPDATE events SET \"reading\" = ? WHERE \"deviceid\" = ? AND \"day\" = ?;"
        );
        assert_eq!(stmt.params, vec![json!(1.5), json!("d1"), json!("mon")]);
        assert_eq!(stmt.placeholder_count(), stmt.params.len());

        let key = template.key_record(&row);
        assert_eq!(key.get("deviceId"), Some(&json!("d1")));
        assert_eq!(key.get("day"), Some(&json!("mon")));
    }

    #[test]
    fn test_bind_requires_key_columns() {
        let schema = schema();
        let template = MutationTemplate::new(
            StatementKind::Delete,
            "DELETE FROM events".to_string(),
            Vec::new(),
            &schema,
        );
        let row = Row::new().with("deviceid", NativeValue::Text("d1".into()));
        assert!(matches!(template.bind(&row), Err(Error::InvalidValue(_))));

        let preview = template.unbound();
        assert_eq!(preview.text, "DELETE FROM events WHERE \"deviceid\" = ? AND \"day\" = ?;");
        assert!(preview.params.is_empty());
    }

    #[test]
    fn test_merge_record() {
        let mut key = Record::new();
        key.insert("id".into(), json!("a"));
        let mut values = Record::new();
        values.insert("age".into(), json!(3));
        let merged = merge_record(key, &values);
        assert_eq!(serde_json::Value::Object(merged), json!({"id": "a", "age": 3}));
    }
}
