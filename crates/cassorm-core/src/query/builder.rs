//! Statement builder.
//!
//! Assembles complete statements from a schema, normalised criteria and
//! records. Every statement projects named columns, quotes column names and
//! ends with `;`. Clause order is `WHERE`, `ORDER BY`, `LIMIT`,
//! `ALLOW FILTERING`.

use std::sync::OnceLock;

use uuid::Uuid;

use cassorm_proto::{CompiledStatement, Criteria, CriteriaValue, Record, StatementKind, Value};

use super::criteria::CriteriaCompiler;
use super::plan::{MutationPlan, MutationTemplate};
use super::value_codec::{encode_attribute, to_native_value};
use crate::catalog::{quoted_list, ColumnDef, SchemaDescriptor};
use crate::error::{Error, Result};

/// Generate a new time-ordered identifier.
///
/// The node id is drawn once per process.
pub fn new_time_uuid() -> Uuid {
    static NODE_ID: OnceLock<[u8; 6]> = OnceLock::new();
    let node_id = NODE_ID.get_or_init(|| {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        // Multicast bit marks the node id as random rather than a MAC.
        [bytes[0] | 0x01, bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
    });
    Uuid::now_v1(node_id)
}

/// Key column values of a criteria that pins the full primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct PinnedKey {
    columns: Vec<(ColumnDef, Value)>,
}

impl PinnedKey {
    fn clause(&self) -> (String, Vec<Value>) {
        let text = self
            .columns
            .iter()
            .map(|(column, _)| format!("\"{}\" = ?", column.name))
            .collect::<Vec<_>>()
            .join(" AND ");
        let params = self.columns.iter().map(|(_, value)| value.clone()).collect();
        (text, params)
    }

    /// Key values keyed by attribute name.
    pub fn to_record(&self) -> Record {
        self.columns
            .iter()
            .map(|(column, value)| (column.attribute.clone(), value.clone()))
            .collect()
    }
}

/// An `UPDATE` plan together with the normalised values it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// How the update reaches the store.
    pub plan: MutationPlan,
    /// Update values keyed by attribute name, before encoding.
    pub values: Record,
}

/// An `INSERT` statement and the record as it will be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    /// Insert statement.
    pub statement: CompiledStatement,
    /// Record keyed by attribute name, with generated key and defaults.
    pub record: Record,
}

/// Builds statements for one schema.
pub struct StatementBuilder<'a> {
    schema: &'a SchemaDescriptor,
}

impl<'a> StatementBuilder<'a> {
    /// Create a builder for a schema.
    pub fn new(schema: &'a SchemaDescriptor) -> Self {
        Self { schema }
    }

    /// Schema this builder compiles against.
    pub fn schema(&self) -> &'a SchemaDescriptor {
        self.schema
    }

    /// Return the key values when the criteria consists exactly of scalar
    /// equalities on the partition column and every clustering column.
    pub fn pinned_key(&self, criteria: &Criteria) -> Result<Option<PinnedKey>> {
        let Some(filter) = &criteria.filter else {
            return Ok(None);
        };

        let fields = filter.fields();
        let key_count = self.schema.key_columns().count();
        if fields.len() != key_count {
            return Ok(None);
        }

        let mut pinned: Vec<(ColumnDef, Value)> = Vec::with_capacity(key_count);
        for (name, value) in fields {
            let column = self.schema.resolve(name)?;
            let CriteriaValue::Scalar(value) = value else {
                return Ok(None);
            };
            if !self.schema.is_key_column(&column.name)
                || pinned.iter().any(|(c, _)| c.name == column.name)
            {
                return Ok(None);
            }
            pinned.push((column.clone(), value.clone()));
        }

        // Key order, not caller order.
        let mut columns = Vec::with_capacity(key_count);
        for key in self.schema.key_columns() {
            if let Some(index) = pinned.iter().position(|(c, _)| c.name == key) {
                columns.push(pinned.swap_remove(index));
            }
        }
        Ok(Some(PinnedKey { columns }))
    }

    /// Build a `SELECT` of every column.
    pub fn select(&self, criteria: &Criteria) -> Result<CompiledStatement> {
        let head = format!(
            "SELECT {} FROM {}",
            self.schema.projection(),
            self.schema.table_name()
        );
        self.finish_query(StatementKind::Select, head, criteria, true)
    }

    /// Build a `SELECT COUNT(*)`.
    ///
    /// A limit bounds the rows counted, so the result is at most the limit.
    pub fn count(&self, criteria: &Criteria) -> Result<CompiledStatement> {
        let head = format!("SELECT COUNT(*) FROM {}", self.schema.table_name());
        let criteria = Criteria {
            sort: Vec::new(),
            skip: None,
            ..criteria.clone()
        };
        self.finish_query(StatementKind::Select, head, &criteria, false)
    }

    fn finish_query(
        &self,
        kind: StatementKind,
        head: String,
        criteria: &Criteria,
        apply_skip: bool,
    ) -> Result<CompiledStatement> {
        if let Some(key) = self.pinned_key(criteria)? {
            let (clause, params) = key.clause();
            let text = format!("{} WHERE {};", head, clause);
            return Ok(CompiledStatement::new(kind, text).with_params(params));
        }

        let mut text = head;
        let mut params = Vec::new();
        let mut filtered = false;

        if let Some(filter) = &criteria.filter {
            let clause = CriteriaCompiler::new(self.schema).compile(filter)?;
            if !clause.is_empty() {
                text.push_str(" WHERE ");
                text.push_str(&clause.text);
                params = clause.params;
                filtered = true;
            }
        }

        if !criteria.sort.is_empty() {
            let order = criteria
                .sort
                .iter()
                .map(|spec| -> Result<String> {
                    let column = self.schema.resolve(&spec.field)?;
                    Ok(format!("\"{}\" {}", column.name, spec.direction.as_cql()))
                })
                .collect::<Result<Vec<_>>>()?;
            text.push_str(" ORDER BY ");
            text.push_str(&order.join(", "));
        }

        let limit = match (criteria.limit, criteria.skip) {
            (Some(limit), Some(skip)) if apply_skip => Some(limit.saturating_add(skip)),
            (limit, _) => limit,
        };
        if let Some(limit) = limit {
            text.push_str(&format!(" LIMIT {}", limit));
        }

        if filtered {
            text.push_str(" ALLOW FILTERING");
        }
        text.push(';');

        let mut statement = CompiledStatement::new(kind, text).with_params(params);
        statement.allow_filtering = filtered;
        Ok(statement)
    }

    /// Build an `INSERT` for one record.
    ///
    /// A generated key is placed first in the returned record; defaults fill
    /// attributes the record omits.
    pub fn insert(&self, record: &Record) -> Result<InsertPlan> {
        let mut stored = Record::new();
        let key_attr = self.schema.partition_attribute();

        if self.schema.auto_key() {
            let supplied = record.iter().find(|(name, value)| {
                !value.is_null()
                    && self
                        .schema
                        .resolve(name)
                        .map(|c| c.name == self.schema.partition_key())
                        .unwrap_or(false)
            });
            if let Some((name, _)) = supplied {
                return Err(Error::ImmutableKey(name.clone()));
            }
            stored.insert(
                key_attr.to_string(),
                Value::String(new_time_uuid().to_string()),
            );
        }

        for (name, value) in record {
            let column = self.schema.resolve(name)?;
            if self.schema.auto_key() && column.name == self.schema.partition_key() {
                continue;
            }
            stored.insert(column.attribute.clone(), value.clone());
        }

        for (name, default) in self.schema.defaults() {
            if !stored.contains_key(name) {
                stored.insert(name.clone(), default.clone());
            }
        }

        for key in self.schema.key_columns() {
            let attribute = self
                .schema
                .column(key)
                .map(|c| c.attribute.as_str())
                .unwrap_or(key);
            if stored.get(attribute).map_or(true, Value::is_null) {
                return Err(Error::MissingKey(attribute.to_string()));
            }
        }

        let mut columns = Vec::with_capacity(stored.len());
        let mut params = Vec::with_capacity(stored.len());
        for (attribute, value) in &stored {
            let column = self
                .schema
                .column_for_attribute(attribute)
                .ok_or_else(|| Error::UnknownField(attribute.clone()))?;
            columns.push(column.name.clone());
            params.push(encode(column, value.clone())?);
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let text = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.schema.table_name(),
            quoted_list(&columns),
            placeholders
        );

        Ok(InsertPlan {
            statement: CompiledStatement::new(StatementKind::Insert, text).with_params(params),
            record: stored,
        })
    }

    /// Build an `UPDATE`. Key attributes cannot be assigned.
    pub fn update(&self, criteria: &Criteria, values: &Record) -> Result<UpdatePlan> {
        if values.is_empty() {
            return Err(Error::InvalidValue("update without values".to_string()));
        }

        let mut normalised = Record::new();
        let mut assignments = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (name, value) in values {
            let column = self.schema.resolve(name)?;
            if self.schema.is_key_column(&column.name) {
                return Err(Error::ImmutableKey(name.clone()));
            }
            assignments.push(format!("\"{}\" = ?", column.name));
            params.push(encode(column, value.clone())?);
            normalised.insert(column.attribute.clone(), value.clone());
        }

        let head = format!(
            "UPDATE {} SET {}",
            self.schema.table_name(),
            assignments.join(", ")
        );
        let plan = self.mutation(StatementKind::Update, head, params, criteria)?;
        Ok(UpdatePlan {
            plan,
            values: normalised,
        })
    }

    /// Build a `DELETE`.
    pub fn delete(&self, criteria: &Criteria) -> Result<MutationPlan> {
        let head = format!("DELETE FROM {}", self.schema.table_name());
        self.mutation(StatementKind::Delete, head, Vec::new(), criteria)
    }

    fn mutation(
        &self,
        kind: StatementKind,
        head: String,
        mut params: Vec<Value>,
        criteria: &Criteria,
    ) -> Result<MutationPlan> {
        if let Some(key) = self.pinned_key(criteria)? {
            let (clause, key_params) = key.clause();
            params.extend(key_params);
            let text = format!("{} WHERE {};", head, clause);
            return Ok(MutationPlan::Direct {
                statement: CompiledStatement::new(kind, text).with_params(params),
                key: key.to_record(),
            });
        }

        let key_columns: Vec<String> = self.schema.key_columns().map(str::to_string).collect();
        let head_select = format!(
            "SELECT {} FROM {}",
            quoted_list(&key_columns),
            self.schema.table_name()
        );
        // Mutations act on every matching row.
        let select_criteria = Criteria {
            limit: None,
            skip: None,
            sort: Vec::new(),
            ..criteria.clone()
        };
        let select = self.finish_query(StatementKind::Select, head_select, &select_criteria, false)?;

        Ok(MutationPlan::SelectThenMutate {
            select,
            template: MutationTemplate::new(kind, head, params, self.schema),
        })
    }
}

/// Encode a value for its column. Values that cannot be stored in the
/// column type are rejected here rather than by the store.
fn encode(column: &ColumnDef, value: Value) -> Result<Value> {
    let encoded = match column.generic_type {
        Some(ty) => encode_attribute(ty, value),
        None => value,
    };
    to_native_value(&encoded, &column.native_type).map_err(|e| match e {
        Error::InvalidValue(reason) => {
            Error::InvalidValue(format!("attribute '{}': {}", column.attribute, reason))
        }
        other => other,
    })?;
    Ok(encoded)
}
