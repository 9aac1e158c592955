//! Schema synchronisation.
//!
//! Describes the live table from the store's system schema and plans the
//! statements that bring it in line with a compiled schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use cassorm_proto::{CompiledStatement, Row, StatementKind};

use crate::catalog::{from_native_type, NativeType, SchemaDescriptor};
use crate::error::Error;

/// How schema synchronisation treats an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrateMode {
    /// Never touch the store.
    #[default]
    Safe,
    /// Create missing tables and add missing columns.
    Alter,
    /// Drop and recreate every table. Destroys data.
    Drop,
}

impl FromStr for MigrateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "safe" => Ok(MigrateMode::Safe),
            "alter" => Ok(MigrateMode::Alter),
            "drop" => Ok(MigrateMode::Drop),
            _ => Err(Error::Schema(format!("unknown migrate mode '{}'", s))),
        }
    }
}

impl fmt::Display for MigrateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MigrateMode::Safe => "safe",
            MigrateMode::Alter => "alter",
            MigrateMode::Drop => "drop",
        })
    }
}

/// Role of a column in the live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Part of the partition key.
    PartitionKey,
    /// Clustering column.
    Clustering,
    /// Static column.
    Static,
    /// Regular column.
    Regular,
}

impl ColumnKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "partition_key" => ColumnKind::PartitionKey,
            "clustering" => ColumnKind::Clustering,
            "static" => ColumnKind::Static,
            _ => ColumnKind::Regular,
        }
    }
}

/// One column of the live table.
#[derive(Debug, Clone, PartialEq)]
pub struct DescribedColumn {
    /// Column name.
    pub column: String,
    /// Attribute mapped to the column, if the model knows it.
    pub attribute: Option<String>,
    /// Column role.
    pub kind: ColumnKind,
    /// Column type as reported by the store.
    pub type_name: String,
    /// Parsed column type.
    pub native_type: Option<NativeType>,
}

/// Live table layout.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescription {
    /// Table name.
    pub table: String,
    /// Columns in the order the store reported them.
    pub columns: Vec<DescribedColumn>,
    /// Attribute of the partition key when it is a single column.
    pub partition_attribute: Option<String>,
}

impl TableDescription {
    /// Query listing the columns of a table.
    pub fn describe_statement(keyspace: &str, table: &str) -> CompiledStatement {
        CompiledStatement::new(
            StatementKind::Select,
            "SELECT column_name, kind, type FROM system_schema.columns \
             WHERE keyspace_name = ? AND table_name = ?;",
        )
        .with_params(vec![
            Value::String(keyspace.to_string()),
            Value::String(table.to_lowercase()),
        ])
    }

    /// Build a description from the rows of [`describe_statement`](Self::describe_statement).
    ///
    /// Returns `None` when the table does not exist.
    pub fn from_rows(schema: &SchemaDescriptor, rows: &[Row]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(column) = row.get("column_name").and_then(|v| v.as_str()) else {
                tracing::warn!(table = %schema.table_name(), "describe row without column_name");
                continue;
            };
            let kind = row
                .get("kind")
                .and_then(|v| v.as_str())
                .map(ColumnKind::parse)
                .unwrap_or(ColumnKind::Regular);
            let type_name = row
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            columns.push(DescribedColumn {
                column: column.to_string(),
                attribute: schema.column(column).map(|c| c.attribute.clone()),
                kind,
                native_type: NativeType::parse(&type_name),
                type_name,
            });
        }

        let partition: Vec<&DescribedColumn> = columns
            .iter()
            .filter(|c| c.kind == ColumnKind::PartitionKey)
            .collect();
        let partition_attribute = match partition.as_slice() {
            [single] => Some(single.attribute.clone().unwrap_or_else(|| single.column.clone())),
            [] => None,
            _ => {
                tracing::warn!(
                    table = %schema.table_name(),
                    columns = partition.len(),
                    "compound partition key is not supported"
                );
                None
            }
        };

        Some(Self {
            table: schema.table_name().to_string(),
            columns,
            partition_attribute,
        })
    }

    /// Whether the live table has a column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.column == column)
    }

    /// Attribute-shaped description as the ORM expects it.
    pub fn to_json(&self) -> Value {
        let mut out = Map::with_capacity(self.columns.len());
        for column in &self.columns {
            let name = column.attribute.clone().unwrap_or_else(|| column.column.clone());
            let generic = column
                .native_type
                .as_ref()
                .map(from_native_type)
                .map(|t| t.as_str())
                .unwrap_or("string");
            let mut attr = json!({
                "type": generic,
                "columnName": column.column,
            });
            if self.partition_attribute.as_deref() == Some(name.as_str()) {
                attr["primaryKey"] = Value::Bool(true);
            }
            out.insert(name, attr);
        }
        Value::Object(out)
    }
}

/// One statement of a migration.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStep {
    /// Statement to run.
    pub statement: CompiledStatement,
    /// Whether a "does not exist" answer from the store counts as success.
    pub tolerate_absent: bool,
}

impl MigrationStep {
    fn required(statement: CompiledStatement) -> Self {
        Self {
            statement,
            tolerate_absent: false,
        }
    }
}

/// Plan the statements that synchronise a table.
pub fn plan(
    mode: MigrateMode,
    schema: &SchemaDescriptor,
    live: Option<&TableDescription>,
) -> Vec<MigrationStep> {
    let create = || schema.ddl_statements().into_iter().map(MigrationStep::required);

    match (mode, live) {
        (MigrateMode::Safe, _) => Vec::new(),
        (MigrateMode::Drop, _) => std::iter::once(MigrationStep {
            statement: schema.drop_table_statement(),
            tolerate_absent: true,
        })
        .chain(create())
        .collect(),
        (MigrateMode::Alter, None) => create().collect(),
        (MigrateMode::Alter, Some(live)) => schema
            .columns()
            .filter(|column| !live.has_column(&column.name))
            .map(|column| MigrationStep::required(schema.add_column_statement(column)))
            .collect(),
    }
}
