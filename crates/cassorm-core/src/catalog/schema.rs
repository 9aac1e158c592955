//! Compiled table schema.
//!
//! A [`SchemaDescriptor`] is derived once from a [`ModelDef`] and never
//! mutated afterwards. It owns the attribute/column name maps every other
//! compiler resolves names against, and the DDL for the table.

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use cassorm_proto::CompiledStatement;

use super::attribute::AttributeDef;
use super::model::ModelDef;
use super::types::{to_native_type, GenericType, NativeType};
use crate::error::{Error, Result};

/// One column of a compiled table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name (lower-case).
    pub name: String,
    /// Attribute stored in this column.
    pub attribute: String,
    /// Column type.
    pub native_type: NativeType,
    /// Declared attribute type, when it is a known one.
    pub generic_type: Option<GenericType>,
}

/// Immutable result of compiling a model.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    identity: String,
    table_name: String,
    columns: IndexMap<String, ColumnDef>,
    attr_to_column: IndexMap<String, String>,
    partition_key: String,
    clustering: Vec<String>,
    auto_key: bool,
    defaults: IndexMap<String, Value>,
    create_table: String,
    index_statements: IndexMap<String, String>,
}

impl SchemaDescriptor {
    /// Compile a model definition.
    pub fn compile(model: &ModelDef) -> Result<Self> {
        let table_name = model
            .table_name
            .clone()
            .unwrap_or_else(|| model.identity.to_lowercase());

        let mut columns = IndexMap::with_capacity(model.attributes.len());
        let mut attr_to_column = IndexMap::with_capacity(model.attributes.len());
        let mut defaults = IndexMap::new();
        let mut key_attr: Option<&AttributeDef> = None;

        for attr in &model.attributes {
            let column = attr.column();

            if attr_to_column.contains_key(&attr.name) {
                return Err(Error::Schema(format!(
                    "duplicate attribute '{}' in model '{}'",
                    attr.name, model.identity
                )));
            }
            if columns.contains_key(&column) {
                return Err(Error::Schema(format!(
                    "attributes of model '{}' collide on column '{}'",
                    model.identity, column
                )));
            }

            if attr.primary_key {
                if let Some(existing) = key_attr {
                    return Err(Error::Schema(format!(
                        "duplicate primary key in model '{}': '{}' and '{}'",
                        model.identity, existing.name, attr.name
                    )));
                }
                key_attr = Some(attr);
            } else {
                if attr.auto_increment {
                    return Err(Error::Schema(format!(
                        "auto-increment attribute '{}' is not the primary key",
                        attr.name
                    )));
                }
                if !attr.cluster_by.is_empty() {
                    return Err(Error::Schema(format!(
                        "clustering declared on '{}', which is not the primary key",
                        attr.name
                    )));
                }
            }

            let (native_type, generic_type) = if attr.auto_increment {
                (NativeType::TimeUuid, Some(GenericType::String))
            } else {
                (
                    to_native_type(&attr.type_name),
                    GenericType::parse(&attr.type_name).ok(),
                )
            };

            if let Some(default) = &attr.default_value {
                if attr.is_audit() {
                    tracing::warn!(
                        model = %model.identity,
                        attribute = %attr.name,
                        "default value ignored on timestamp attribute"
                    );
                } else {
                    defaults.insert(attr.name.clone(), default.clone());
                }
            }

            attr_to_column.insert(attr.name.clone(), column.clone());
            columns.insert(
                column.clone(),
                ColumnDef {
                    name: column,
                    attribute: attr.name.clone(),
                    native_type,
                    generic_type,
                },
            );
        }

        let key_attr = key_attr.ok_or_else(|| {
            Error::Schema(format!("model '{}' has no primary key", model.identity))
        })?;
        let partition_key = key_attr.column();

        let mut clustering: Vec<String> = Vec::with_capacity(key_attr.cluster_by.len());
        for name in &key_attr.cluster_by {
            let column = resolve_name(&columns, &attr_to_column, name).ok_or_else(|| {
                Error::Schema(format!(
                    "clustering column '{}' of model '{}' does not exist",
                    name, model.identity
                ))
            })?;
            if column == partition_key || clustering.contains(&column) {
                return Err(Error::Schema(format!(
                    "clustering column '{}' of model '{}' is already part of the key",
                    name, model.identity
                )));
            }
            clustering.push(column);
        }

        // Uniques first, then plain indexes.
        let mut indexed = IndexSet::new();
        let flagged = model
            .attributes
            .iter()
            .filter(|a| a.unique)
            .chain(model.attributes.iter().filter(|a| a.index));
        for attr in flagged {
            let column = attr.column();
            if column == partition_key || clustering.contains(&column) {
                tracing::warn!(
                    model = %model.identity,
                    column = %column,
                    "key columns are not indexed"
                );
                continue;
            }
            indexed.insert(column);
        }

        let create_table = create_table_text(&table_name, &columns, &partition_key, &clustering);
        let index_statements = indexed
            .iter()
            .map(|column| {
                let name = index_name(&table_name, column);
                let text = format!("CREATE INDEX {} ON {} (\"{}\");", name, table_name, column);
                (name, text)
            })
            .collect();

        tracing::debug!(
            model = %model.identity,
            table = %table_name,
            columns = columns.len(),
            indexes = indexed.len(),
            "compiled schema"
        );

        Ok(Self {
            identity: model.identity.clone(),
            table_name,
            columns,
            attr_to_column,
            partition_key,
            clustering,
            auto_key: key_attr.auto_increment,
            defaults,
            create_table,
            index_statements,
        })
    }

    /// Model identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.values()
    }

    /// Look up a column by column name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.get(name)
    }

    /// Look up the column backing an attribute.
    pub fn column_for_attribute(&self, attribute: &str) -> Option<&ColumnDef> {
        self.attr_to_column
            .get(attribute)
            .and_then(|column| self.columns.get(column))
    }

    /// Resolve a caller-supplied name, checking column names first and
    /// attribute names second.
    pub fn resolve(&self, name: &str) -> Result<&ColumnDef> {
        self.columns
            .get(name)
            .or_else(|| self.column_for_attribute(name))
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Partition key column.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Attribute stored in the partition key column.
    pub fn partition_attribute(&self) -> &str {
        self.columns
            .get(&self.partition_key)
            .map(|c| c.attribute.as_str())
            .unwrap_or(&self.partition_key)
    }

    /// Clustering columns in key order.
    pub fn clustering_columns(&self) -> &[String] {
        &self.clustering
    }

    /// Partition key followed by clustering columns.
    pub fn key_columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.clustering.iter().map(String::as_str))
    }

    /// Whether a column is part of the primary key.
    pub fn is_key_column(&self, column: &str) -> bool {
        self.key_columns().any(|k| k == column)
    }

    /// Whether the partition key is generated on insert.
    pub fn auto_key(&self) -> bool {
        self.auto_key
    }

    /// Default values keyed by attribute name.
    pub fn defaults(&self) -> &IndexMap<String, Value> {
        &self.defaults
    }

    /// Quoted, comma separated list of every column, for projections.
    pub fn projection(&self) -> String {
        quoted_list(self.columns.keys())
    }

    /// `CREATE TABLE` text.
    pub fn create_table_text(&self) -> &str {
        &self.create_table
    }

    /// Index statements keyed by index name.
    pub fn index_statements(&self) -> &IndexMap<String, String> {
        &self.index_statements
    }

    /// `CREATE TABLE` followed by every `CREATE INDEX`.
    pub fn ddl_statements(&self) -> Vec<CompiledStatement> {
        std::iter::once(self.create_table.as_str())
            .chain(self.index_statements.values().map(String::as_str))
            .map(CompiledStatement::schema)
            .collect()
    }

    /// `DROP TABLE` statement.
    pub fn drop_table_statement(&self) -> CompiledStatement {
        CompiledStatement::schema(format!("DROP TABLE {};", self.table_name))
    }

    /// `ALTER TABLE ... ADD` for one column.
    pub fn add_column_statement(&self, column: &ColumnDef) -> CompiledStatement {
        CompiledStatement::schema(format!(
            "ALTER TABLE {} ADD \"{}\" {};",
            self.table_name, column.name, column.native_type
        ))
    }
}

/// Deterministic secondary index name.
pub fn index_name(table: &str, column: &str) -> String {
    format!("idx__{}__{}", table, column)
}

pub(crate) fn quoted_list<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn resolve_name(
    columns: &IndexMap<String, ColumnDef>,
    attr_to_column: &IndexMap<String, String>,
    name: &str,
) -> Option<String> {
    if columns.contains_key(name) {
        return Some(name.to_string());
    }
    attr_to_column.get(name).cloned()
}

fn create_table_text(
    table: &str,
    columns: &IndexMap<String, ColumnDef>,
    partition_key: &str,
    clustering: &[String],
) -> String {
    let mut text = format!("CREATE TABLE {} (", table);
    for column in columns.values() {
        text.push_str(&format!("\"{}\" {}, ", column.name, column.native_type));
    }
    let key: Vec<String> = std::iter::once(partition_key)
        .chain(clustering.iter().map(String::as_str))
        .map(|c| format!("\"{}\"", c))
        .collect();
    text.push_str(&format!("PRIMARY KEY ({}));", key.join(", ")));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user_model() -> ModelDef {
        ModelDef::new("User")
            .with_attribute(AttributeDef::new("id", "string").primary_key().auto_increment())
            .with_attribute(AttributeDef::new("firstName", "string"))
            .with_attribute(AttributeDef::new("lastName", "string").indexed())
            .with_attribute(AttributeDef::new("email", "email").unique().indexed())
            .with_attribute(AttributeDef::new("age", "integer").with_default(18))
            .with_attribute(AttributeDef::new("createdAt", "datetime").with_default("now"))
    }

    #[test]
    fn test_compile_user() {
        let schema = SchemaDescriptor::compile(&user_model()).unwrap();

        assert_eq!(schema.table_name(), "user");
        assert_eq!(schema.partition_key(), "id");
        assert!(schema.auto_key());
        assert_eq!(
            schema.create_table_text(),
            "CREATE TABLE user (\"id\" timeuuid, \"firstname\" text, \"lastname\" text, \
             \"email\" ascii, \"age\" bigint, \"createdat\" timestamp, PRIMARY KEY (\"id\"));"
        );
        let indexes: Vec<_> = schema.index_statements().iter().collect();
        assert_eq!(
            indexes,
            vec![
                (
                    &"idx__user__email".to_string(),
                    &"CREATE INDEX idx__user__email ON user (\"email\");".to_string()
                ),
                (
                    &"idx__user__lastname".to_string(),
                    &"CREATE INDEX idx__user__lastname ON user (\"lastname\");".to_string()
                ),
            ]
        );
        assert_eq!(schema.defaults().get("age"), Some(&json!(18)));
        assert!(schema.defaults().get("createdAt").is_none());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let a = SchemaDescriptor::compile(&user_model()).unwrap();
        let b = SchemaDescriptor::compile(&user_model()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_primary_key_count() {
        let none = ModelDef::new("t").with_attribute(AttributeDef::new("a", "string"));
        assert!(matches!(SchemaDescriptor::compile(&none), Err(Error::Schema(_))));

        let two = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key())
            .with_attribute(AttributeDef::new("b", "string").primary_key());
        assert!(matches!(SchemaDescriptor::compile(&two), Err(Error::Schema(_))));
    }

    #[test]
    fn test_auto_increment_requires_primary_key() {
        let model = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key())
            .with_attribute(AttributeDef::new("b", "integer").auto_increment());
        assert!(matches!(SchemaDescriptor::compile(&model), Err(Error::Schema(_))));
    }

    #[test]
    fn test_clustering_order() {
        let model = ModelDef::new("events")
            .with_attribute(AttributeDef::new("source", "string"))
            .with_attribute(AttributeDef::new("day", "date"))
            .with_attribute(
                AttributeDef::new("deviceId", "string")
                    .primary_key()
                    .clustered_by(["day", "source"]),
            );
        let schema = SchemaDescriptor::compile(&model).unwrap();
        assert_eq!(schema.clustering_columns(), &["day".to_string(), "source".to_string()]);
        assert!(schema
            .create_table_text()
            .ends_with("PRIMARY KEY (\"deviceid\", \"day\", \"source\"));"));
        assert!(schema.is_key_column("day"));
        assert!(!schema.is_key_column("nothing"));
    }

    #[test]
    fn test_bad_clustering() {
        let missing = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key().clustered_by(["zzz"]));
        assert!(matches!(SchemaDescriptor::compile(&missing), Err(Error::Schema(_))));

        let itself = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key().clustered_by(["a"]));
        assert!(matches!(SchemaDescriptor::compile(&itself), Err(Error::Schema(_))));

        let misplaced = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key())
            .with_attribute(AttributeDef::new("b", "string").clustered_by(["a"]));
        assert!(matches!(SchemaDescriptor::compile(&misplaced), Err(Error::Schema(_))));
    }

    #[test]
    fn test_key_columns_are_not_indexed() {
        let model = ModelDef::new("t")
            .with_attribute(AttributeDef::new("a", "string").primary_key().unique());
        let schema = SchemaDescriptor::compile(&model).unwrap();
        assert!(schema.index_statements().is_empty());
    }

    #[test]
    fn test_resolve_prefers_columns() {
        let model = ModelDef::new("t")
            .with_attribute(AttributeDef::new("id", "string").primary_key())
            .with_attribute(AttributeDef::new("name", "string").with_column("label"))
            .with_attribute(AttributeDef::new("label", "string").with_column("name"));
        let schema = SchemaDescriptor::compile(&model).unwrap();

        assert_eq!(schema.resolve("name").unwrap().attribute, "label");
        assert_eq!(schema.column_for_attribute("name").unwrap().name, "label");
        assert!(matches!(schema.resolve("Name"), Err(Error::UnknownField(_))));
    }

    #[test]
    fn test_colliding_columns() {
        let model = ModelDef::new("t")
            .with_attribute(AttributeDef::new("id", "string").primary_key())
            .with_attribute(AttributeDef::new("Name", "string"))
            .with_attribute(AttributeDef::new("name", "string"));
        assert!(matches!(SchemaDescriptor::compile(&model), Err(Error::Schema(_))));
    }

    #[test]
    fn test_drop_and_alter() {
        let schema = SchemaDescriptor::compile(&user_model()).unwrap();
        assert_eq!(schema.drop_table_statement().text, "DROP TABLE user;");
        let age = schema.column("age").unwrap();
        assert_eq!(
            schema.add_column_statement(age).text,
            "ALTER TABLE user ADD \"age\" bigint;"
        );
        assert_eq!(schema.ddl_statements().len(), 3);
    }
}
