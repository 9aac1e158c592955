//! Attribute definitions for models.

use serde_json::{Map, Value};

use crate::error::Error;

/// Attribute names the ORM maintains itself; defaults on them are ignored.
pub const AUDIT_ATTRIBUTES: [&str; 2] = ["createdAt", "updatedAt"];

/// An attribute of a model.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDef {
    /// Attribute name, unique within the model.
    pub name: String,
    /// Generic type name as declared. Unknown names are stored as text.
    pub type_name: String,
    /// Explicit column name.
    pub column_name: Option<String>,
    /// Whether this attribute is the partition key.
    pub primary_key: bool,
    /// Whether the key is generated on insert.
    pub auto_increment: bool,
    /// Clustering attributes or columns, in key order. Only legal on the
    /// primary key attribute.
    pub cluster_by: Vec<String>,
    /// Whether a unique constraint was requested.
    pub unique: bool,
    /// Whether a secondary index was requested.
    pub index: bool,
    /// Value used when an insert omits the attribute.
    pub default_value: Option<Value>,
}

impl AttributeDef {
    /// Create a plain attribute.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            column_name: None,
            primary_key: false,
            auto_increment: false,
            cluster_by: Vec::new(),
            unique: false,
            index: false,
            default_value: None,
        }
    }

    /// Mark as the partition key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as generated on insert.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the column name.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Set the clustering attributes.
    pub fn clustered_by<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cluster_by = names.into_iter().map(Into::into).collect();
        self
    }

    /// Request a unique constraint (backed by a secondary index).
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Request a secondary index.
    pub fn indexed(mut self) -> Self {
        self.index = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Column name this attribute is stored under. Always lower-case.
    pub fn column(&self) -> String {
        self.column_name
            .as_deref()
            .unwrap_or(&self.name)
            .to_lowercase()
    }

    /// Whether this is one of the ORM-maintained timestamp attributes.
    pub fn is_audit(&self) -> bool {
        AUDIT_ATTRIBUTES.contains(&self.name.as_str())
    }

    /// Parse one entry of a model's `attributes` object.
    ///
    /// Returns `None` for entries that are not attributes (functions and
    /// other non-object values).
    pub fn from_json(name: &str, value: &Value) -> Result<Option<Self>, Error> {
        match value {
            Value::String(type_name) => Ok(Some(Self::new(name, type_name.as_str()))),
            Value::Object(map) => Self::from_object(name, map).map(Some),
            _ => Ok(None),
        }
    }

    fn from_object(name: &str, map: &Map<String, Value>) -> Result<Self, Error> {
        let type_name = match map.get("type") {
            Some(Value::String(t)) => t.clone(),
            None => "string".to_string(),
            Some(other) => {
                return Err(Error::Schema(format!(
                    "attribute '{}' has a non-string type: {}",
                    name, other
                )))
            }
        };

        let mut attr = Self::new(name, type_name);
        attr.column_name = optional_string(name, map, "columnName")?;
        attr.primary_key = flag(name, map, "primaryKey")?;
        attr.auto_increment = flag(name, map, "autoIncrement")?;
        attr.unique = flag(name, map, "unique")?;
        attr.index = flag(name, map, "index")?;
        attr.default_value = map.get("defaultsTo").cloned();
        attr.cluster_by = match map.get("clusterBy") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(single)) => vec![single.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::Schema(format!(
                        "clusterBy of '{}' must list attribute names, got {}",
                        name, other
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(Error::Schema(format!(
                    "clusterBy of '{}' must be a name or a list of names, got {}",
                    name, other
                )))
            }
        };
        Ok(attr)
    }
}

fn flag(attr: &str, map: &Map<String, Value>, key: &str) -> Result<bool, Error> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::Schema(format!(
            "'{}' of attribute '{}' must be a boolean, got {}",
            key, attr, other
        ))),
    }
}

fn optional_string(attr: &str, map: &Map<String, Value>, key: &str) -> Result<Option<String>, Error> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Error::Schema(format!(
            "'{}' of attribute '{}' must be a string, got {}",
            key, attr, other
        ))),
    }
}
