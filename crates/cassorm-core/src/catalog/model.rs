//! Model definitions.

use serde_json::Value;

use super::attribute::AttributeDef;
use crate::error::Error;

/// A model as declared by the ORM: identity, optional table name and
/// attributes in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    /// Model identity.
    pub identity: String,
    /// Explicit table name.
    pub table_name: Option<String>,
    /// Attributes in declaration order.
    pub attributes: Vec<AttributeDef>,
}

impl ModelDef {
    /// Create an empty model.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            table_name: None,
            attributes: Vec::new(),
        }
    }

    /// Set the table name.
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attr: AttributeDef) -> Self {
        self.attributes.push(attr);
        self
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Parse `{identity, tableName?, attributes: {...}}`.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        let Value::Object(map) = value else {
            return Err(Error::Schema("model definition must be an object".to_string()));
        };

        let identity = match map.get("identity") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(Error::Schema("model definition needs an identity".to_string())),
        };

        let mut model = Self::new(identity);
        match map.get("tableName") {
            None | Some(Value::Null) => {}
            Some(Value::String(table)) => model.table_name = Some(table.clone()),
            Some(other) => {
                return Err(Error::Schema(format!(
                    "tableName of '{}' must be a string, got {}",
                    model.identity, other
                )))
            }
        }

        match map.get("attributes") {
            Some(Value::Object(attributes)) => {
                for (name, definition) in attributes {
                    if let Some(attr) = AttributeDef::from_json(name, definition)? {
                        model.attributes.push(attr);
                    }
                }
            }
            _ => {
                return Err(Error::Schema(format!(
                    "model '{}' has no attributes object",
                    model.identity
                )))
            }
        }

        Ok(model)
    }
}
