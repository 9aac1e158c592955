//! Native value types returned by the store session.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A record in the caller's generic shape: attribute name to JSON value.
///
/// Attribute order is preserved (`serde_json` is built with `preserve_order`).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A value as the wide-column store hands it back.
///
/// Wrapped types (identifiers, big numbers, addresses) are kept distinct
/// so the read path can decide how to flatten them into plain scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Null or absent cell.
    Null,
    /// `boolean`.
    Boolean(bool),
    /// `int`.
    Int(i32),
    /// `bigint`.
    BigInt(i64),
    /// `counter`.
    Counter(i64),
    /// `varint` in decimal notation.
    Varint(String),
    /// `decimal` in decimal notation.
    Decimal(String),
    /// `float`.
    Float(f32),
    /// `double`.
    Double(f64),
    /// `text` / `varchar`.
    Text(String),
    /// `ascii`.
    Ascii(String),
    /// `timestamp`.
    Timestamp(DateTime<Utc>),
    /// `date`.
    Date(NaiveDate),
    /// `uuid`.
    Uuid(Uuid),
    /// `timeuuid`.
    TimeUuid(Uuid),
    /// `inet`.
    Inet(IpAddr),
    /// `blob`.
    Blob(Vec<u8>),
    /// `list<T>`.
    List(Vec<NativeValue>),
    /// `set<T>`.
    Set(Vec<NativeValue>),
    /// `map<K, V>`.
    Map(Vec<(NativeValue, NativeValue)>),
}

impl NativeValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeValue::Text(s) | NativeValue::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64, widening smaller integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeValue::Int(i) => Some(*i as i64),
            NativeValue::BigInt(i) | NativeValue::Counter(i) => Some(*i),
            NativeValue::Varint(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get as UUID (either flavour).
    pub fn as_uuid(&self) -> Option<&Uuid> {
        match self {
            NativeValue::Uuid(u) | NativeValue::TimeUuid(u) => Some(u),
            _ => None,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(v: bool) -> Self {
        NativeValue::Boolean(v)
    }
}

impl From<i32> for NativeValue {
    fn from(v: i32) -> Self {
        NativeValue::Int(v)
    }
}

impl From<i64> for NativeValue {
    fn from(v: i64) -> Self {
        NativeValue::BigInt(v)
    }
}

impl From<f64> for NativeValue {
    fn from(v: f64) -> Self {
        NativeValue::Double(v)
    }
}

impl From<&str> for NativeValue {
    fn from(v: &str) -> Self {
        NativeValue::Text(v.to_string())
    }
}

impl From<String> for NativeValue {
    fn from(v: String) -> Self {
        NativeValue::Text(v)
    }
}

impl From<Uuid> for NativeValue {
    fn from(v: Uuid) -> Self {
        NativeValue::Uuid(v)
    }
}

impl From<Vec<u8>> for NativeValue {
    fn from(v: Vec<u8>) -> Self {
        NativeValue::Blob(v)
    }
}

impl<T: Into<NativeValue>> From<Option<T>> for NativeValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => NativeValue::Null,
        }
    }
}

/// One row of a result set, columns in server order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, NativeValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<NativeValue>) -> Self {
        self.columns.push((column.into(), value.into()));
        self
    }

    /// Look up a column value by name.
    pub fn get(&self, column: &str) -> Option<&NativeValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Iterate over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NativeValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consume the row into its columns.
    pub fn into_columns(self) -> Vec<(String, NativeValue)> {
        self.columns
    }
}

impl FromIterator<(String, NativeValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, NativeValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Rows returned by a single statement.
pub type RowSet = Vec<Row>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_accessors() {
        assert!(NativeValue::Null.is_null());
        assert!(!NativeValue::Boolean(false).is_null());

        assert_eq!(NativeValue::Int(7).as_i64(), Some(7));
        assert_eq!(NativeValue::Counter(9).as_i64(), Some(9));
        assert_eq!(NativeValue::Varint("42".into()).as_i64(), Some(42));
        assert_eq!(
            NativeValue::Varint("123456789012345678901234567890".into()).as_i64(),
            None
        );

        assert_eq!(NativeValue::Ascii("a@b.c".into()).as_str(), Some("a@b.c"));
    }

    #[test]
    fn test_row_lookup() {
        let id = Uuid::nil();
        let row = Row::new().with("id", id).with("age", 30i64);

        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id").and_then(NativeValue::as_uuid), Some(&id));
        assert_eq!(row.get("age"), Some(&NativeValue::BigInt(30)));
        assert!(row.get("missing").is_none());

        let names: Vec<_> = row.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["id", "age"]);
    }

    #[test]
    fn test_option_conversion() {
        let v: NativeValue = None::<i64>.into();
        assert!(v.is_null());

        let v: NativeValue = Some("x").into();
        assert_eq!(v, NativeValue::Text("x".into()));
    }
}
