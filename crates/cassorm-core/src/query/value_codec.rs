//! Value coercion between native store values and generic attribute values.
//!
//! Reads flatten the store's wrapped types (identifiers, big numbers,
//! addresses, timestamps) into plain JSON scalars. Writes go the other way
//! for session implementations that bind typed values.

use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

use cassorm_proto::{NativeValue, Record, Row};

use crate::catalog::{GenericType, NativeType, SchemaDescriptor};
use crate::error::Error;

/// Convert a native value into its generic representation.
///
/// - identifiers and addresses become strings
/// - integers become numbers; a `varint` that overflows `i64` stays a string
/// - `decimal` stays a string to keep its precision
/// - timestamps become RFC 3339 strings with millisecond precision
/// - blobs become `0x`-prefixed hex strings
/// - collections are converted element-wise
pub fn from_native_value(value: &NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Boolean(b) => Value::Bool(*b),
        NativeValue::Int(i) => Value::from(*i),
        NativeValue::BigInt(i) | NativeValue::Counter(i) => Value::from(*i),
        NativeValue::Varint(s) => match s.parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => Value::String(s.clone()),
        },
        NativeValue::Decimal(s) => Value::String(s.clone()),
        NativeValue::Float(f) => float_value(*f as f64),
        NativeValue::Double(f) => float_value(*f),
        NativeValue::Text(s) | NativeValue::Ascii(s) => Value::String(s.clone()),
        NativeValue::Timestamp(ts) => {
            Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        NativeValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
        NativeValue::Uuid(u) | NativeValue::TimeUuid(u) => Value::String(u.to_string()),
        NativeValue::Inet(addr) => Value::String(addr.to_string()),
        NativeValue::Blob(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        NativeValue::List(items) | NativeValue::Set(items) => {
            Value::Array(items.iter().map(from_native_value).collect())
        }
        NativeValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match from_native_value(key) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                map.insert(key, from_native_value(value));
            }
            Value::Object(map)
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a generic value into a native value of the given column type.
pub fn to_native_value(value: &Value, native: &NativeType) -> Result<NativeValue, Error> {
    if value.is_null() {
        return Ok(NativeValue::Null);
    }

    let converted = match native {
        NativeType::Text => NativeValue::Text(as_text(value)),
        NativeType::Ascii => {
            let text = as_text(value);
            if !text.is_ascii() {
                return Err(invalid(value, native));
            }
            NativeValue::Ascii(text)
        }
        NativeType::BigInt => NativeValue::BigInt(as_i64(value).ok_or_else(|| invalid(value, native))?),
        NativeType::Counter => NativeValue::Counter(as_i64(value).ok_or_else(|| invalid(value, native))?),
        NativeType::Int => {
            let wide = as_i64(value).ok_or_else(|| invalid(value, native))?;
            NativeValue::Int(i32::try_from(wide).map_err(|_| invalid(value, native))?)
        }
        NativeType::Varint => {
            let digits = match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
                Value::String(s) if is_integer_literal(s) => s.clone(),
                _ => return Err(invalid(value, native)),
            };
            NativeValue::Varint(digits)
        }
        NativeType::Decimal => {
            let digits = match value {
                Value::Number(n) => n.to_string(),
                Value::String(s) if s.parse::<f64>().is_ok() => s.clone(),
                _ => return Err(invalid(value, native)),
            };
            NativeValue::Decimal(digits)
        }
        NativeType::Double => NativeValue::Double(as_f64(value).ok_or_else(|| invalid(value, native))?),
        NativeType::Float => {
            NativeValue::Float(as_f64(value).ok_or_else(|| invalid(value, native))? as f32)
        }
        NativeType::Boolean => match value {
            Value::Bool(b) => NativeValue::Boolean(*b),
            Value::String(s) if s == "true" => NativeValue::Boolean(true),
            Value::String(s) if s == "false" => NativeValue::Boolean(false),
            _ => return Err(invalid(value, native)),
        },
        NativeType::Timestamp => NativeValue::Timestamp(parse_timestamp(value).ok_or_else(|| invalid(value, native))?),
        NativeType::Date => match value {
            Value::String(s) => NativeValue::Date(
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid(value, native))?,
            ),
            _ => return Err(invalid(value, native)),
        },
        NativeType::Uuid => NativeValue::Uuid(parse_uuid(value).ok_or_else(|| invalid(value, native))?),
        NativeType::TimeUuid => {
            let uuid = parse_uuid(value).ok_or_else(|| invalid(value, native))?;
            if uuid.get_version_num() != 1 {
                return Err(invalid(value, native));
            }
            NativeValue::TimeUuid(uuid)
        }
        NativeType::Inet => match value {
            Value::String(s) => NativeValue::Inet(s.parse::<IpAddr>().map_err(|_| invalid(value, native))?),
            _ => return Err(invalid(value, native)),
        },
        NativeType::Blob => NativeValue::Blob(parse_blob(value).ok_or_else(|| invalid(value, native))?),
        NativeType::List(inner) => NativeValue::List(convert_items(value, inner, native)?),
        NativeType::Set(inner) => NativeValue::Set(convert_items(value, inner, native)?),
        NativeType::Map(key_type, value_type) => {
            let Value::Object(map) = value else {
                return Err(invalid(value, native));
            };
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                entries.push((
                    to_native_value(&Value::String(key.clone()), key_type)?,
                    to_native_value(item, value_type)?,
                ));
            }
            NativeValue::Map(entries)
        }
    };
    Ok(converted)
}

fn invalid(value: &Value, native: &NativeType) -> Error {
    Error::InvalidValue(format!("cannot convert {} to {}", value, native))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        Value::String(s) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            Some(date.and_hms_opt(0, 0, 0)?.and_utc())
        }
        _ => None,
    }
}

fn parse_uuid(value: &Value) -> Option<Uuid> {
    match value {
        Value::String(s) => Uuid::parse_str(s).ok(),
        _ => None,
    }
}

fn parse_blob(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => match s.strip_prefix("0x") {
            Some(digits) => hex::decode(digits).ok(),
            None => Some(s.as_bytes().to_vec()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

fn convert_items(
    value: &Value,
    inner: &NativeType,
    native: &NativeType,
) -> Result<Vec<NativeValue>, Error> {
    match value {
        Value::Array(items) => items.iter().map(|item| to_native_value(item, inner)).collect(),
        _ => Err(invalid(value, native)),
    }
}

/// Prepare an attribute value for binding.
///
/// `json` attributes live in text columns, so the document is serialized.
/// `array` attributes live in `list<text>`, so non-string elements are
/// rendered as text.
pub fn encode_attribute(generic: GenericType, value: Value) -> Value {
    match (generic, value) {
        (_, Value::Null) => Value::Null,
        (GenericType::Json, value) => Value::String(value.to_string()),
        (GenericType::Array, Value::Array(items)) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(_) | Value::Null => item,
                    other => Value::String(other.to_string()),
                })
                .collect(),
        ),
        (_, value) => value,
    }
}

/// Reverse of [`encode_attribute`] on the read path.
///
/// Text that does not parse as JSON is returned unchanged so rows written by
/// other clients still come back.
pub fn decode_attribute(generic: GenericType, value: Value) -> Value {
    match (generic, value) {
        (GenericType::Json, Value::String(text)) => {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        }
        (_, value) => value,
    }
}

/// Convert a row into a record keyed by attribute name.
///
/// Columns the schema does not know (aggregates, columns added behind the
/// model's back) keep their column name and are converted without any
/// attribute-specific decoding.
pub fn decode_row(schema: &SchemaDescriptor, row: &Row) -> Record {
    let mut record = Record::new();
    for (column, value) in row.iter() {
        let generic = from_native_value(value);
        match schema.column(column) {
            Some(def) => {
                let decoded = match def.generic_type {
                    Some(ty) => decode_attribute(ty, generic),
                    None => generic,
                };
                record.insert(def.attribute.clone(), decoded);
            }
            None => {
                record.insert(column.to_string(), generic);
            }
        }
    }
    record
}

/// Convert a row into a record keyed by column name.
pub fn decode_raw_row(row: &Row) -> Record {
    row.iter()
        .map(|(column, value)| (column.to_string(), from_native_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_wrapped_values_flatten() {
        let id = Uuid::parse_str("c3a6f6e0-5e7a-11ee-8c99-0242ac120002").unwrap();
        assert_eq!(
            from_native_value(&NativeValue::TimeUuid(id)),
            json!("c3a6f6e0-5e7a-11ee-8c99-0242ac120002")
        );
        assert_eq!(from_native_value(&NativeValue::BigInt(1 << 40)), json!(1i64 << 40));
        assert_eq!(from_native_value(&NativeValue::Varint("17".into())), json!(17));
        assert_eq!(
            from_native_value(&NativeValue::Varint("99999999999999999999999".into())),
            json!("99999999999999999999999")
        );
        assert_eq!(
            from_native_value(&NativeValue::Decimal("3.14159265358979323846".into())),
            json!("3.14159265358979323846")
        );
        assert_eq!(
            from_native_value(&NativeValue::Inet("10.0.0.1".parse().unwrap())),
            json!("10.0.0.1")
        );
        assert_eq!(from_native_value(&NativeValue::Blob(vec![0xde, 0xad])), json!("0xdead"));
        assert_eq!(from_native_value(&NativeValue::Null), Value::Null);
    }

    #[test]
    fn test_timestamp_and_collections() {
        let ts = Utc.with_ymd_and_hms(1900, 1, 15, 5, 0, 0).unwrap();
        assert_eq!(
            from_native_value(&NativeValue::Timestamp(ts)),
            json!("1900-01-15T05:00:00.000Z")
        );

        let list = NativeValue::List(vec![NativeValue::BigInt(1), NativeValue::Null]);
        assert_eq!(from_native_value(&list), json!([1, null]));

        let map = NativeValue::Map(vec![(NativeValue::Int(1), NativeValue::Text("a".into()))]);
        assert_eq!(from_native_value(&map), json!({"1": "a"}));
    }

    #[test]
    fn test_to_native_scalars() {
        assert_eq!(
            to_native_value(&json!(42), &NativeType::BigInt).unwrap(),
            NativeValue::BigInt(42)
        );
        assert_eq!(
            to_native_value(&json!("42"), &NativeType::Int).unwrap(),
            NativeValue::Int(42)
        );
        assert!(to_native_value(&json!(1i64 << 40), &NativeType::Int).is_err());
        assert_eq!(
            to_native_value(&json!("1900-01-15"), &NativeType::Timestamp).unwrap(),
            NativeValue::Timestamp(Utc.with_ymd_and_hms(1900, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(
            to_native_value(&json!("0xdead"), &NativeType::Blob).unwrap(),
            NativeValue::Blob(vec![0xde, 0xad])
        );
        assert!(to_native_value(&json!("é"), &NativeType::Ascii).is_err());
        assert_eq!(
            to_native_value(&Value::Null, &NativeType::Uuid).unwrap(),
            NativeValue::Null
        );
    }

    #[test]
    fn test_time_uuid_requires_version_one() {
        let v4 = Uuid::new_v4().to_string();
        assert!(to_native_value(&json!(v4), &NativeType::TimeUuid).is_err());

        let v1 = Uuid::now_v1(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(
            to_native_value(&json!(v1.to_string()), &NativeType::TimeUuid).unwrap(),
            NativeValue::TimeUuid(v1)
        );
    }

    #[test]
    fn test_to_native_collections() {
        let list = NativeType::List(Box::new(NativeType::Text));
        assert_eq!(
            to_native_value(&json!(["a", "b"]), &list).unwrap(),
            NativeValue::List(vec![NativeValue::Text("a".into()), NativeValue::Text("b".into())])
        );
        assert!(to_native_value(&json!("a"), &list).is_err());
    }

    #[test]
    fn test_json_attributes_round_trip() {
        let doc = json!({"a": [1, 2], "b": "c"});
        let stored = encode_attribute(GenericType::Json, doc.clone());
        assert!(stored.is_string());
        assert_eq!(decode_attribute(GenericType::Json, stored), doc);

        assert_eq!(
            decode_attribute(GenericType::Json, json!("not json")),
            json!("not json")
        );
        assert_eq!(encode_attribute(GenericType::String, json!(5)), json!(5));
        assert_eq!(
            encode_attribute(GenericType::Array, json!(["a", 1, true])),
            json!(["a", "1", "true"])
        );
    }
}
