//! Attribute and column type vocabularies and the mapping between them.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Attribute types of the ORM's model definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericType {
    /// Short string.
    String,
    /// Long string.
    Text,
    /// Arbitrary JSON document, stored as text.
    Json,
    /// E-mail address.
    Email,
    /// Integer number.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// Binary data.
    Binary,
    /// Array of strings.
    Array,
}

impl GenericType {
    /// Every generic type, in declaration order.
    pub const ALL: [GenericType; 11] = [
        GenericType::String,
        GenericType::Text,
        GenericType::Json,
        GenericType::Email,
        GenericType::Integer,
        GenericType::Float,
        GenericType::Boolean,
        GenericType::Date,
        GenericType::Datetime,
        GenericType::Binary,
        GenericType::Array,
    ];

    /// Parse a type name (case-insensitive).
    pub fn parse(name: &str) -> Result<Self, Error> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Ok(GenericType::String),
            "text" => Ok(GenericType::Text),
            "json" => Ok(GenericType::Json),
            "email" => Ok(GenericType::Email),
            "integer" => Ok(GenericType::Integer),
            "float" => Ok(GenericType::Float),
            "boolean" => Ok(GenericType::Boolean),
            "date" => Ok(GenericType::Date),
            "datetime" => Ok(GenericType::Datetime),
            "binary" => Ok(GenericType::Binary),
            "array" => Ok(GenericType::Array),
            _ => Err(Error::UnsupportedType(name.to_string())),
        }
    }

    /// Type name as written in model definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenericType::String => "string",
            GenericType::Text => "text",
            GenericType::Json => "json",
            GenericType::Email => "email",
            GenericType::Integer => "integer",
            GenericType::Float => "float",
            GenericType::Boolean => "boolean",
            GenericType::Date => "date",
            GenericType::Datetime => "datetime",
            GenericType::Binary => "binary",
            GenericType::Array => "array",
        }
    }

    /// Column type backing this attribute type.
    pub fn native_type(&self) -> NativeType {
        match self {
            GenericType::String | GenericType::Text | GenericType::Json => NativeType::Text,
            GenericType::Email => NativeType::Ascii,
            GenericType::Integer => NativeType::BigInt,
            GenericType::Float => NativeType::Double,
            GenericType::Boolean => NativeType::Boolean,
            GenericType::Date | GenericType::Datetime => NativeType::Timestamp,
            GenericType::Binary => NativeType::Blob,
            GenericType::Array => NativeType::List(Box::new(NativeType::Text)),
        }
    }
}

impl FromStr for GenericType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column types of the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// `ascii`.
    Ascii,
    /// `bigint`.
    BigInt,
    /// `blob`.
    Blob,
    /// `boolean`.
    Boolean,
    /// `counter`.
    Counter,
    /// `date`.
    Date,
    /// `decimal`.
    Decimal,
    /// `double`.
    Double,
    /// `float`.
    Float,
    /// `inet`.
    Inet,
    /// `int`.
    Int,
    /// `text` (alias `varchar`).
    Text,
    /// `timestamp`.
    Timestamp,
    /// `timeuuid`.
    TimeUuid,
    /// `uuid`.
    Uuid,
    /// `varint`.
    Varint,
    /// `list<T>`.
    List(Box<NativeType>),
    /// `set<T>`.
    Set(Box<NativeType>),
    /// `map<K, V>`.
    Map(Box<NativeType>, Box<NativeType>),
}

impl NativeType {
    /// Parse a CQL type name as reported by the store's system tables.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        let simple = match name.as_str() {
            "ascii" => Some(NativeType::Ascii),
            "bigint" => Some(NativeType::BigInt),
            "blob" => Some(NativeType::Blob),
            "boolean" => Some(NativeType::Boolean),
            "counter" => Some(NativeType::Counter),
            "date" => Some(NativeType::Date),
            "decimal" => Some(NativeType::Decimal),
            "double" => Some(NativeType::Double),
            "float" => Some(NativeType::Float),
            "inet" => Some(NativeType::Inet),
            "int" => Some(NativeType::Int),
            "text" | "varchar" => Some(NativeType::Text),
            "timestamp" => Some(NativeType::Timestamp),
            "timeuuid" => Some(NativeType::TimeUuid),
            "uuid" => Some(NativeType::Uuid),
            "varint" => Some(NativeType::Varint),
            _ => None,
        };
        if simple.is_some() {
            return simple;
        }

        let (outer, inner) = name.strip_suffix('>')?.split_once('<')?;
        match outer.trim() {
            "list" => Some(NativeType::List(Box::new(Self::parse(inner)?))),
            "set" => Some(NativeType::Set(Box::new(Self::parse(inner)?))),
            "map" => {
                let (key, value) = split_top_level(inner)?;
                Some(NativeType::Map(
                    Box::new(Self::parse(key)?),
                    Box::new(Self::parse(value)?),
                ))
            }
            "frozen" => Self::parse(inner),
            _ => None,
        }
    }
}

/// Split `k, v` at the first comma not nested inside `<...>`.
fn split_top_level(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&s[..i], &s[i + 1..])),
            _ => {}
        }
    }
    None
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::Ascii => f.write_str("ascii"),
            NativeType::BigInt => f.write_str("bigint"),
            NativeType::Blob => f.write_str("blob"),
            NativeType::Boolean => f.write_str("boolean"),
            NativeType::Counter => f.write_str("counter"),
            NativeType::Date => f.write_str("date"),
            NativeType::Decimal => f.write_str("decimal"),
            NativeType::Double => f.write_str("double"),
            NativeType::Float => f.write_str("float"),
            NativeType::Inet => f.write_str("inet"),
            NativeType::Int => f.write_str("int"),
            NativeType::Text => f.write_str("text"),
            NativeType::Timestamp => f.write_str("timestamp"),
            NativeType::TimeUuid => f.write_str("timeuuid"),
            NativeType::Uuid => f.write_str("uuid"),
            NativeType::Varint => f.write_str("varint"),
            NativeType::List(inner) => write!(f, "list<{}>", inner),
            NativeType::Set(inner) => write!(f, "set<{}>", inner),
            NativeType::Map(key, value) => write!(f, "map<{}, {}>", key, value),
        }
    }
}

/// Map an attribute type name to a column type.
///
/// Unknown names fall back to `text` with a warning, so models declaring
/// types this adapter does not know about still compile.
pub fn to_native_type(generic: &str) -> NativeType {
    match GenericType::parse(generic) {
        Ok(ty) => ty.native_type(),
        Err(_) => {
            tracing::warn!(attr_type = generic, "unregistered attribute type, treating as text");
            NativeType::Text
        }
    }
}

/// Map a column type back to the attribute type that would produce it.
pub fn from_native_type(native: &NativeType) -> GenericType {
    match native {
        NativeType::Text | NativeType::Uuid | NativeType::TimeUuid | NativeType::Inet => {
            GenericType::String
        }
        NativeType::Ascii => GenericType::Email,
        NativeType::BigInt | NativeType::Int | NativeType::Varint | NativeType::Counter => {
            GenericType::Integer
        }
        NativeType::Double | NativeType::Float | NativeType::Decimal => GenericType::Float,
        NativeType::Boolean => GenericType::Boolean,
        NativeType::Timestamp => GenericType::Datetime,
        NativeType::Date => GenericType::Date,
        NativeType::Blob => GenericType::Binary,
        NativeType::List(_) | NativeType::Set(_) => GenericType::Array,
        NativeType::Map(_, _) => GenericType::Json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_to_native() {
        assert_eq!(to_native_type("string"), NativeType::Text);
        assert_eq!(to_native_type("JSON"), NativeType::Text);
        assert_eq!(to_native_type("email"), NativeType::Ascii);
        assert_eq!(to_native_type("integer"), NativeType::BigInt);
        assert_eq!(to_native_type("float"), NativeType::Double);
        assert_eq!(to_native_type("date"), NativeType::Timestamp);
        assert_eq!(to_native_type("datetime"), NativeType::Timestamp);
        assert_eq!(to_native_type("binary"), NativeType::Blob);
        assert_eq!(to_native_type("array").to_string(), "list<text>");
    }

    #[test]
    fn test_unknown_type_falls_back_to_text() {
        assert!(matches!(
            GenericType::parse("geopoint"),
            Err(Error::UnsupportedType(name)) if name == "geopoint"
        ));
        assert_eq!(to_native_type("geopoint"), NativeType::Text);
    }

    #[test]
    fn test_native_type_round_trip_is_stable() {
        for generic in GenericType::ALL {
            let native = generic.native_type();
            assert_eq!(
                from_native_type(&native).native_type(),
                native,
                "unstable mapping for {}",
                generic
            );
        }
    }

    #[test]
    fn test_native_type_parse() {
        assert_eq!(NativeType::parse("varchar"), Some(NativeType::Text));
        assert_eq!(NativeType::parse("TimeUUID"), Some(NativeType::TimeUuid));
        assert_eq!(
            NativeType::parse("list<text>"),
            Some(NativeType::List(Box::new(NativeType::Text)))
        );
        assert_eq!(
            NativeType::parse("map<text, frozen<list<int>>>"),
            Some(NativeType::Map(
                Box::new(NativeType::Text),
                Box::new(NativeType::List(Box::new(NativeType::Int)))
            ))
        );
        assert_eq!(NativeType::parse("tuple<int, int>"), None);
        assert_eq!(NativeType::parse("whatever"), None);
    }

    #[test]
    fn test_display_matches_parse() {
        let types = [
            NativeType::TimeUuid,
            NativeType::Set(Box::new(NativeType::Inet)),
            NativeType::Map(Box::new(NativeType::Ascii), Box::new(NativeType::Varint)),
        ];
        for ty in types {
            assert_eq!(NativeType::parse(&ty.to_string()), Some(ty));
        }
    }
}
