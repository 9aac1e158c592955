//! Criteria types.
//!
//! The ORM hands criteria over as loosely shaped JSON: sometimes a bare
//! primary key value, sometimes a `where` object, sometimes a full
//! `{where, limit, skip, sort}` envelope. [`Criteria::parse`] resolves all
//! of these once, at the boundary, into a tagged tree so the compilers
//! never inspect JSON shapes again.

use serde_json::{Map, Value};

use crate::error::Error;

/// Keys that mark a criteria object as a full envelope rather than a bare
/// `where` clause.
const ENVELOPE_KEYS: [&str; 4] = ["where", "limit", "skip", "sort"];

/// Key holding an array of nested conjunctions.
pub const AND_KEY: &str = "and";

/// Key the ORM uses for disjunctions, which the store cannot evaluate.
pub const OR_KEY: &str = "or";

/// Right-hand side of a single attribute predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaValue {
    /// `attr = value`.
    Scalar(Value),
    /// `attr IN (values)`.
    List(Vec<Value>),
    /// Comparison bounds keyed by operator token or alias, in caller order.
    Bounds(Vec<(String, Value)>),
}

/// A node of the criteria tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaNode {
    /// A predicate on one attribute (or column) name.
    Field {
        /// Attribute or column name as written by the caller.
        name: String,
        /// Predicate value.
        value: CriteriaValue,
    },
    /// All children must hold.
    And(Vec<CriteriaNode>),
}

impl CriteriaNode {
    /// Create an equality predicate.
    pub fn eq(name: impl Into<String>, value: impl Into<Value>) -> Self {
        CriteriaNode::Field {
            name: name.into(),
            value: CriteriaValue::Scalar(value.into()),
        }
    }

    /// Create a membership predicate.
    pub fn is_in(name: impl Into<String>, values: Vec<Value>) -> Self {
        CriteriaNode::Field {
            name: name.into(),
            value: CriteriaValue::List(values),
        }
    }

    /// Create a bounds predicate.
    pub fn bounds(name: impl Into<String>, bounds: Vec<(String, Value)>) -> Self {
        CriteriaNode::Field {
            name: name.into(),
            value: CriteriaValue::Bounds(bounds),
        }
    }

    /// Parse a `where` object.
    pub fn parse(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) => Self::parse_object(map),
            _ => Err(Error::InvalidCriteria(
                "the where clause must be an object".to_string(),
            )),
        }
    }

    fn parse_object(map: &Map<String, Value>) -> Result<Self, Error> {
        let mut children = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                AND_KEY => {
                    let Value::Array(items) = value else {
                        return Err(Error::InvalidCriteria(
                            "'and' expects an array of objects".to_string(),
                        ));
                    };
                    let nested = items.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                    children.push(CriteriaNode::And(nested));
                }
                OR_KEY => {
                    return Err(Error::InvalidCriteria(
                        "disjunctions are not supported by the store".to_string(),
                    ));
                }
                _ => children.push(CriteriaNode::Field {
                    name: key.clone(),
                    value: parse_value(key, value)?,
                }),
            }
        }
        Ok(CriteriaNode::And(children))
    }

    /// Whether the node contains no predicate at all.
    pub fn is_empty(&self) -> bool {
        match self {
            CriteriaNode::Field { .. } => false,
            CriteriaNode::And(children) => children.iter().all(CriteriaNode::is_empty),
        }
    }

    /// Flatten nested conjunctions into the list of field predicates.
    pub fn fields(&self) -> Vec<(&str, &CriteriaValue)> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<(&'a str, &'a CriteriaValue)>) {
        match self {
            CriteriaNode::Field { name, value } => out.push((name.as_str(), value)),
            CriteriaNode::And(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn parse_value(key: &str, value: &Value) -> Result<CriteriaValue, Error> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            Ok(CriteriaValue::Scalar(value.clone()))
        }
        Value::Array(items) => {
            if let Some(bad) = items.iter().find(|item| !is_scalar(item)) {
                return Err(Error::InvalidCriteria(format!(
                    "membership list for '{}' contains a non-scalar value: {}",
                    key, bad
                )));
            }
            Ok(CriteriaValue::List(items.clone()))
        }
        Value::Object(bounds) => {
            if bounds.is_empty() {
                return Err(Error::InvalidCriteria(format!(
                    "empty operator object for '{}'",
                    key
                )));
            }
            Ok(CriteriaValue::Bounds(
                bounds.iter().map(|(op, v)| (op.clone(), v.clone())).collect(),
            ))
        }
        Value::Null => Err(Error::InvalidCriteria(format!(
            "value for attribute '{}' must be a scalar, an array or an operator object",
            key
        ))),
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// CQL keyword.
    pub fn as_cql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    fn parse(field: &str, value: &Value) -> Result<Self, Error> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(SortDirection::Asc),
                Some(-1) => Ok(SortDirection::Desc),
                _ => Err(Error::InvalidSort(format!("bad direction {} for '{}'", n, field))),
            },
            Value::Bool(ascending) => Ok(if *ascending {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            }),
            Value::String(s) => Self::parse_keyword(field, s),
            other => Err(Error::InvalidSort(format!(
                "bad direction {} for '{}'",
                other, field
            ))),
        }
    }

    fn parse_keyword(field: &str, keyword: &str) -> Result<Self, Error> {
        match keyword.to_ascii_lowercase().as_str() {
            "asc" | "1" => Ok(SortDirection::Asc),
            "desc" | "-1" => Ok(SortDirection::Desc),
            _ => Err(Error::InvalidSort(format!(
                "bad direction '{}' for '{}'",
                keyword, field
            ))),
        }
    }
}

/// Ordering on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    /// Attribute or column name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortSpec {
    /// Ascending order on a field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending order on a field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `{attr: 1|-1|"asc"|"desc"}` or `"attr desc, other"`.
    pub fn parse_all(value: &Value) -> Result<Vec<Self>, Error> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => map
                .iter()
                .map(|(field, dir)| -> Result<Self, Error> {
                    Ok(SortSpec {
                        field: field.clone(),
                        direction: SortDirection::parse(field, dir)?,
                    })
                })
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| -> Result<Self, Error> {
                    let mut words = part.split_whitespace();
                    let field = words.next().unwrap_or_default().to_string();
                    let direction = match words.next() {
                        Some(keyword) => SortDirection::parse_keyword(&field, keyword)?,
                        None => SortDirection::Asc,
                    };
                    Ok(SortSpec { field, direction })
                })
                .collect(),
            other => Err(Error::InvalidSort(format!("unsupported sort shape: {}", other))),
        }
    }
}

/// Normalised criteria: filter plus paging and ordering options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Criteria {
    /// Filter tree; `None` selects everything.
    pub filter: Option<CriteriaNode>,
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Rows to drop from the front of the result (applied client-side).
    pub skip: Option<u64>,
    /// Ordering.
    pub sort: Vec<SortSpec>,
}

impl Criteria {
    /// Criteria matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria pinning one attribute to a value.
    pub fn by_key(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with_filter(CriteriaNode::eq(attribute, value))
    }

    /// Resolve any of the accepted shapes.
    ///
    /// A bare scalar is taken as the value of `primary_key`.
    ///
    /// Some keys are reserved. An object holding any of `where`, `limit`,
    /// `skip` or `sort` is read as an envelope, so a bare filter cannot name
    /// attributes called that; wrap it in `where` instead. Inside a filter,
    /// `and` and `or` are always operators and never attribute names.
    pub fn parse(value: &Value, primary_key: &str) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                Ok(Self::by_key(primary_key, value.clone()))
            }
            Value::Array(_) => Ok(Self::new().with_filter(CriteriaNode::Field {
                name: primary_key.to_string(),
                value: parse_value(primary_key, value)?,
            })),
            Value::Object(map) if ENVELOPE_KEYS.iter().any(|k| map.contains_key(*k)) => {
                let mut criteria = Self::new();
                if let Some(filter) = map.get("where").filter(|w| !w.is_null()) {
                    criteria = criteria.with_filter(CriteriaNode::parse(filter)?);
                }
                criteria.limit = parse_count(map, "limit")?;
                criteria.skip = parse_count(map, "skip")?;
                if let Some(sort) = map.get("sort") {
                    criteria.sort = SortSpec::parse_all(sort)?;
                }
                Ok(criteria)
            }
            Value::Object(_) => Ok(Self::new().with_filter(CriteriaNode::parse(value)?)),
        }
    }

    /// Set the filter. Empty conjunctions are dropped.
    pub fn with_filter(mut self, filter: CriteriaNode) -> Self {
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of rows to skip.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Add an ordering.
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort.push(sort);
        self
    }

    /// Whether there is no filter.
    pub fn is_unfiltered(&self) -> bool {
        self.filter.is_none()
    }
}

fn parse_count(map: &Map<String, Value>, key: &str) -> Result<Option<u64>, Error> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::InvalidCriteria(format!("'{}' must be a non-negative integer", key))),
        Some(other) => Err(Error::InvalidCriteria(format!(
            "'{}' must be a non-negative integer, got {}",
            key, other
        ))),
    }
}
