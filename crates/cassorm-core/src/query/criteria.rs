//! Criteria compiler.
//!
//! Turns a [`CriteriaNode`] into a parameterised `WHERE` clause body against
//! a compiled schema. Names are resolved column-first, then attribute; bound
//! objects are validated before any text is emitted.

use cassorm_proto::{CriteriaNode, CriteriaValue, Value};

use crate::catalog::SchemaDescriptor;
use crate::error::{Error, Result};

/// Predicate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IN`
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Upper,
    Lower,
}

impl Operator {
    /// Normalise a comparison token or alias.
    pub fn parse_bound(token: &str) -> Option<Self> {
        match token {
            "<" | "lessThan" => Some(Operator::Lt),
            "<=" | "lessThanOrEqual" => Some(Operator::Le),
            ">" | "greaterThan" => Some(Operator::Gt),
            ">=" | "greaterThanOrEqual" => Some(Operator::Ge),
            _ => None,
        }
    }

    /// CQL token.
    pub fn as_cql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "IN",
        }
    }

    fn side(&self) -> Option<Side> {
        match self {
            Operator::Lt | Operator::Le => Some(Side::Upper),
            Operator::Gt | Operator::Ge => Some(Side::Lower),
            Operator::Eq | Operator::In => None,
        }
    }
}

/// A compiled `WHERE` clause body and its parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledClause {
    /// Predicates joined with `AND`, without the `WHERE` keyword.
    pub text: String,
    /// Bound parameters in placeholder order.
    pub params: Vec<Value>,
}

impl CompiledClause {
    /// Whether the clause has no predicate.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Compiles criteria trees against one schema.
pub struct CriteriaCompiler<'a> {
    schema: &'a SchemaDescriptor,
}

impl<'a> CriteriaCompiler<'a> {
    /// Create a compiler for a schema.
    pub fn new(schema: &'a SchemaDescriptor) -> Self {
        Self { schema }
    }

    /// Compile a criteria tree.
    pub fn compile(&self, node: &CriteriaNode) -> Result<CompiledClause> {
        let mut predicates = Vec::new();
        let mut params = Vec::new();
        self.compile_node(node, &mut predicates, &mut params)?;
        Ok(CompiledClause {
            text: predicates.join(" AND "),
            params,
        })
    }

    fn compile_node(
        &self,
        node: &CriteriaNode,
        predicates: &mut Vec<String>,
        params: &mut Vec<Value>,
    ) -> Result<()> {
        match node {
            CriteriaNode::And(children) => {
                for child in children {
                    self.compile_node(child, predicates, params)?;
                }
                Ok(())
            }
            CriteriaNode::Field { name, value } => self.compile_field(name, value, predicates, params),
        }
    }

    fn compile_field(
        &self,
        name: &str,
        value: &CriteriaValue,
        predicates: &mut Vec<String>,
        params: &mut Vec<Value>,
    ) -> Result<()> {
        let column = &self.schema.resolve(name)?.name;
        match value {
            CriteriaValue::Scalar(v) => {
                predicates.push(predicate(column, Operator::Eq));
                params.push(v.clone());
            }
            CriteriaValue::List(items) => {
                predicates.push(predicate(column, Operator::In));
                params.push(Value::Array(items.clone()));
            }
            CriteriaValue::Bounds(bounds) => {
                for (op, operand) in validate_bounds(name, bounds)? {
                    predicates.push(predicate(column, op));
                    params.push(operand.clone());
                }
            }
        }
        Ok(())
    }
}

fn predicate(column: &str, op: Operator) -> String {
    match op {
        Operator::In => format!("\"{}\" IN (?)", column),
        _ => format!("\"{}\" {} ?", column, op.as_cql()),
    }
}

/// Normalise every bound and reject two bounds on the same side.
fn validate_bounds<'v>(
    field: &str,
    bounds: &'v [(String, Value)],
) -> Result<Vec<(Operator, &'v Value)>> {
    let mut seen: Vec<(Operator, &str)> = Vec::with_capacity(bounds.len());
    let mut out = Vec::with_capacity(bounds.len());

    for (token, operand) in bounds {
        let op = Operator::parse_bound(token).ok_or_else(|| Error::UnsupportedOperator {
            field: field.to_string(),
            op: token.clone(),
        })?;

        if let Some((_, first)) = seen.iter().find(|(prev, _)| prev.side() == op.side()) {
            return Err(Error::ConflictingOperator {
                field: field.to_string(),
                first: first.to_string(),
                second: token.clone(),
            });
        }

        if !matches!(operand, Value::String(_) | Value::Number(_)) {
            return Err(Error::InvalidOperand {
                field: field.to_string(),
                op: op.as_cql().to_string(),
                value: operand.to_string(),
            });
        }

        seen.push((op, token.as_str()));
        out.push((op, operand));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, ModelDef};
    use cassorm_proto::Criteria;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        let model = ModelDef::new("user")
            .with_attribute(AttributeDef::new("id", "string").primary_key())
            .with_attribute(AttributeDef::new("firstName", "string"))
            .with_attribute(AttributeDef::new("age", "integer"));
        SchemaDescriptor::compile(&model).unwrap()
    }

    fn compile(criteria: serde_json::Value) -> Result<CompiledClause> {
        let schema = schema();
        let criteria = Criteria::parse(&criteria, "id")?;
        let filter = criteria.filter.unwrap_or(CriteriaNode::And(Vec::new()));
        CriteriaCompiler::new(&schema).compile(&filter)
    }

    #[test]
    fn test_equality() {
        let clause = compile(json!({"firstName": "Joe"})).unwrap();
        assert_eq!(clause.text, "\"firstname\" = ?");
        assert_eq!(clause.params, vec![json!("Joe")]);
    }

    #[test]
    fn test_membership_binds_one_list() {
        let clause = compile(json!({"firstName": ["Joe", "Peter", "Greg"]})).unwrap();
        assert_eq!(clause.text, "\"firstname\" IN (?)");
        assert_eq!(clause.params, vec![json!(["Joe", "Peter", "Greg"])]);
    }

    #[test]
    fn test_range() {
        let clause = compile(json!({"age": {"greaterThanOrEqual": 25, "<": 50}})).unwrap();
        assert_eq!(clause.text, "\"age\" >= ? AND \"age\" < ?");
        assert_eq!(clause.params, vec![json!(25), json!(50)]);
    }

    #[test]
    fn test_conjunction_keeps_key_order() {
        let clause = compile(json!({"age": {">": 1}, "firstname": "Joe", "id": "x"})).unwrap();
        assert_eq!(clause.text, "\"age\" > ? AND \"firstname\" = ? AND \"id\" = ?");
        assert_eq!(clause.params, vec![json!(1), json!("Joe"), json!("x")]);
    }

    #[test]
    fn test_conflicting_bounds() {
        assert!(matches!(
            compile(json!({"age": {"<": 10, "lessThanOrEqual": 20}})),
            Err(Error::ConflictingOperator { .. })
        ));
        assert!(matches!(
            compile(json!({"age": {"greaterThan": 10, ">": 20}})),
            Err(Error::ConflictingOperator { .. })
        ));
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            compile(json!({"nickname": "Jo"})),
            Err(Error::UnknownField(name)) if name == "nickname"
        ));
    }

    #[test]
    fn test_bad_operators() {
        assert!(matches!(
            compile(json!({"age": {"like": "4%"}})),
            Err(Error::UnsupportedOperator { .. })
        ));
        assert!(matches!(
            compile(json!({"age": {"<": [1, 2]}})),
            Err(Error::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let criteria = json!({"age": {"<=": 40, ">": 20}, "firstName": ["a", "b"]});
        assert_eq!(compile(criteria.clone()).unwrap(), compile(criteria).unwrap());
    }
}
