//! Compiled statements handed to the session.

use std::fmt;

use serde_json::Value;

/// What a statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `SELECT`.
    Select,
    /// `INSERT`.
    Insert,
    /// `UPDATE`.
    Update,
    /// `DELETE`.
    Delete,
    /// `BEGIN BATCH ... APPLY BATCH`.
    Batch,
    /// DDL (`CREATE`, `DROP`, `ALTER`).
    Schema,
}

impl StatementKind {
    /// Whether the statement writes rows.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete | StatementKind::Batch
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Batch => "BATCH",
            StatementKind::Schema => "SCHEMA",
        };
        f.write_str(name)
    }
}

/// Statement text with positional `?` placeholders and its bound values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// Statement kind.
    pub kind: StatementKind,
    /// CQL text.
    pub text: String,
    /// Bound parameters, one per placeholder.
    pub params: Vec<Value>,
    /// Whether the statement opts into non-index filtering (`ALLOW FILTERING`).
    pub allow_filtering: bool,
}

impl CompiledStatement {
    /// Create a statement without parameters.
    pub fn new(kind: StatementKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            params: Vec::new(),
            allow_filtering: false,
        }
    }

    /// Create a DDL statement.
    pub fn schema(text: impl Into<String>) -> Self {
        Self::new(StatementKind::Schema, text)
    }

    /// Set the bound parameters.
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Number of `?` placeholders in the text, ignoring quoted identifiers
    /// and string literals.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;
        for c in self.text.chars() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '?') => count += 1,
                _ => {}
            }
        }
        count
    }
}

impl fmt::Display for CompiledStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Statements submitted together for combined execution.
///
/// A batch is not a transaction: the store may apply part of it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    statements: Vec<CompiledStatement>,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement.
    pub fn push(&mut self, statement: CompiledStatement) {
        self.statements.push(statement);
    }

    /// Statements in submission order.
    pub fn statements(&self) -> &[CompiledStatement] {
        &self.statements
    }

    /// Number of statements.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render as a single `BEGIN BATCH ... APPLY BATCH;` statement with the
    /// parameters of every member concatenated in order.
    pub fn to_statement(&self) -> CompiledStatement {
        let mut text = String::from("BEGIN BATCH\n");
        let mut params = Vec::new();
        for statement in &self.statements {
            text.push_str("  ");
            text.push_str(statement.text.trim_end_matches(';'));
            text.push_str(";\n");
            params.extend(statement.params.iter().cloned());
        }
        text.push_str("APPLY BATCH;");
        CompiledStatement::new(StatementKind::Batch, text).with_params(params)
    }
}

impl FromIterator<CompiledStatement> for Batch {
    fn from_iter<I: IntoIterator<Item = CompiledStatement>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Batch {
    type Item = CompiledStatement;
    type IntoIter = std::vec::IntoIter<CompiledStatement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

/// Caller-supplied statement text passed straight to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum RawQuery {
    /// One statement.
    Single {
        /// CQL text.
        text: String,
        /// Bound parameters.
        params: Vec<Value>,
    },
    /// Several statements executed as one batch; params are per statement.
    Batch(Vec<(String, Vec<Value>)>),
}

impl RawQuery {
    /// Create a single raw statement.
    pub fn single(text: impl Into<String>, params: Vec<Value>) -> Self {
        RawQuery::Single {
            text: text.into(),
            params,
        }
    }

    /// Classify raw statement text by its leading keyword.
    pub fn kind_of(text: &str) -> StatementKind {
        let keyword = text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "SELECT" => StatementKind::Select,
            "INSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            "BEGIN" => StatementKind::Batch,
            _ => StatementKind::Schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_placeholder_count_skips_quotes() {
        let stmt = CompiledStatement::new(
            StatementKind::Select,
            r#"SELECT "a?" FROM t WHERE "x" = ? AND "y" IN (?) AND z = 'what?';"#,
        );
        assert_eq!(stmt.placeholder_count(), 2);
    }

    #[test]
    fn test_batch_to_statement() {
        let batch: Batch = vec![
            CompiledStatement::new(StatementKind::Delete, r#"DELETE FROM t WHERE "id" = ?;"#)
                .with_params(vec![json!("a")]),
            CompiledStatement::new(StatementKind::Delete, r#"DELETE FROM t WHERE "id" = ?;"#)
                .with_params(vec![json!("b")]),
        ]
        .into_iter()
        .collect();

        let stmt = batch.to_statement();
        assert_eq!(stmt.kind, StatementKind::Batch);
        assert_eq!(
            stmt.text,
            "BEGIN BATCH\n  DELETE FROM t WHERE \"id\" = ?;\n  DELETE FROM t WHERE \"id\" = ?;\nAPPLY BATCH;"
        );
        assert_eq!(stmt.params, vec![json!("a"), json!("b")]);
        assert_eq!(stmt.placeholder_count(), 2);
    }

    #[test]
    fn test_raw_kind() {
        assert_eq!(RawQuery::kind_of("select * from t"), StatementKind::Select);
        assert_eq!(RawQuery::kind_of("  UPDATE t SET"), StatementKind::Update);
        assert_eq!(RawQuery::kind_of("CREATE TABLE t"), StatementKind::Schema);
        assert!(StatementKind::Batch.is_mutation());
        assert!(!StatementKind::Select.is_mutation());
    }
}
