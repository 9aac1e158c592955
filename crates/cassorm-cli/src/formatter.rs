//! Output formatters for statement previews.

use clap::ValueEnum;
use serde_json::{json, Value};

use crate::commands::Preview;

/// Output format for previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON document
    Json,
    /// CQL text with parameters as comments
    Cql,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Cql => write!(f, "cql"),
        }
    }
}

/// Render a preview in the requested format.
pub fn render(preview: &Preview, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let doc = to_json(preview);
            serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
        }
        OutputFormat::Cql => to_cql(preview),
    }
}

fn to_json(preview: &Preview) -> Value {
    let steps: Vec<Value> = preview
        .steps
        .iter()
        .map(|step| {
            json!({
                "step": step.label,
                "kind": step.statement.kind.to_string(),
                "cql": step.statement.text,
                "params": step.statement.params,
                "allowFiltering": step.statement.allow_filtering,
            })
        })
        .collect();

    let mut doc = json!({
        "plan": preview.plan,
        "statements": steps,
    });
    if let Some(record) = &preview.record {
        doc["record"] = Value::Object(record.clone());
    }
    doc
}

fn to_cql(preview: &Preview) -> String {
    let mut out = String::new();
    for step in &preview.steps {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("-- {}\n", step.label));
        if !step.statement.params.is_empty() {
            out.push_str(&format!("-- params: {}\n", Value::from(step.statement.params.clone())));
        }
        out.push_str(&step.statement.text);
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str("-- nothing to run\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Step;
    use cassorm_proto::{CompiledStatement, StatementKind};
    use pretty_assertions::assert_eq;

    fn preview() -> Preview {
        Preview {
            plan: "direct",
            steps: vec![Step {
                label: "delete",
                statement: CompiledStatement::new(StatementKind::Delete, "DELETE FROM t WHERE \"id\" = ?;")
                    .with_params(vec![json!("a")]),
            }],
            record: None,
        }
    }

    #[test]
    fn test_render_json() {
        let doc: Value = serde_json::from_str(&render(&preview(), OutputFormat::Json)).unwrap();
        assert_eq!(
            doc,
            json!({
                "plan": "direct",
                "statements": [{
                    "step": "delete",
                    "kind": "DELETE",
                    "cql": "DELETE FROM t WHERE \"id\" = ?;",
                    "params": ["a"],
                    "allowFiltering": false
                }]
            })
        );
    }

    #[test]
    fn test_render_cql() {
        assert_eq!(
            render(&preview(), OutputFormat::Cql),
            "-- delete\n-- params: [\"a\"]\nDELETE FROM t WHERE \"id\" = ?;\n"
        );
        let empty = Preview {
            plan: "migrate",
            steps: Vec::new(),
            record: None,
        };
        assert_eq!(render(&empty, OutputFormat::Cql), "-- nothing to run\n");
    }
}
