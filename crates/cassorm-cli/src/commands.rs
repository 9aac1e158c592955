//! Subcommands and the statements they compile.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde_json::Value;

use cassorm_core::migration::{self, MigrateMode};
use cassorm_core::{ModelDef, MutationPlan, SchemaDescriptor, StatementBuilder};
use cassorm_proto::{CompiledStatement, Criteria, Record};

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The model file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An argument was not valid JSON.
    #[error("invalid JSON in {what}: {source}")]
    Json {
        what: &'static str,
        source: serde_json::Error,
    },

    /// An argument had the wrong JSON shape.
    #[error("{0}")]
    Shape(String),

    /// Model or statement compilation failed.
    #[error(transparent)]
    Compile(#[from] cassorm_core::Error),

    /// Criteria normalisation failed.
    #[error(transparent)]
    Criteria(#[from] cassorm_proto::Error),
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print CREATE TABLE and CREATE INDEX statements
    Ddl {
        /// Model definition (JSON)
        model: PathBuf,
    },

    /// Print the statements a registration would run in the given mode,
    /// assuming the table does not exist yet
    Migrate {
        /// Model definition (JSON)
        model: PathBuf,

        /// safe, alter or drop
        #[arg(long, default_value = "safe")]
        mode: MigrateMode,
    },

    /// Compile a find
    Select {
        /// Model definition (JSON)
        model: PathBuf,

        /// ORM criteria (JSON)
        #[arg(long)]
        criteria: Option<String>,
    },

    /// Compile a count
    Count {
        /// Model definition (JSON)
        model: PathBuf,

        /// ORM criteria (JSON)
        #[arg(long)]
        criteria: Option<String>,
    },

    /// Compile a create
    Insert {
        /// Model definition (JSON)
        model: PathBuf,

        /// Record to insert (JSON object)
        #[arg(long)]
        record: String,
    },

    /// Compile an update
    Update {
        /// Model definition (JSON)
        model: PathBuf,

        /// ORM criteria (JSON)
        #[arg(long)]
        criteria: Option<String>,

        /// Values to assign (JSON object)
        #[arg(long)]
        values: String,
    },

    /// Compile a destroy
    Delete {
        /// Model definition (JSON)
        model: PathBuf,

        /// ORM criteria (JSON)
        #[arg(long)]
        criteria: Option<String>,
    },
}

impl Command {
    /// Model file the command compiles against.
    pub fn model_path(&self) -> &Path {
        match self {
            Command::Ddl { model }
            | Command::Migrate { model, .. }
            | Command::Select { model, .. }
            | Command::Count { model, .. }
            | Command::Insert { model, .. }
            | Command::Update { model, .. }
            | Command::Delete { model, .. } => model,
        }
    }
}

/// One statement of a preview, labelled with its role.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub label: &'static str,
    pub statement: CompiledStatement,
}

impl Step {
    fn new(label: &'static str, statement: CompiledStatement) -> Self {
        Self { label, statement }
    }
}

/// What a command would send to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// `direct`, `select-then-batch`, `ddl`, ...
    pub plan: &'static str,
    pub steps: Vec<Step>,
    /// The record returned to the caller, when known before execution.
    pub record: Option<Record>,
}

impl Preview {
    fn new(plan: &'static str, steps: Vec<Step>) -> Self {
        Self {
            plan,
            steps,
            record: None,
        }
    }
}

/// Read and compile a model definition file.
pub fn load_schema(path: &Path) -> Result<SchemaDescriptor, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&text).map_err(|source| CliError::Json {
        what: "model",
        source,
    })?;
    let model = ModelDef::from_json(&value)?;
    Ok(SchemaDescriptor::compile(&model)?)
}

/// Compile `command` against `schema`.
pub fn preview(command: &Command, schema: &SchemaDescriptor) -> Result<Preview, CliError> {
    let builder = StatementBuilder::new(schema);

    let preview = match command {
        Command::Ddl { .. } => Preview::new(
            "ddl",
            schema
                .ddl_statements()
                .into_iter()
                .map(|s| Step::new("schema", s))
                .collect(),
        ),
        Command::Migrate { mode, .. } => Preview::new(
            "migrate",
            migration::plan(*mode, schema, None)
                .into_iter()
                .map(|step| Step::new("schema", step.statement))
                .collect(),
        ),
        Command::Select { criteria, .. } => {
            let criteria = parse_criteria(criteria.as_deref(), schema)?;
            let plan = if builder.pinned_key(&criteria)?.is_some() {
                "direct"
            } else {
                "query"
            };
            Preview::new(plan, vec![Step::new("select", builder.select(&criteria)?)])
        }
        Command::Count { criteria, .. } => {
            let criteria = parse_criteria(criteria.as_deref(), schema)?;
            Preview::new("query", vec![Step::new("count", builder.count(&criteria)?)])
        }
        Command::Insert { record, .. } => {
            let record = parse_object("record", record)?;
            let plan = builder.insert(&record)?;
            let mut preview = Preview::new("batch", vec![Step::new("insert", plan.statement)]);
            preview.record = Some(plan.record);
            preview
        }
        Command::Update {
            criteria, values, ..
        } => {
            let criteria = parse_criteria(criteria.as_deref(), schema)?;
            let values = parse_object("values", values)?;
            mutation_preview(builder.update(&criteria, &values)?.plan)
        }
        Command::Delete { criteria, .. } => {
            let criteria = parse_criteria(criteria.as_deref(), schema)?;
            mutation_preview(builder.delete(&criteria)?)
        }
    };

    tracing::debug!(plan = preview.plan, statements = preview.steps.len(), "compiled");
    Ok(preview)
}

fn mutation_preview(plan: MutationPlan) -> Preview {
    match plan {
        MutationPlan::Direct { statement, key } => {
            let label = step_label(&statement);
            let mut preview = Preview::new("direct", vec![Step::new(label, statement)]);
            preview.record = Some(key);
            preview
        }
        MutationPlan::SelectThenMutate { select, template } => {
            let per_row = template.unbound();
            let label = step_label(&per_row);
            Preview::new(
                "select-then-batch",
                vec![Step::new("select", select), Step::new(label, per_row)],
            )
        }
    }
}

fn step_label(statement: &CompiledStatement) -> &'static str {
    match statement.kind {
        cassorm_proto::StatementKind::Update => "update",
        cassorm_proto::StatementKind::Delete => "delete",
        _ => "statement",
    }
}

fn parse_criteria(raw: Option<&str>, schema: &SchemaDescriptor) -> Result<Criteria, CliError> {
    let value = match raw {
        Some(raw) => serde_json::from_str(raw).map_err(|source| CliError::Json {
            what: "criteria",
            source,
        })?,
        None => Value::Null,
    };
    Ok(Criteria::parse(&value, schema.partition_attribute())?)
}

fn parse_object(what: &'static str, raw: &str) -> Result<Record, CliError> {
    match serde_json::from_str(raw).map_err(|source| CliError::Json { what, source })? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Shape(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        let model = ModelDef::from_json(&json!({
            "identity": "Post",
            "attributes": {
                "slug": {"type": "string", "primaryKey": true},
                "title": "string",
                "tags": {"type": "array", "index": true}
            }
        }))
        .unwrap();
        SchemaDescriptor::compile(&model).unwrap()
    }

    fn model() -> PathBuf {
        PathBuf::from("post.json")
    }

    fn texts(preview: &Preview) -> Vec<&str> {
        preview.steps.iter().map(|s| s.statement.text.as_str()).collect()
    }

    #[test]
    fn test_ddl_preview() {
        let preview = preview(&Command::Ddl { model: model() }, &schema()).unwrap();
        assert_eq!(preview.plan, "ddl");
        assert_eq!(
            texts(&preview),
            vec![
                "CREATE TABLE post (\"slug\" text, \"title\" text, \"tags\" list<text>, PRIMARY KEY (\"slug\"));",
                "CREATE INDEX idx__post__tags ON post (\"tags\");",
            ]
        );
    }

    #[test]
    fn test_select_by_key_is_direct() {
        let command = Command::Select {
            model: model(),
            criteria: Some("\"hello\"".to_string()),
        };
        let preview = preview(&command, &schema()).unwrap();
        assert_eq!(preview.plan, "direct");
        assert_eq!(preview.steps[0].statement.params, vec![json!("hello")]);
    }

    #[test]
    fn test_delete_by_filter_is_two_phase() {
        let command = Command::Delete {
            model: model(),
            criteria: Some(r#"{"title": "Draft"}"#.to_string()),
        };
        let preview = preview(&command, &schema()).unwrap();
        assert_eq!(preview.plan, "select-then-batch");
        assert_eq!(
            texts(&preview),
            vec![
                "SELECT \"slug\" FROM post WHERE \"title\" = ? ALLOW FILTERING;",
                "DELETE FROM post WHERE \"slug\" = ?;",
            ]
        );
        assert_eq!(preview.steps[1].label, "delete");
    }

    #[test]
    fn test_update_by_key_returns_key() {
        let command = Command::Update {
            model: model(),
            criteria: Some(r#"{"slug": "a"}"#.to_string()),
            values: r#"{"title": "New"}"#.to_string(),
        };
        let preview = preview(&command, &schema()).unwrap();
        assert_eq!(preview.plan, "direct");
        assert_eq!(
            preview.steps[0].statement.text,
            "UPDATE post SET \"title\" = ? WHERE \"slug\" = ?;"
        );
        assert_eq!(preview.record.map(Value::Object), Some(json!({"slug": "a"})));
    }

    #[test]
    fn test_argument_errors() {
        let bad_json = Command::Count {
            model: model(),
            criteria: Some("{".to_string()),
        };
        assert!(matches!(
            preview(&bad_json, &schema()),
            Err(CliError::Json { what: "criteria", .. })
        ));

        let not_object = Command::Insert {
            model: model(),
            record: "[1]".to_string(),
        };
        assert!(matches!(preview(&not_object, &schema()), Err(CliError::Shape(_))));

        let missing_key = Command::Insert {
            model: model(),
            record: r#"{"title": "x"}"#.to_string(),
        };
        assert!(matches!(
            preview(&missing_key, &schema()),
            Err(CliError::Compile(cassorm_core::Error::MissingKey(_)))
        ));
    }

    #[test]
    fn test_drop_migration_preview() {
        let command = Command::Migrate {
            model: model(),
            mode: MigrateMode::Drop,
        };
        let preview = preview(&command, &schema()).unwrap();
        assert_eq!(preview.steps[0].statement.text, "DROP TABLE post;");
        assert_eq!(preview.steps.len(), 3);
    }
}
