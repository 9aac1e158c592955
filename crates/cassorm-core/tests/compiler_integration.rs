//! Integration tests for the schema and statement compilers.

use cassorm_core::catalog::{from_native_type, GenericType, ModelDef, SchemaDescriptor};
use cassorm_core::query::{decode_row, CriteriaCompiler, MutationPlan, StatementBuilder};
use cassorm_core::Error;
use cassorm_proto::{Criteria, NativeValue, Record, Row, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

struct TestContext {
    schema: SchemaDescriptor,
}

impl TestContext {
    fn new(model: Value) -> Self {
        let model = ModelDef::from_json(&model).unwrap();
        Self {
            schema: SchemaDescriptor::compile(&model).unwrap(),
        }
    }

    fn users() -> Self {
        Self::new(json!({
            "identity": "User",
            "attributes": {
                "id": {"type": "string", "primaryKey": true, "autoIncrement": true},
                "firstName": "string",
                "lastName": {"type": "string", "index": true},
                "email": {"type": "email", "unique": true},
                "age": "integer",
                "avatar": "binary",
                "profile": "json",
                "tags": "array",
                "createdAt": {"type": "datetime", "defaultsTo": "2000-01-01"},
                "fullName": null
            }
        }))
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(&self.schema)
    }

    fn clause(&self, criteria: Value) -> Result<(String, Vec<Value>), Error> {
        let criteria = Criteria::parse(&criteria, self.schema.partition_attribute())?;
        let filter = criteria.filter.unwrap_or(cassorm_proto::CriteriaNode::And(Vec::new()));
        let clause = CriteriaCompiler::new(&self.schema).compile(&filter)?;
        Ok((clause.text, clause.params))
    }
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

#[test]
fn test_user_ddl() {
    let ctx = TestContext::users();

    assert_eq!(
        ctx.schema.create_table_text(),
        "CREATE TABLE user (\"id\" timeuuid, \"firstname\" text, \"lastname\" text, \
         \"email\" ascii, \"age\" bigint, \"avatar\" blob, \"profile\" text, \
         \"tags\" list<text>, \"createdat\" timestamp, PRIMARY KEY (\"id\"));"
    );

    let indexes: Vec<_> = ctx.schema.index_statements().values().cloned().collect();
    assert_eq!(
        indexes,
        vec![
            "CREATE INDEX idx__user__email ON user (\"email\");".to_string(),
            "CREATE INDEX idx__user__lastname ON user (\"lastname\");".to_string(),
        ]
    );
    assert!(ctx.schema.defaults().is_empty());
}

#[test]
fn test_compound_key_ddl_lists_partition_first() {
    let ctx = TestContext::new(json!({
        "identity": "Reading",
        "tableName": "readings",
        "attributes": {
            "takenAt": "datetime",
            "sensor": {"type": "string", "primaryKey": true, "clusterBy": ["takenAt", "seq"]},
            "seq": "integer",
            "value": "float"
        }
    }));

    assert!(ctx
        .schema
        .create_table_text()
        .ends_with("PRIMARY KEY (\"sensor\", \"takenat\", \"seq\"));"));
}

#[test]
fn test_primary_key_cardinality() {
    let none = ModelDef::from_json(&json!({
        "identity": "t",
        "attributes": {"a": "string"}
    }))
    .unwrap();
    assert!(matches!(SchemaDescriptor::compile(&none), Err(Error::Schema(_))));

    let two = ModelDef::from_json(&json!({
        "identity": "t",
        "attributes": {
            "a": {"type": "string", "primaryKey": true},
            "b": {"type": "string", "primaryKey": true}
        }
    }))
    .unwrap();
    assert!(matches!(SchemaDescriptor::compile(&two), Err(Error::Schema(_))));
}

#[test]
fn test_generic_types_survive_native_round_trip() {
    for generic in GenericType::ALL {
        let native = generic.native_type();
        assert_eq!(from_native_type(&native).native_type(), native);
    }
}

#[test]
fn test_criteria_clauses() {
    let ctx = TestContext::users();

    assert_eq!(
        ctx.clause(json!({"firstName": "Joe"})).unwrap(),
        ("\"firstname\" = ?".to_string(), vec![json!("Joe")])
    );
    assert_eq!(
        ctx.clause(json!({"firstName": ["Joe", "Peter", "Greg"]})).unwrap(),
        (
            "\"firstname\" IN (?)".to_string(),
            vec![json!(["Joe", "Peter", "Greg"])]
        )
    );
    assert_eq!(
        ctx.clause(json!({"age": {"greaterThanOrEqual": 25, "<": 50}})).unwrap(),
        ("\"age\" >= ? AND \"age\" < ?".to_string(), vec![json!(25), json!(50)])
    );
    assert!(matches!(
        ctx.clause(json!({"age": {"<": 10, "lessThanOrEqual": 20}})),
        Err(Error::ConflictingOperator { .. })
    ));
    assert!(matches!(
        ctx.clause(json!({"nickname": "x"})),
        Err(Error::UnknownField(_))
    ));
}

#[test]
fn test_criteria_compilation_is_idempotent() {
    let ctx = TestContext::users();
    let criteria = json!({
        "and": [{"age": {">": 20, "lessThanOrEqual": 60}}],
        "lastName": ["Doe", "Roe"]
    });
    assert_eq!(ctx.clause(criteria.clone()).unwrap(), ctx.clause(criteria).unwrap());
}

#[test]
fn test_or_is_rejected_before_compilation() {
    let ctx = TestContext::users();
    assert!(matches!(
        ctx.clause(json!({"or": [{"age": 1}, {"age": 2}]})),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_find_statements() {
    let ctx = TestContext::users();
    let builder = ctx.builder();

    let by_id = builder
        .select(&Criteria::parse(&json!("4b8c"), "id").unwrap())
        .unwrap();
    assert!(by_id.text.ends_with("FROM user WHERE \"id\" = ?;"));
    assert!(!by_id.allow_filtering);

    let filtered = builder
        .select(
            &Criteria::parse(
                &json!({"where": {"lastName": "Doe"}, "sort": "age desc", "limit": 10}),
                "id",
            )
            .unwrap(),
        )
        .unwrap();
    assert!(filtered
        .text
        .ends_with("WHERE \"lastname\" = ? ORDER BY \"age\" DESC LIMIT 10 ALLOW FILTERING;"));
    assert!(filtered.allow_filtering);
    assert!(!filtered.text.contains('*'));
}

#[test]
fn test_insert_then_reinsert_generated_key() {
    let ctx = TestContext::users();
    let builder = ctx.builder();

    let created = builder
        .insert(&record(json!({"firstName": "Joe", "tags": ["a", 1]})))
        .unwrap();
    let id = created.record["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created.statement.params.len(), created.statement.placeholder_count());
    assert_eq!(created.record["tags"], json!(["a", 1]));

    let again = record(json!({"id": id, "firstName": "Joe"}));
    assert!(matches!(builder.insert(&again), Err(Error::ImmutableKey(_))));
}

#[test]
fn test_destroy_plans() {
    let ctx = TestContext::users();
    let builder = ctx.builder();

    match builder.delete(&Criteria::by_key("id", "k")).unwrap() {
        MutationPlan::Direct { statement, .. } => {
            assert_eq!(statement.text, "DELETE FROM user WHERE \"id\" = ?;");
        }
        other => panic!("expected a direct delete, got {:?}", other),
    }

    let plan = builder
        .delete(&Criteria::parse(&json!({"age": {"<": 18}}), "id").unwrap())
        .unwrap();
    let MutationPlan::SelectThenMutate { select, template } = plan else {
        panic!("expected a two-phase delete");
    };
    assert_eq!(
        select.text,
        "SELECT \"id\" FROM user WHERE \"age\" < ? ALLOW FILTERING;"
    );

    let row = Row::new().with("id", NativeValue::Text("r1".into()));
    let bound = template.bind(&row).unwrap();
    assert_eq!(bound.text, "DELETE FROM user WHERE \"id\" = ?;");
    assert_eq!(bound.params, vec![json!("r1")]);
}

#[test]
fn test_rows_decode_to_attributes() {
    let ctx = TestContext::users();
    let row = Row::new()
        .with("firstname", NativeValue::Text("Joe".into()))
        .with("age", NativeValue::BigInt(41))
        .with("avatar", NativeValue::Blob(vec![1, 2]))
        .with("profile", NativeValue::Text("{\"likes\":[\"tea\"]}".into()))
        .with("unmapped", NativeValue::Int(3));

    let decoded = decode_row(&ctx.schema, &row);
    assert_eq!(
        Value::Object(decoded),
        json!({
            "firstName": "Joe",
            "age": 41,
            "avatar": "0x0102",
            "profile": {"likes": ["tea"]},
            "unmapped": 3
        })
    );
}
