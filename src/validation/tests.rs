use std::sync::Arc;

use super::*;
use crate::domain::{ColumnType, GeneratorSpec, TableMode};
use crate::generators::default_registry;

fn validator() -> Validator {
    Validator::new(Arc::new(default_registry()))
}

fn column(name: &str, gen: GeneratorSpec) -> Column {
    Column {
        name: name.to_string(),
        column_type: ColumnType::Int,
        nullable: false,
        generator: gen,
        fk: None,
    }
}

fn uniform_int(min: i64, max: i64) -> GeneratorSpec {
    GeneratorSpec::new("uniform_int")
        .with_param("min", min)
        .with_param("max", max)
}

fn fk(entity: &str, col: &str) -> GeneratorSpec {
    GeneratorSpec::new("fk")
        .with_param("entity", entity)
        .with_param("column", col)
}

fn entity(name: &str, columns: Vec<Column>) -> Entity {
    Entity {
        name: name.to_string(),
        target_table: name.to_string(),
        rows: 10,
        columns,
    }
}

fn scenario(entities: Vec<Entity>) -> Scenario {
    Scenario {
        id: String::new(),
        name: "test".to_string(),
        version: String::new(),
        description: String::new(),
        seed: None,
        entities,
    }
}

#[test]
fn identifier_accepts_snake_case() {
    assert!(is_valid_identifier("snake_case_123"));
    assert!(is_valid_identifier("_leading_underscore"));
    assert!(is_valid_identifier("UpperCase"));
}

#[test]
fn identifier_rejects_bad_shapes() {
    assert!(!is_valid_identifier(""));
    assert!(!is_valid_identifier("1a"));
    assert!(!is_valid_identifier("a-b"));
    assert!(!is_valid_identifier("a b"));
    assert!(!is_valid_identifier("a;drop"));
    assert!(!is_valid_identifier("naïve"));
}

#[test]
fn identifier_rejects_reserved_words_case_insensitive() {
    for word in ["select", "SELECT", "Order", "table", "group", "user", "returning"] {
        assert!(!is_valid_identifier(word), "{word} should be rejected");
    }
}

#[test]
fn reserved_words_table_is_sorted() {
    let mut sorted = RESERVED_WORDS.to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, RESERVED_WORDS);
}

#[test]
fn scenario_requires_entities() {
    let err = validator().validate_scenario(&scenario(vec![])).unwrap_err();
    assert!(err.to_string().contains("at least one entity"));
}

#[test]
fn scenario_rejects_duplicate_entity_names() {
    let s = scenario(vec![
        entity("users", vec![column("id", uniform_int(0, 10))]),
        entity("users", vec![column("id", uniform_int(0, 10))]),
    ]);
    let err = validator().validate_scenario(&s).unwrap_err();
    assert!(err.to_string().contains("duplicate entity name"));
}

#[test]
fn scenario_rejects_nonpositive_rows() {
    let mut s = scenario(vec![entity("users", vec![column("id", uniform_int(0, 10))])]);
    s.entities[0].rows = 0;
    assert!(validator().validate_scenario(&s).is_err());
}

#[test]
fn scenario_rejects_unknown_generator() {
    let s = scenario(vec![entity(
        "users",
        vec![column("id", GeneratorSpec::new("nope"))],
    )]);
    let err = validator().validate_scenario(&s).unwrap_err();
    assert!(err.to_string().contains("generator not found"));
}

#[test]
fn scenario_rejects_unresolvable_fk() {
    let s = scenario(vec![entity("events", vec![column("uid", fk("users", "id"))])]);
    let err = validator().validate_scenario(&s).unwrap_err();
    assert!(err.to_string().contains("referenced entity 'users' not found"));
}

#[test]
fn scenario_rejects_fk_cycle() {
    let s = scenario(vec![
        entity("a", vec![column("b_ref", fk("b", "a_ref"))]),
        entity("b", vec![column("a_ref", fk("a", "b_ref"))]),
    ]);
    let err = validator().validate_scenario(&s).unwrap_err();
    assert!(matches!(err, ValidationError::CyclicDependencies));
}

#[test]
fn target_schema_only_for_relational_kinds() {
    let mut t = TargetConfig {
        id: String::new(),
        name: "es".into(),
        kind: TargetKind::Elasticsearch,
        dsn: "http://localhost:9200".into(),
        database: None,
        schema: Some("public".into()),
        options: Default::default(),
    };
    assert!(validate_target(&t).is_err());
    t.schema = None;
    assert!(validate_target(&t).is_ok());
    t.database = Some("metrics".into());
    assert!(validate_target(&t).is_err());
}

#[test]
fn target_database_only_for_multi_database_kinds() {
    let t = TargetConfig {
        id: String::new(),
        name: "local".into(),
        kind: TargetKind::Sqlite,
        dsn: "/tmp/db.sqlite".into(),
        database: Some("other".into()),
        schema: None,
        options: Default::default(),
    };
    assert!(validate_target(&t).is_err());
}

fn base_request() -> RunRequest {
    RunRequest {
        scenario_id: Some("s1".into()),
        scenario: None,
        target_id: Some("t1".into()),
        target: None,
        seed: None,
        scale: None,
        entity_scales: Default::default(),
        entity_counts: Default::default(),
        include_entities: vec![],
        exclude_entities: vec![],
        mode: TableMode::Create,
        target_database: None,
    }
}

#[test]
fn request_requires_exactly_one_scenario_reference() {
    let mut req = base_request();
    req.scenario_id = None;
    assert!(validator().validate_run_request(&req).is_err());

    let mut req = base_request();
    req.scenario = Some(scenario(vec![entity(
        "users",
        vec![column("id", uniform_int(0, 10))],
    )]));
    assert!(validator().validate_run_request(&req).is_err());
}

#[test]
fn request_rejects_zero_scale() {
    let mut req = base_request();
    req.scale = Some(0.0);
    assert!(validator().validate_run_request(&req).is_err());
}

#[test]
fn request_rejects_bad_override_keys_and_values() {
    let mut req = base_request();
    req.entity_counts.insert("1bad".into(), 5);
    assert!(validator().validate_run_request(&req).is_err());

    let mut req = base_request();
    req.entity_counts.insert("users".into(), 0);
    assert!(validator().validate_run_request(&req).is_err());

    let mut req = base_request();
    req.entity_scales.insert("users".into(), -1.0);
    assert!(validator().validate_run_request(&req).is_err());

    let mut req = base_request();
    req.include_entities.push("a-b".into());
    assert!(validator().validate_run_request(&req).is_err());
}

#[test]
fn request_rejects_database_override_for_inline_sqlite_target() {
    let mut req = base_request();
    req.target_id = None;
    req.target = Some(TargetConfig {
        id: String::new(),
        name: "local".into(),
        kind: TargetKind::Sqlite,
        dsn: "/tmp/db.sqlite".into(),
        database: None,
        schema: None,
        options: Default::default(),
    });
    req.target_database = Some("other".into());
    assert!(validator().validate_run_request(&req).is_err());
}

#[test]
fn topo_sort_orders_fk_sources_first() {
    let s = scenario(vec![
        entity("events", vec![column("uid", fk("users", "id"))]),
        entity("users", vec![column("id", uniform_int(0, 100))]),
        entity("devices", vec![column("uid", fk("users", "id"))]),
    ]);
    let order = topological_sort(&s).unwrap();
    assert_eq!(order, vec!["users", "devices", "events"]);
}

#[test]
fn topo_sort_breaks_ties_lexicographically() {
    let s = scenario(vec![
        entity("zebra", vec![column("id", uniform_int(0, 10))]),
        entity("alpha", vec![column("id", uniform_int(0, 10))]),
        entity("mid", vec![column("id", uniform_int(0, 10))]),
    ]);
    assert_eq!(topological_sort(&s).unwrap(), vec!["alpha", "mid", "zebra"]);
}

#[test]
fn topo_sort_detects_cycles() {
    let s = scenario(vec![
        entity("a", vec![column("b_ref", fk("b", "a_ref"))]),
        entity("b", vec![column("a_ref", fk("a", "b_ref"))]),
    ]);
    let err = topological_sort(&s).unwrap_err();
    assert!(err.to_string().contains("cycle detected"));
}
