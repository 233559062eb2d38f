//! Canonical hashing of scenarios and run configurations.
//!
//! Hashes are SHA-256 over canonical JSON: object keys sorted, zero-valued
//! optional fields omitted, generator params recursively key-sorted.
//! `serde_json`'s default map is ordered, so rebuilding the scenario as a
//! `Value` yields the canonical form directly.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::{GeneratorSpec, Scenario, TableMode, TargetConfig};

/// Canonical JSON form of a scenario (a fixed point of itself).
///
/// Keys are inserted in sorted order so the serialization is identical
/// whether `serde_json` maps are ordered or insertion-preserving.
pub fn canonicalize_scenario(scenario: &Scenario) -> Value {
    let entities: Vec<Value> = scenario
        .entities
        .iter()
        .map(|entity| {
            let columns: Vec<Value> = entity
                .columns
                .iter()
                .map(|col| {
                    let mut m = Map::new();
                    if let Some(fk) = &col.fk {
                        m.insert(
                            "fk".into(),
                            json!({ "column": fk.column, "entity": fk.entity }),
                        );
                    }
                    m.insert("generator".into(), canonicalize_generator(&col.generator));
                    m.insert("name".into(), json!(col.name));
                    m.insert("nullable".into(), json!(col.nullable));
                    m.insert("type".into(), json!(col.column_type));
                    Value::Object(m)
                })
                .collect();

            let mut m = Map::new();
            m.insert("columns".into(), Value::Array(columns));
            m.insert("name".into(), json!(entity.name));
            m.insert("rows".into(), json!(entity.rows));
            m.insert("target_table".into(), json!(entity.target_table));
            Value::Object(m)
        })
        .collect();

    let mut root = Map::new();
    if !scenario.description.is_empty() {
        root.insert("description".into(), json!(scenario.description));
    }
    root.insert("entities".into(), Value::Array(entities));
    if !scenario.id.is_empty() {
        root.insert("id".into(), json!(scenario.id));
    }
    root.insert("name".into(), json!(scenario.name));
    if !scenario.version.is_empty() {
        root.insert("version".into(), json!(scenario.version));
    }
    Value::Object(root)
}

fn canonicalize_generator(spec: &GeneratorSpec) -> Value {
    let mut m = Map::new();
    if !spec.params.is_empty() {
        m.insert(
            "params".into(),
            canonicalize_params(&Value::Object(spec.params.clone())),
        );
    }
    m.insert("type".into(), json!(spec.gen_type));
    Value::Object(m)
}

fn canonicalize_params(value: &Value) -> Value {
    match value {
        Value::Object(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_params(&m[k.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize_params).collect()),
        other => other.clone(),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 of the canonical scenario JSON.
pub fn hash_scenario(scenario: &Scenario) -> Result<String, serde_json::Error> {
    let canonical = canonicalize_scenario(scenario);
    let data = serde_json::to_vec(&canonical)?;
    Ok(sha256_hex(&data))
}

#[derive(Serialize)]
struct RunConfigPayload<'a> {
    scenario_hash: String,
    target_kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_schema: Option<&'a str>,
    target_dsn: &'a str,
    mode: &'a str,
    scale: f64,
    resolved_counts: &'a BTreeMap<String, i64>,
    seed: i64,
}

/// Deterministic digest identifying equivalent runs.
///
/// Any change to mode, seed, the target, or any resolved count yields a
/// distinct hash.
pub fn hash_run_config(
    scenario: &Scenario,
    target: &TargetConfig,
    mode: TableMode,
    scale: f64,
    resolved_counts: &BTreeMap<String, i64>,
    seed: i64,
) -> Result<String, serde_json::Error> {
    let payload = RunConfigPayload {
        scenario_hash: hash_scenario(scenario)?,
        target_kind: target.kind.as_str(),
        target_schema: target.schema.as_deref(),
        target_dsn: &target.dsn,
        mode: mode.as_str(),
        scale,
        resolved_counts,
        seed,
    };
    let data = serde_json::to_vec(&payload)?;
    Ok(sha256_hex(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnType, Entity, TargetKind};

    fn scenario() -> Scenario {
        Scenario {
            id: "sc-1".into(),
            name: "demo".into(),
            version: String::new(),
            description: String::new(),
            seed: None,
            entities: vec![Entity {
                name: "users".into(),
                target_table: "users".into(),
                rows: 10,
                columns: vec![Column {
                    name: "id".into(),
                    column_type: ColumnType::Int,
                    nullable: false,
                    generator: GeneratorSpec::new("uniform_int")
                        .with_param("min", 1)
                        .with_param("max", 10),
                    fk: None,
                }],
            }],
        }
    }

    fn target() -> TargetConfig {
        TargetConfig {
            id: "tg-1".into(),
            name: "local".into(),
            kind: TargetKind::Sqlite,
            dsn: "/tmp/out.db".into(),
            database: None,
            schema: None,
            options: Default::default(),
        }
    }

    fn counts() -> BTreeMap<String, i64> {
        BTreeMap::from([("users".to_string(), 10)])
    }

    #[test]
    fn scenario_hash_is_stable() {
        assert_eq!(
            hash_scenario(&scenario()).unwrap(),
            hash_scenario(&scenario()).unwrap()
        );
    }

    #[test]
    fn canonicalization_is_a_fixed_point() {
        let once = canonicalize_scenario(&scenario());
        let again = canonicalize_params(&once);
        assert_eq!(once, again);
    }

    #[test]
    fn canonical_form_omits_empty_optional_fields() {
        let canonical = canonicalize_scenario(&scenario());
        let obj = canonical.as_object().unwrap();
        assert!(obj.contains_key("id"));
        assert!(!obj.contains_key("version"));
        assert!(!obj.contains_key("description"));
    }

    #[test]
    fn run_config_hash_is_sensitive_to_each_input() {
        let base = hash_run_config(
            &scenario(),
            &target(),
            TableMode::Create,
            1.0,
            &counts(),
            11,
        )
        .unwrap();

        let other_mode = hash_run_config(
            &scenario(),
            &target(),
            TableMode::Truncate,
            1.0,
            &counts(),
            11,
        )
        .unwrap();
        assert_ne!(base, other_mode);

        let other_seed = hash_run_config(
            &scenario(),
            &target(),
            TableMode::Create,
            1.0,
            &counts(),
            12,
        )
        .unwrap();
        assert_ne!(base, other_seed);

        let other_counts = hash_run_config(
            &scenario(),
            &target(),
            TableMode::Create,
            1.0,
            &BTreeMap::from([("users".to_string(), 20)]),
            11,
        )
        .unwrap();
        assert_ne!(base, other_counts);

        let repeat = hash_run_config(
            &scenario(),
            &target(),
            TableMode::Create,
            1.0,
            &counts(),
            11,
        )
        .unwrap();
        assert_eq!(base, repeat);
    }
}
