//! Run planning: entity filtering, count resolution, and execution order.
//!
//! The planner never mutates its input scenario; it returns a resolved deep
//! copy with per-entity rows rewritten to the resolved counts. Precedence,
//! strongest first: explicit `entity_counts` > `scale * entity_scales` >
//! `scale` > scenario baseline rows. Include/exclude filtering happens
//! before count resolution. Warnings are advisory and never block a run.

use std::collections::{BTreeMap, HashSet};

use crate::domain::{RunPlan, RunRequest, Scenario};
use crate::error::ServiceError;
use crate::validation::{topological_sort, Validator};

/// Compute the plan and the resolved scenario for a request.
pub fn plan(
    scenario: &Scenario,
    req: &RunRequest,
    validator: &Validator,
) -> Result<(RunPlan, Scenario), ServiceError> {
    let mut resolved = scenario.clone();
    let mut warnings = Vec::new();

    let known: HashSet<&str> = scenario.entities.iter().map(|e| e.name.as_str()).collect();

    if !req.include_entities.is_empty() {
        for name in &req.include_entities {
            if !known.contains(name.as_str()) {
                warnings.push(format!(
                    "include_entities references unknown entity \"{name}\""
                ));
            }
        }
        let include: HashSet<&str> = req.include_entities.iter().map(String::as_str).collect();
        resolved.entities.retain(|e| include.contains(e.name.as_str()));
    }

    if !req.exclude_entities.is_empty() {
        for name in &req.exclude_entities {
            if !known.contains(name.as_str()) {
                warnings.push(format!(
                    "exclude_entities references unknown entity \"{name}\""
                ));
            }
        }
        let exclude: HashSet<&str> = req.exclude_entities.iter().map(String::as_str).collect();
        resolved.entities.retain(|e| {
            if exclude.contains(e.name.as_str()) {
                warnings.push(format!("entity \"{}\" was excluded from this run", e.name));
                false
            } else {
                true
            }
        });
    }

    if resolved.entities.is_empty() {
        return Err(ServiceError::PlanInfeasible(
            "no entities remain after include/exclude filtering".into(),
        ));
    }

    let scale = req.scale.unwrap_or(1.0);
    let mut resolved_counts = BTreeMap::new();

    for entity in &mut resolved.entities {
        let mut count = clamp_to_one((entity.rows as f64 * scale).round() as i64, &entity.name, &mut warnings);

        if let Some(entity_scale) = req.entity_scales.get(&entity.name) {
            count = clamp_to_one(
                (count as f64 * entity_scale).round() as i64,
                &entity.name,
                &mut warnings,
            );
        }

        if let Some(explicit) = req.entity_counts.get(&entity.name) {
            count = *explicit;
        }

        entity.rows = count;
        resolved_counts.insert(entity.name.clone(), count);
    }

    for name in req.entity_scales.keys() {
        if !resolved_counts.contains_key(name) {
            warnings.push(format!(
                "entity_scales override for unknown entity \"{name}\" ignored"
            ));
        }
    }
    for name in req.entity_counts.keys() {
        if !resolved_counts.contains_key(name) {
            warnings.push(format!(
                "entity_counts override for unknown entity \"{name}\" ignored"
            ));
        }
    }

    validator.validate_scenario(&resolved)?;

    let execution_order = topological_sort(&resolved)
        .map_err(|e| ServiceError::PlanInfeasible(e.to_string()))?;

    let plan = RunPlan {
        execution_order,
        resolved_counts,
        scale,
        warnings,
    };
    Ok((plan, resolved))
}

fn clamp_to_one(count: i64, entity: &str, warnings: &mut Vec<String>) -> i64 {
    if count < 1 {
        warnings.push(format!(
            "entity \"{entity}\" resolved to less than one row; clamped to 1"
        ));
        1
    } else {
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::{Column, ColumnType, Entity, GeneratorSpec, TableMode};
    use crate::generators::default_registry;

    fn validator() -> Validator {
        Validator::new(Arc::new(default_registry()))
    }

    fn uniform_column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ColumnType::Int,
            nullable: false,
            generator: GeneratorSpec::new("uniform_int")
                .with_param("min", 0)
                .with_param("max", 100),
            fk: None,
        }
    }

    fn fk_column(name: &str, entity: &str, col: &str) -> Column {
        Column {
            name: name.to_string(),
            column_type: ColumnType::Int,
            nullable: false,
            generator: GeneratorSpec::new("fk")
                .with_param("entity", entity)
                .with_param("column", col),
            fk: None,
        }
    }

    fn entity(name: &str, rows: i64, columns: Vec<Column>) -> Entity {
        Entity {
            name: name.to_string(),
            target_table: name.to_string(),
            rows,
            columns,
        }
    }

    fn scenario(entities: Vec<Entity>) -> Scenario {
        Scenario {
            id: String::new(),
            name: "plan-test".into(),
            version: String::new(),
            description: String::new(),
            seed: None,
            entities,
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            scenario_id: Some("s".into()),
            scenario: None,
            target_id: Some("t".into()),
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
    fn leaves_the_source_scenario_unchanged() {
        let source = scenario(vec![
            entity("users", 10, vec![uniform_column("id")]),
            entity("events", 20, vec![fk_column("uid", "users", "id")]),
        ]);
        let before = source.clone();

        let mut req = request();
        req.scale = Some(3.0);
        req.entity_counts.insert("users".into(), 99);
        req.exclude_entities.push("events".into());

        plan(&source, &req, &validator()).unwrap();
        assert_eq!(source, before);
    }

    #[test]
    fn explicit_count_beats_scaling() {
        let source = scenario(vec![entity("events", 10, vec![uniform_column("id")])]);
        let mut req = request();
        req.scale = Some(2.0);
        req.entity_scales.insert("events".into(), 3.0);
        req.entity_counts.insert("events".into(), 55);

        let (plan, resolved) = plan(&source, &req, &validator()).unwrap();
        assert_eq!(plan.resolved_counts["events"], 55);
        assert_eq!(resolved.entity("events").unwrap().rows, 55);
    }

    #[test]
    fn scale_and_entity_scale_multiply() {
        let source = scenario(vec![entity("events", 10, vec![uniform_column("id")])]);
        let mut req = request();
        req.scale = Some(2.0);
        req.entity_scales.insert("events".into(), 3.0);

        let (plan, _) = plan(&source, &req, &validator()).unwrap();
        assert_eq!(plan.resolved_counts["events"], 60);
    }

    #[test]
    fn fractional_result_clamps_to_one_with_warning() {
        let source = scenario(vec![entity("users", 1, vec![uniform_column("id")])]);
        let mut req = request();
        req.entity_scales.insert("users".into(), 0.4);

        let (plan, _) = plan(&source, &req, &validator()).unwrap();
        assert_eq!(plan.resolved_counts["users"], 1);
        assert!(plan
            .warnings
            .iter()
            .any(|w| w.contains("clamped to 1")), "missing clamp warning: {:?}", plan.warnings);
    }

    #[test]
    fn include_then_exclude_interaction() {
        let source = scenario(vec![
            entity("users", 10, vec![uniform_column("id")]),
            entity("events", 20, vec![uniform_column("id")]),
        ]);
        let mut req = request();
        req.include_entities = vec!["users".into(), "events".into()];
        req.exclude_entities = vec!["events".into()];
        req.entity_counts.insert("events".into(), 5);

        let (plan, _) = plan(&source, &req, &validator()).unwrap();
        assert_eq!(plan.execution_order, vec!["users"]);
        assert!(!plan.resolved_counts.contains_key("events"));
        assert!(plan
            .warnings
            .iter()
            .any(|w| w == "entity \"events\" was excluded from this run"));
        assert!(plan
            .warnings
            .iter()
            .any(|w| w.contains("entity_counts override for unknown entity \"events\"")));
    }

    #[test]
    fn unknown_include_name_warns() {
        let source = scenario(vec![entity("users", 10, vec![uniform_column("id")])]);
        let mut req = request();
        req.include_entities = vec!["users".into(), "ghosts".into()];

        let (plan, _) = plan(&source, &req, &validator()).unwrap();
        assert!(plan
            .warnings
            .iter()
            .any(|w| w == "include_entities references unknown entity \"ghosts\""));
    }

    #[test]
    fn disjoint_include_set_is_infeasible() {
        let source = scenario(vec![entity("users", 10, vec![uniform_column("id")])]);
        let mut req = request();
        req.include_entities = vec!["ghosts".into()];

        assert!(matches!(
            plan(&source, &req, &validator()),
            Err(ServiceError::PlanInfeasible(_))
        ));
    }

    #[test]
    fn excluding_everything_is_infeasible() {
        let source = scenario(vec![
            entity("users", 10, vec![uniform_column("id")]),
            entity("events", 20, vec![uniform_column("id")]),
        ]);
        let mut req = request();
        req.exclude_entities = vec!["users".into(), "events".into()];

        assert!(matches!(
            plan(&source, &req, &validator()),
            Err(ServiceError::PlanInfeasible(_))
        ));
    }

    #[test]
    fn fk_cycle_is_infeasible() {
        let source = scenario(vec![
            entity("a", 5, vec![fk_column("b_ref", "b", "a_ref")]),
            entity("b", 5, vec![fk_column("a_ref", "a", "b_ref")]),
        ]);
        let err = plan(&source, &request(), &validator()).unwrap_err();
        match err {
            ServiceError::InvalidRequest(msg) => assert!(msg.contains("cyclic")),
            ServiceError::PlanInfeasible(msg) => assert!(msg.contains("cycle")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn execution_order_respects_dependencies() {
        let source = scenario(vec![
            entity("events", 20, vec![fk_column("uid", "users", "id")]),
            entity("users", 10, vec![uniform_column("id")]),
        ]);
        let (plan, _) = plan(&source, &request(), &validator()).unwrap();
        assert_eq!(plan.execution_order, vec!["users", "events"]);
    }
}
