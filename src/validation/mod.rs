//! Input validation for scenarios, targets, and run requests.
//!
//! All identifiers that end up inside DDL/DML statements cross through
//! [`is_valid_identifier`] first; adapters rely on that proof and
//! interpolate them without further quoting. Row values never do: they
//! always travel as bound parameters.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::{Column, Entity, RunRequest, Scenario, TargetConfig, TargetKind};
use crate::generators::GeneratorRegistry;

/// A structural or identifier validation failure.
///
/// Cyclic FK graphs get their own variant: a cycle makes a plan infeasible
/// rather than the request malformed, and callers map the two differently.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Invalid(String),

    #[error("cycle detected in entity dependencies")]
    CyclicDependencies,
}

impl ValidationError {
    fn new(msg: impl Into<String>) -> Self {
        ValidationError::Invalid(msg.into())
    }
}

/// SQL keywords rejected as identifiers, sorted for binary search.
const RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "any", "as", "asc", "between", "by", "case", "check", "column",
    "constraint", "create", "cross", "current_date", "current_time", "current_timestamp",
    "database", "default", "delete", "desc", "distinct", "do", "drop", "else", "end", "except",
    "exists", "false", "for", "foreign", "from", "full", "grant", "group", "having", "in", "index",
    "inner", "insert", "intersect", "into", "is", "join", "key", "left", "like", "limit",
    "natural", "not", "null", "offset", "on", "or", "order", "outer", "primary", "references",
    "returning", "revoke", "right", "schema", "select", "set", "table", "then", "to", "true",
    "truncate", "union", "unique", "update", "user", "using", "values", "view", "when", "where",
    "with",
];

/// Check a string against the injection-safe identifier grammar:
/// `[A-Za-z_][A-Za-z0-9_]*`, excluding reserved SQL words
/// (case-insensitive).
pub fn is_valid_identifier(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    RESERVED_WORDS
        .binary_search(&s.to_ascii_lowercase().as_str())
        .is_err()
}

/// Validates scenarios and run requests against structural invariants.
///
/// Holds the generator registry so per-column generator specs can be
/// checked by their own `validate` at schema time.
pub struct Validator {
    registry: Arc<GeneratorRegistry>,
}

impl Validator {
    pub fn new(registry: Arc<GeneratorRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a whole scenario: identifiers, uniqueness, generator specs,
    /// and the FK dependency graph (resolvability and acyclicity).
    pub fn validate_scenario(&self, scenario: &Scenario) -> Result<(), ValidationError> {
        if scenario.name.is_empty() {
            return Err(ValidationError::new("scenario name is required"));
        }
        if scenario.entities.is_empty() {
            return Err(ValidationError::new(
                "scenario must have at least one entity",
            ));
        }

        let mut entity_names = HashSet::new();
        for entity in &scenario.entities {
            self.validate_entity(entity, &mut entity_names)
                .map_err(|e| ValidationError::new(format!("entity '{}': {e}", entity.name)))?;
        }

        self.validate_dependencies(scenario).map_err(|e| match e {
            ValidationError::CyclicDependencies => e,
            other => ValidationError::new(format!("dependency validation failed: {other}")),
        })?;

        Ok(())
    }

    fn validate_entity(
        &self,
        entity: &Entity,
        entity_names: &mut HashSet<String>,
    ) -> Result<(), ValidationError> {
        if entity.name.is_empty() {
            return Err(ValidationError::new("entity name is required"));
        }
        if !is_valid_identifier(&entity.name) {
            return Err(ValidationError::new(format!(
                "invalid entity identifier: {}",
                entity.name
            )));
        }
        if !entity_names.insert(entity.name.clone()) {
            return Err(ValidationError::new(format!(
                "duplicate entity name: {}",
                entity.name
            )));
        }

        if entity.target_table.is_empty() {
            return Err(ValidationError::new("target_table is required"));
        }
        if !is_valid_identifier(&entity.target_table) {
            return Err(ValidationError::new(format!(
                "invalid target_table identifier: {}",
                entity.target_table
            )));
        }

        if entity.rows <= 0 {
            return Err(ValidationError::new(format!(
                "rows must be > 0, got {}",
                entity.rows
            )));
        }

        if entity.columns.is_empty() {
            return Err(ValidationError::new(
                "entity must have at least one column",
            ));
        }

        let mut column_names = HashSet::new();
        for col in &entity.columns {
            self.validate_column(col, &mut column_names)
                .map_err(|e| ValidationError::new(format!("column '{}': {e}", col.name)))?;
        }

        Ok(())
    }

    fn validate_column(
        &self,
        col: &Column,
        column_names: &mut HashSet<String>,
    ) -> Result<(), ValidationError> {
        if col.name.is_empty() {
            return Err(ValidationError::new("column name is required"));
        }
        if !is_valid_identifier(&col.name) {
            return Err(ValidationError::new(format!(
                "invalid column identifier: {}",
                col.name
            )));
        }
        if !column_names.insert(col.name.clone()) {
            return Err(ValidationError::new(format!(
                "duplicate column name: {}",
                col.name
            )));
        }

        if col.generator.gen_type.is_empty() {
            return Err(ValidationError::new("generator type is required"));
        }
        let gen = self
            .registry
            .get(&col.generator.gen_type)
            .map_err(|_| {
                ValidationError::new(format!("generator not found: {}", col.generator.gen_type))
            })?;
        gen.validate(&col.generator, col.column_type)
            .map_err(|e| ValidationError::new(format!("generator validation failed: {e}")))?;

        // Optional FK metadata must be safe identifiers if present.
        if let Some(fk) = &col.fk {
            if fk.entity.is_empty() || fk.column.is_empty() {
                return Err(ValidationError::new("fk must include entity and column"));
            }
            if !is_valid_identifier(&fk.entity) {
                return Err(ValidationError::new(format!(
                    "invalid fk entity identifier: {}",
                    fk.entity
                )));
            }
            if !is_valid_identifier(&fk.column) {
                return Err(ValidationError::new(format!(
                    "invalid fk column identifier: {}",
                    fk.column
                )));
            }
        }

        Ok(())
    }

    fn validate_dependencies(&self, scenario: &Scenario) -> Result<(), ValidationError> {
        let entity_map: HashMap<&str, &Entity> = scenario
            .entities
            .iter()
            .map(|e| (e.name.as_str(), e))
            .collect();

        let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
        for entity in &scenario.entities {
            let mut deps = Vec::new();
            for col in &entity.columns {
                if col.generator.gen_type != "fk" {
                    continue;
                }
                let (ref_entity, ref_column) =
                    fk_reference(col).map_err(|e| {
                        ValidationError::new(format!(
                            "entity '{}', column '{}': {e}",
                            entity.name, col.name
                        ))
                    })?;

                let referenced = entity_map.get(ref_entity).ok_or_else(|| {
                    ValidationError::new(format!(
                        "entity '{}', column '{}': referenced entity '{ref_entity}' not found",
                        entity.name, col.name
                    ))
                })?;
                if !referenced.columns.iter().any(|c| c.name == ref_column) {
                    return Err(ValidationError::new(format!(
                        "entity '{}', column '{}': referenced column '{ref_entity}.{ref_column}' not found",
                        entity.name, col.name
                    )));
                }
                deps.push(ref_entity);
            }
            graph.insert(entity.name.as_str(), deps);
        }

        if has_cycle(&graph) {
            return Err(ValidationError::CyclicDependencies);
        }

        Ok(())
    }

    /// Validate a run request, including any inline scenario or target.
    pub fn validate_run_request(&self, req: &RunRequest) -> Result<(), ValidationError> {
        match (req.scenario_id.as_deref(), req.scenario.as_ref()) {
            (None, None) => {
                return Err(ValidationError::new(
                    "either scenario_id or scenario must be provided",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::new(
                    "only one of scenario_id or scenario must be provided",
                ))
            }
            _ => {}
        }
        match (req.target_id.as_deref(), req.target.as_ref()) {
            (None, None) => {
                return Err(ValidationError::new(
                    "either target_id or target must be provided",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ValidationError::new(
                    "only one of target_id or target must be provided",
                ))
            }
            _ => {}
        }

        if let Some(scale) = req.scale {
            if !(scale > 0.0) || !scale.is_finite() {
                return Err(ValidationError::new(format!(
                    "scale must be > 0, got {scale}"
                )));
            }
        }
        if let Some(db) = req.target_database.as_deref() {
            if !is_valid_identifier(db) {
                return Err(ValidationError::new(format!(
                    "invalid target_database identifier: {db}"
                )));
            }
        }

        for (name, scale) in &req.entity_scales {
            if !is_valid_identifier(name) {
                return Err(ValidationError::new(format!(
                    "invalid entity name in entity_scales: {name}"
                )));
            }
            if !(*scale > 0.0) || !scale.is_finite() {
                return Err(ValidationError::new(format!(
                    "entity_scales[{name}] must be > 0, got {scale}"
                )));
            }
        }
        for (name, count) in &req.entity_counts {
            if !is_valid_identifier(name) {
                return Err(ValidationError::new(format!(
                    "invalid entity name in entity_counts: {name}"
                )));
            }
            if *count <= 0 {
                return Err(ValidationError::new(format!(
                    "entity_counts[{name}] must be > 0, got {count}"
                )));
            }
        }
        for name in &req.include_entities {
            if !is_valid_identifier(name) {
                return Err(ValidationError::new(format!(
                    "invalid entity name in include_entities: {name}"
                )));
            }
        }
        for name in &req.exclude_entities {
            if !is_valid_identifier(name) {
                return Err(ValidationError::new(format!(
                    "invalid entity name in exclude_entities: {name}"
                )));
            }
        }

        if let Some(scenario) = &req.scenario {
            self.validate_scenario(scenario).map_err(|e| match e {
                ValidationError::CyclicDependencies => e,
                other => ValidationError::new(format!("scenario validation failed: {other}")),
            })?;
        }
        if let Some(target) = &req.target {
            validate_target(target)
                .map_err(|e| ValidationError::new(format!("target validation failed: {e}")))?;
            if req.target_database.is_some() {
                validate_database_override(target.kind)?;
            }
        }

        Ok(())
    }
}

/// Validate a target configuration's structural invariants.
pub fn validate_target(t: &TargetConfig) -> Result<(), ValidationError> {
    if t.name.is_empty() {
        return Err(ValidationError::new("target name is required"));
    }
    if t.dsn.is_empty() {
        return Err(ValidationError::new("target dsn is required"));
    }

    if let Some(db) = t.database.as_deref() {
        if !t.kind.supports_database() {
            return Err(ValidationError::new(format!(
                "{} targets must not set database",
                t.kind
            )));
        }
        if !is_valid_identifier(db) {
            return Err(ValidationError::new(format!(
                "invalid target database identifier: {db}"
            )));
        }
    }
    if let Some(schema) = t.schema.as_deref() {
        if !t.kind.supports_schema() {
            return Err(ValidationError::new(format!(
                "{} targets must not set schema",
                t.kind
            )));
        }
        if !is_valid_identifier(schema) {
            return Err(ValidationError::new(format!(
                "invalid target schema identifier: {schema}"
            )));
        }
    }

    Ok(())
}

/// Reject a database override for kinds that address a single database.
pub fn validate_database_override(kind: TargetKind) -> Result<(), ValidationError> {
    if kind.supports_database() {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "target_database override is not supported for {kind} targets"
        )))
    }
}

/// Extract the `(entity, column)` reference of an fk generator spec.
pub fn fk_reference(col: &Column) -> Result<(&str, &str), ValidationError> {
    let entity = col
        .generator
        .params
        .get("entity")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ValidationError::new("fk 'entity' param must be a string"))?;
    let column = col
        .generator
        .params
        .get("column")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ValidationError::new("fk 'column' param must be a string"))?;
    Ok((entity, column))
}

fn has_cycle(graph: &HashMap<&str, Vec<&str>>) -> bool {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    for &node in graph.keys() {
        if !visited.contains(node) && cycle_dfs(node, graph, &mut visited, &mut rec_stack) {
            return true;
        }
    }
    false
}

fn cycle_dfs<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);

    for &neighbor in graph.get(node).into_iter().flatten() {
        if !visited.contains(neighbor) {
            if cycle_dfs(neighbor, graph, visited, rec_stack) {
                return true;
            }
        } else if rec_stack.contains(neighbor) {
            return true;
        }
    }

    rec_stack.remove(node);
    false
}

/// Topologically sort a scenario's entities by their FK dependency graph
/// (Kahn's algorithm). Ties in the ready queue break lexicographically, so
/// the order is fully deterministic.
pub fn topological_sort(scenario: &Scenario) -> Result<Vec<String>, ValidationError> {
    use std::collections::{BTreeMap, BTreeSet};

    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();

    for entity in &scenario.entities {
        in_degree.entry(entity.name.as_str()).or_insert(0);
        for col in &entity.columns {
            if col.generator.gen_type != "fk" {
                continue;
            }
            let (ref_entity, _) = fk_reference(col).map_err(|e| {
                ValidationError::new(format!(
                    "entity '{}', column '{}': {e}",
                    entity.name, col.name
                ))
            })?;
            dependents
                .entry(ref_entity)
                .or_default()
                .push(entity.name.as_str());
            *in_degree.entry(entity.name.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();

    let mut result = Vec::with_capacity(scenario.entities.len());
    while let Some(node) = ready.iter().next().copied() {
        ready.remove(node);
        result.push(node.to_string());

        for &dependent in dependents.get(node).into_iter().flatten() {
            let degree = in_degree.entry(dependent).or_insert(0);
            *degree = degree.saturating_sub(1);
            if *degree == 0 {
                ready.insert(dependent);
            }
        }
    }

    if result.len() != scenario.entities.len() {
        return Err(ValidationError::CyclicDependencies);
    }

    Ok(result)
}

#[cfg(test)]
mod tests;
