//! Core domain types.
//!
//! Scenarios describe *what* to generate; targets describe *where* rows go;
//! runs record a single execution of a scenario against a target. All types
//! round-trip through JSON (optional zero-valued fields are omitted).

mod value;

pub use value::Value;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declarative description of a set of related entities and their
/// per-column value generators. Immutable at runtime; the planner works on
/// copies and never mutates the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Default seed when neither the request nor the operator supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub entities: Vec<Entity>,
}

impl Scenario {
    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// A logical table/index within a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub target_table: String,
    /// Baseline row count, rewritten by the planner on resolved copies.
    pub rows: i64,
    pub columns: Vec<Column>,
}

/// A single column of an entity with its value generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    pub generator: GeneratorSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk: Option<ForeignKey>,
}

/// Column data types understood by all target adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    BigInt,
    Float,
    Double,
    String,
    Text,
    Bool,
    Timestamp,
    Date,
    Uuid,
}

/// Named generator plus opaque parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSpec {
    #[serde(rename = "type")]
    pub gen_type: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl GeneratorSpec {
    pub fn new(gen_type: impl Into<String>) -> Self {
        Self {
            gen_type: gen_type.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

/// Declared foreign-key metadata on a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub entity: String,
    pub column: String,
}

/// Supported target store kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Postgres,
    Sqlite,
    Elasticsearch,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Postgres => "postgres",
            TargetKind::Sqlite => "sqlite",
            TargetKind::Elasticsearch => "elasticsearch",
        }
    }

    /// Whether this kind addresses one database among several on a server.
    pub fn supports_database(&self) -> bool {
        matches!(self, TargetKind::Postgres)
    }

    /// Whether tables live inside a named schema.
    pub fn supports_schema(&self) -> bool {
        matches!(self, TargetKind::Postgres)
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(TargetKind::Postgres),
            "sqlite" => Ok(TargetKind::Sqlite),
            "elasticsearch" => Ok(TargetKind::Elasticsearch),
            other => Err(format!("unknown target kind: {other}")),
        }
    }
}

/// A concrete external data store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub kind: TargetKind,
    pub dsn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

/// Table preparation strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableMode {
    /// Create the table if missing, then insert.
    Create,
    /// Create if missing, empty it, then insert.
    Truncate,
    /// Assume the table exists; fail at first insert otherwise.
    Append,
}

impl TableMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableMode::Create => "create",
            TableMode::Truncate => "truncate",
            TableMode::Append => "append",
        }
    }
}

impl std::fmt::Display for TableMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(TableMode::Create),
            "truncate" => Ok(TableMode::Truncate),
            "append" => Ok(TableMode::Append),
            other => Err(format!("unknown table mode: {other}")),
        }
    }
}

/// Operator request to plan or start a run.
///
/// Exactly one of `scenario_id`/`scenario` and one of `target_id`/`target`
/// must be set. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// Global multiplier applied to every entity's baseline rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    /// Per-entity multiplier applied on top of `scale`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entity_scales: BTreeMap<String, f64>,
    /// Exact per-entity row counts; wins over any scaling.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entity_counts: BTreeMap<String, i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_entities: Vec<String>,
    pub mode: TableMode,
    /// Rewrites the target DSN's database for kinds that support it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_database: Option<String>,
}

/// Pre-execution resolution of counts, ordering, and warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    /// Topologically sorted entity names; FK sources precede dependents.
    pub execution_order: Vec<String>,
    pub resolved_counts: BTreeMap<String, i64>,
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Lifecycle states of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "success" => Ok(RunStatus::Success),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// Live progress counters of a run. Monotonically non-decreasing until the
/// run reaches a terminal status, never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub rows_generated: i64,
    pub rows_total: i64,
    pub entities_done: i64,
    pub entities_total: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_entity: String,
}

/// Persistent record of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub scenario_id: String,
    pub scenario_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scenario_version: String,
    pub target_id: String,
    pub target_name: String,
    pub target_kind: String,
    pub seed: i64,
    pub mode: TableMode,
    pub scale: f64,
    pub resolved_counts: BTreeMap<String, i64>,
    pub execution_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(flatten)]
    pub progress: RunProgress,
}

/// Aggregate statistics of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub entities_generated: i64,
    pub total_rows: i64,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entity_stats: Vec<EntityRunStats>,
}

/// Per-entity statistics within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRunStats {
    pub entity_name: String,
    pub rows_generated: i64,
    pub duration_seconds: f64,
}

/// Append-only log line tied to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub id: i64,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Capability bits discovered by the target probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCapabilities {
    pub can_create: bool,
    pub can_insert: bool,
    pub can_truncate: bool,
}

/// Result of a target connectivity probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCheck {
    pub id: Uuid,
    pub target_id: String,
    pub checked_at: DateTime<Utc>,
    pub ok: bool,
    pub latency_ms: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_version: String,
    pub capabilities: TargetCapabilities,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
