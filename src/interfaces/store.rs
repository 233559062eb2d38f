//! Control-plane store interfaces.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Run, RunLog, RunProgress, RunStats, RunStatus, TargetCheck, TargetConfig,
};

/// Errors from control-plane persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Persistence of runs, their progress, and their logs.
///
/// A store handle is shared by many concurrent runs; progress updates must
/// be cheap single-row writes with no read-modify-write.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a run with all denormalized fields and initial progress
    /// totals.
    async fn create_run(&self, run: &Run) -> Result<(), StoreError>;

    async fn get_run(&self, id: Uuid) -> Result<Run, StoreError>;

    /// Most-recent-first, optionally filtered by status. Non-positive
    /// limits fall back to 50.
    async fn list_runs(&self, limit: i64, status: Option<RunStatus>) -> Result<Vec<Run>, StoreError>;

    /// Transition a run to a new status. Terminal transitions stamp
    /// `completed_at`; a `None` stats argument preserves any prior stats.
    async fn update_status(
        &self,
        id: Uuid,
        status: RunStatus,
        error: Option<&str>,
        stats: Option<&RunStats>,
    ) -> Result<(), StoreError>;

    /// Blind single-row progress update, called many times per run.
    async fn update_progress(&self, id: Uuid, progress: &RunProgress) -> Result<(), StoreError>;

    /// Append a log line with a server timestamp and monotonic id.
    async fn append_run_log(&self, run_id: Uuid, level: &str, message: &str)
        -> Result<(), StoreError>;

    /// Most-recent-first (descending id), up to `limit` lines.
    async fn list_run_logs(&self, run_id: Uuid, limit: i64) -> Result<Vec<RunLog>, StoreError>;
}

/// CRUD for target configurations and their probe audit trail.
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Insert a target. Names are unique.
    async fn create_target(&self, target: &TargetConfig) -> Result<(), StoreError>;

    async fn update_target(&self, target: &TargetConfig) -> Result<(), StoreError>;

    async fn delete_target(&self, id: &str) -> Result<(), StoreError>;

    async fn get_target(&self, id: &str) -> Result<TargetConfig, StoreError>;

    async fn get_target_by_name(&self, name: &str) -> Result<TargetConfig, StoreError>;

    async fn list_targets(&self) -> Result<Vec<TargetConfig>, StoreError>;

    async fn record_check(&self, check: &TargetCheck) -> Result<(), StoreError>;

    /// Most recent checks first.
    async fn list_checks(&self, target_id: &str, limit: i64) -> Result<Vec<TargetCheck>, StoreError>;
}
