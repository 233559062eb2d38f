//! In-memory store implementations for tests and embedded use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Run, RunLog, RunProgress, RunStats, RunStatus, Scenario, TargetCheck, TargetConfig,
};
use crate::interfaces::{RunStore, ScenarioStore, StoreError, TargetStore};

/// In-memory scenario catalog, seeded at construction.
#[derive(Default)]
pub struct MemoryScenarioStore {
    scenarios: RwLock<HashMap<String, Scenario>>,
}

impl MemoryScenarioStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, scenario: Scenario) {
        self.scenarios
            .write()
            .await
            .insert(scenario.id.clone(), scenario);
    }
}

#[async_trait]
impl ScenarioStore for MemoryScenarioStore {
    async fn get(&self, id: &str) -> Result<Scenario, StoreError> {
        self.scenarios
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("scenario {id}")))
    }

    async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        let mut scenarios: Vec<Scenario> =
            self.scenarios.read().await.values().cloned().collect();
        scenarios.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(scenarios)
    }
}

/// In-memory control-plane store.
#[derive(Default)]
pub struct MemoryControlStore {
    runs: RwLock<HashMap<Uuid, Run>>,
    logs: RwLock<Vec<RunLog>>,
    targets: RwLock<HashMap<String, TargetConfig>>,
    checks: RwLock<Vec<TargetCheck>>,
    next_log_id: AtomicI64,
}

impl MemoryControlStore {
    pub fn new() -> Self {
        Self {
            next_log_id: AtomicI64::new(1),
            ..Default::default()
        }
    }
}

#[async_trait]
impl RunStore for MemoryControlStore {
    async fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        self.runs.write().await.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Run, StoreError> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))
    }

    async fn list_runs(
        &self,
        limit: i64,
        status: Option<RunStatus>,
    ) -> Result<Vec<Run>, StoreError> {
        let limit = if limit <= 0 { 50 } else { limit } as usize;
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RunStatus,
        error: Option<&str>,
        stats: Option<&RunStats>,
    ) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run.status = status;
        run.error = error.unwrap_or_default().to_string();
        if let Some(stats) = stats {
            run.stats = Some(stats.clone());
        }
        if status.is_terminal() && run.completed_at.is_none() {
            run.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: &RunProgress) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run.progress = progress.clone();
        Ok(())
    }

    async fn append_run_log(
        &self,
        run_id: Uuid,
        level: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        self.logs.write().await.push(RunLog {
            id,
            run_id,
            created_at: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn list_run_logs(&self, run_id: Uuid, limit: i64) -> Result<Vec<RunLog>, StoreError> {
        let limit = if limit <= 0 { 200 } else { limit } as usize;
        let mut logs: Vec<RunLog> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|l| l.run_id == run_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.id.cmp(&a.id));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[async_trait]
impl TargetStore for MemoryControlStore {
    async fn create_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let mut targets = self.targets.write().await;
        if targets.values().any(|t| t.name == target.name) {
            return Err(StoreError::Conflict(format!(
                "target name already exists: {}",
                target.name
            )));
        }
        targets.insert(target.id.clone(), target.clone());
        Ok(())
    }

    async fn update_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let mut targets = self.targets.write().await;
        if targets
            .values()
            .any(|t| t.name == target.name && t.id != target.id)
        {
            return Err(StoreError::Conflict(format!(
                "target name already exists: {}",
                target.name
            )));
        }
        match targets.get_mut(&target.id) {
            Some(existing) => {
                *existing = target.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("target {}", target.id))),
        }
    }

    async fn delete_target(&self, id: &str) -> Result<(), StoreError> {
        self.targets
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("target {id}")))
    }

    async fn get_target(&self, id: &str) -> Result<TargetConfig, StoreError> {
        self.targets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("target {id}")))
    }

    async fn get_target_by_name(&self, name: &str) -> Result<TargetConfig, StoreError> {
        self.targets
            .read()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("target named {name}")))
    }

    async fn list_targets(&self) -> Result<Vec<TargetConfig>, StoreError> {
        let mut targets: Vec<TargetConfig> =
            self.targets.read().await.values().cloned().collect();
        targets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(targets)
    }

    async fn record_check(&self, check: &TargetCheck) -> Result<(), StoreError> {
        self.checks.write().await.push(check.clone());
        Ok(())
    }

    async fn list_checks(
        &self,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<TargetCheck>, StoreError> {
        let limit = if limit <= 0 { 50 } else { limit } as usize;
        let mut checks: Vec<TargetCheck> = self
            .checks
            .read()
            .await
            .iter()
            .filter(|c| c.target_id == target_id)
            .cloned()
            .collect();
        checks.sort_by(|a, b| b.checked_at.cmp(&a.checked_at));
        checks.truncate(limit);
        Ok(checks)
    }
}
