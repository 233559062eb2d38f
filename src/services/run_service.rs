//! Run lifecycle orchestration.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{
    Run, RunLog, RunPlan, RunProgress, RunRequest, RunStatus, Scenario, TargetCheck, TargetConfig,
};
use crate::error::ServiceError;
use crate::exec::{Executor, ProgressEvent, ProgressSink};
use crate::generators::GeneratorRegistry;
use crate::hashing;
use crate::interfaces::{RunStore, ScenarioStore, StoreError, TargetStore};
use crate::planner;
use crate::targets;
use crate::validation::{self, Validator};

use super::target_check;
use super::target_dsn::resolve_target_for_run;

/// Maximum and default limits for log listing.
const MAX_LOG_LIMIT: i64 = 2000;
const DEFAULT_LOG_LIMIT: i64 = 200;

/// Accepts run requests, plans them, persists run records, and dispatches
/// execution on detached tasks. Concurrent runs are isolated: each owns its
/// target adapter and entity-values map, sharing only the store handle and
/// the read-only generator registry.
pub struct RunService {
    scenarios: Arc<dyn ScenarioStore>,
    runs: Arc<dyn RunStore>,
    targets: Arc<dyn TargetStore>,
    registry: Arc<GeneratorRegistry>,
    validator: Validator,
    batch_size: usize,
}

impl RunService {
    pub fn new(
        scenarios: Arc<dyn ScenarioStore>,
        runs: Arc<dyn RunStore>,
        targets: Arc<dyn TargetStore>,
        registry: Arc<GeneratorRegistry>,
        batch_size: usize,
    ) -> Self {
        Self {
            scenarios,
            runs,
            targets,
            validator: Validator::new(registry.clone()),
            registry,
            batch_size,
        }
    }

    /// Validate, plan, persist a Running record, and dispatch execution.
    ///
    /// Returns as soon as the run row is persisted; failures after that
    /// point surface through the run's status, not this call.
    pub async fn start_run(&self, req: &RunRequest) -> Result<Run, ServiceError> {
        let (scenario, target, plan, resolved) = self.prepare(req).await?;

        let effective_target = resolve_target_for_run(&target, req.target_database.as_deref());
        let seed = resolve_seed(req, &scenario);
        let config_hash = hashing::hash_run_config(
            &scenario,
            &effective_target,
            req.mode,
            plan.scale,
            &plan.resolved_counts,
            seed,
        )
        .map_err(StoreError::Serialization)?;

        let rows_total: i64 = plan.resolved_counts.values().sum();
        let run = Run {
            id: Uuid::new_v4(),
            scenario_id: scenario.id.clone(),
            scenario_name: scenario.name.clone(),
            scenario_version: scenario.version.clone(),
            target_id: effective_target.id.clone(),
            target_name: effective_target.name.clone(),
            target_kind: effective_target.kind.as_str().to_string(),
            seed,
            mode: req.mode,
            scale: plan.scale,
            resolved_counts: plan.resolved_counts.clone(),
            execution_order: plan.execution_order.clone(),
            warnings: plan.warnings.clone(),
            config_hash,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            stats: None,
            error: String::new(),
            progress: RunProgress {
                rows_generated: 0,
                rows_total,
                entities_done: 0,
                entities_total: plan.execution_order.len() as i64,
                current_entity: String::new(),
            },
        };

        self.runs.create_run(&run).await?;

        info!(
            run_id = %run.id,
            scenario = %scenario.name,
            target = %effective_target.name,
            seed,
            "starting run"
        );

        let runs = self.runs.clone();
        let registry = self.registry.clone();
        let batch_size = self.batch_size;
        let spawned_run = run.clone();
        tokio::spawn(async move {
            execute_run(
                runs,
                registry,
                spawned_run,
                resolved,
                effective_target,
                seed,
                batch_size,
            )
            .await;
        });

        Ok(run)
    }

    /// Plan a request without creating a run or executing anything.
    pub async fn plan_run(&self, req: &RunRequest) -> Result<RunPlan, ServiceError> {
        let (_, _, plan, _) = self.prepare(req).await?;
        Ok(plan)
    }

    /// Shared synchronous path of `start_run` and `plan_run`: validation,
    /// loading, and planning.
    async fn prepare(
        &self,
        req: &RunRequest,
    ) -> Result<(Scenario, TargetConfig, RunPlan, Scenario), ServiceError> {
        self.validator.validate_run_request(req)?;

        let scenario = self.load_scenario(req).await?;
        let target = self.load_target(req).await?;
        validation::validate_target(&target)?;
        if req.target_database.is_some() {
            validation::validate_database_override(target.kind)?;
        }

        let (plan, resolved) = planner::plan(&scenario, req, &self.validator)?;
        Ok((scenario, target, plan, resolved))
    }

    async fn load_scenario(&self, req: &RunRequest) -> Result<Scenario, ServiceError> {
        match (&req.scenario_id, &req.scenario) {
            (Some(id), _) => self.scenarios.get(id).await.map_err(lookup_error),
            (None, Some(inline)) => Ok(inline.clone()),
            (None, None) => Err(ServiceError::InvalidRequest(
                "either scenario_id or scenario must be provided".into(),
            )),
        }
    }

    async fn load_target(&self, req: &RunRequest) -> Result<TargetConfig, ServiceError> {
        match (&req.target_id, &req.target) {
            (Some(id), _) => self.targets.get_target(id).await.map_err(lookup_error),
            (None, Some(inline)) => Ok(inline.clone()),
            (None, None) => Err(ServiceError::InvalidRequest(
                "either target_id or target must be provided".into(),
            )),
        }
    }

    /// Probe a stored target and record the outcome.
    pub async fn test_target(&self, target_id: &str) -> Result<TargetCheck, ServiceError> {
        let config = self
            .targets
            .get_target(target_id)
            .await
            .map_err(lookup_error)?;
        let check = target_check::check_target(&config).await;
        if let Err(e) = self.targets.record_check(&check).await {
            error!(target_id, error = %e, "failed to record target check");
        }
        Ok(check)
    }

    pub async fn get_run(&self, id: Uuid) -> Result<Run, ServiceError> {
        self.runs.get_run(id).await.map_err(lookup_error)
    }

    pub async fn list_runs(
        &self,
        limit: i64,
        status: Option<RunStatus>,
    ) -> Result<Vec<Run>, ServiceError> {
        Ok(self.runs.list_runs(limit, status).await?)
    }

    pub async fn list_run_logs(&self, id: Uuid, limit: i64) -> Result<Vec<RunLog>, ServiceError> {
        let limit = if limit <= 0 {
            DEFAULT_LOG_LIMIT
        } else {
            limit.min(MAX_LOG_LIMIT)
        };
        Ok(self.runs.list_run_logs(id, limit).await?)
    }

    /// Create a target, assigning it an id.
    pub async fn create_target(&self, mut target: TargetConfig) -> Result<TargetConfig, ServiceError> {
        validation::validate_target(&target)?;
        if target.id.is_empty() {
            target.id = Uuid::new_v4().to_string();
        }
        self.targets.create_target(&target).await?;
        Ok(target)
    }

    pub async fn update_target(&self, target: &TargetConfig) -> Result<(), ServiceError> {
        validation::validate_target(target)?;
        self.targets
            .update_target(target)
            .await
            .map_err(lookup_error)
    }

    pub async fn delete_target(&self, id: &str) -> Result<(), ServiceError> {
        self.targets.delete_target(id).await.map_err(lookup_error)
    }

    pub async fn get_target(&self, id: &str) -> Result<TargetConfig, ServiceError> {
        self.targets.get_target(id).await.map_err(lookup_error)
    }

    pub async fn list_targets(&self) -> Result<Vec<TargetConfig>, ServiceError> {
        Ok(self.targets.list_targets().await?)
    }

    pub async fn list_checks(
        &self,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<TargetCheck>, ServiceError> {
        Ok(self.targets.list_checks(target_id, limit).await?)
    }
}

fn lookup_error(err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound(what) => ServiceError::NotFound(what),
        other => ServiceError::Store(other),
    }
}

/// Request seed, else scenario seed, else a clock-derived seed. The chosen
/// seed is persisted on the run so outputs stay reproducible.
fn resolve_seed(req: &RunRequest, scenario: &Scenario) -> i64 {
    if let Some(seed) = req.seed {
        return seed;
    }
    if let Some(seed) = scenario.seed {
        return seed;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

/// Detached execution path. All failures end up on the run record; nothing
/// propagates to a caller.
async fn execute_run(
    runs: Arc<dyn RunStore>,
    registry: Arc<GeneratorRegistry>,
    run: Run,
    resolved: Scenario,
    target_config: TargetConfig,
    seed: i64,
    batch_size: usize,
) {
    log_line(
        &runs,
        run.id,
        "info",
        &format!(
            "run started: scenario={}, target={}, mode={}, seed={}",
            run.scenario_name, run.target_name, run.mode, seed
        ),
    )
    .await;

    let mut target = targets::for_config(&target_config);
    debug!(
        run_id = %run.id,
        kind = %target_config.kind,
        dsn = %crate::redact::redact_dsn(&target_config.dsn),
        "target adapter ready"
    );
    let sink = StoreProgressSink::new(runs.clone(), run.id, run.progress.clone());
    let executor = Executor::new(registry, batch_size);

    match executor
        .execute(&resolved, target.as_mut(), seed, run.mode, Some(&sink))
        .await
    {
        Ok(mut stats) => {
            stats.duration_seconds =
                (Utc::now() - run.started_at).num_milliseconds() as f64 / 1000.0;
            if let Err(e) = runs
                .update_status(run.id, RunStatus::Success, None, Some(&stats))
                .await
            {
                error!(run_id = %run.id, error = %e, "failed to update run status");
            }
            log_line(
                &runs,
                run.id,
                "info",
                &format!(
                    "run completed: {} entities, {} rows in {:.2}s",
                    stats.entities_generated, stats.total_rows, stats.duration_seconds
                ),
            )
            .await;
            info!(
                run_id = %run.id,
                entities = stats.entities_generated,
                rows = stats.total_rows,
                "run completed"
            );
        }
        Err(e) => {
            let message = e.to_string();
            error!(run_id = %run.id, error = %message, "run failed");
            if let Err(e) = runs
                .update_status(run.id, RunStatus::Failed, Some(&message), None)
                .await
            {
                error!(run_id = %run.id, error = %e, "failed to update run status");
            }
            log_line(&runs, run.id, "error", &message).await;
        }
    }
}

/// Fire-and-forget log write; failures are dropped.
async fn log_line(runs: &Arc<dyn RunStore>, run_id: Uuid, level: &str, message: &str) {
    if let Err(e) = runs.append_run_log(run_id, level, message).await {
        debug!(run_id = %run_id, error = %e, "dropping run log write");
    }
}

/// Store-backed progress sink. Persists monotonically increasing counters;
/// telemetry failures never affect execution.
struct StoreProgressSink {
    runs: Arc<dyn RunStore>,
    run_id: Uuid,
    state: Mutex<RunProgress>,
}

impl StoreProgressSink {
    fn new(runs: Arc<dyn RunStore>, run_id: Uuid, initial: RunProgress) -> Self {
        Self {
            runs,
            run_id,
            state: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl ProgressSink for StoreProgressSink {
    async fn on_event(&self, event: ProgressEvent) {
        let (snapshot, log) = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            let mut log = None;
            if event.entity_started {
                state.current_entity = event.entity_name.clone();
                log = Some((
                    "info",
                    format!(
                        "generating entity {} ({} rows)",
                        event.entity_name, event.rows_total
                    ),
                ));
            }
            if event.rows_delta > 0 {
                state.rows_generated += event.rows_delta;
            }
            if event.entity_completed {
                state.entities_done = state.entities_done.max(event.entities_done);
                log = Some(("info", format!("entity {} completed", event.entity_name)));
            }
            (state.clone(), log)
        };

        if let Err(e) = self.runs.update_progress(self.run_id, &snapshot).await {
            debug!(run_id = %self.run_id, error = %e, "dropping progress update");
        }
        if let Some((level, message)) = log {
            log_line(&self.runs, self.run_id, level, &message).await;
        }
    }
}
