//! PostgreSQL control-plane store.
//!
//! Applies the same logical migrations as the SQLite store, with native
//! UUID/TIMESTAMPTZ columns and `ADD COLUMN IF NOT EXISTS` for the column
//! backfills.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    Run, RunLog, RunProgress, RunStats, RunStatus, TableMode, TargetCheck, TargetConfig,
    TargetKind,
};
use crate::interfaces::{RunStore, StoreError, TargetStore};

const RUN_COLUMNS: &str = "id, scenario_id, scenario_name, scenario_version, \
    target_id, target_name, target_kind, \
    seed, mode, scale, resolved_counts, execution_order, warnings, \
    config_hash, status, started_at, completed_at, stats, error, \
    progress_rows_generated, progress_rows_total, progress_entities_done, \
    progress_entities_total, progress_current_entity";

/// Networked control-plane database.
pub struct PostgresControlStore {
    pool: PgPool,
}

impl PostgresControlStore {
    /// Connect and apply pending migrations.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(dsn).await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_migrations (version BIGINT PRIMARY KEY)")
            .execute(&self.pool)
            .await?;
        let current: i64 =
            sqlx::query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?
                .get(0);

        for (version, statements) in MIGRATIONS {
            if current >= *version {
                continue;
            }
            for statement in *statements {
                sqlx::query(statement).execute(&self.pool).await?;
            }
            sqlx::query("INSERT INTO schema_migrations(version) VALUES ($1)")
                .bind(version)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

const MIGRATIONS: &[(i64, &[&str])] = &[
    (
        1,
        &["CREATE TABLE IF NOT EXISTS runs (\
            id UUID PRIMARY KEY, \
            scenario_id TEXT, \
            scenario_name TEXT, \
            scenario_version TEXT, \
            target_id TEXT, \
            target_name TEXT, \
            target_kind TEXT, \
            seed BIGINT, \
            mode TEXT, \
            scale DOUBLE PRECISION, \
            resolved_counts TEXT, \
            execution_order TEXT, \
            warnings TEXT, \
            config_hash TEXT, \
            status TEXT, \
            started_at TIMESTAMPTZ, \
            completed_at TIMESTAMPTZ, \
            stats TEXT, \
            error TEXT)"],
    ),
    (
        2,
        &[
            "CREATE TABLE IF NOT EXISTS targets (\
                id TEXT PRIMARY KEY, \
                name TEXT NOT NULL, \
                kind TEXT NOT NULL, \
                dsn TEXT NOT NULL, \
                schema TEXT, \
                options_json TEXT, \
                created_at TIMESTAMPTZ NOT NULL, \
                updated_at TIMESTAMPTZ NOT NULL)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_targets_name ON targets(name)",
        ],
    ),
    (
        3,
        &[
            "CREATE TABLE IF NOT EXISTS target_checks (\
                id UUID PRIMARY KEY, \
                target_id TEXT NOT NULL, \
                checked_at TIMESTAMPTZ NOT NULL, \
                ok BOOLEAN NOT NULL, \
                latency_ms BIGINT NOT NULL, \
                server_version TEXT, \
                capabilities_json TEXT, \
                error TEXT)",
            "CREATE INDEX IF NOT EXISTS idx_target_checks_target_time \
                ON target_checks(target_id, checked_at DESC)",
        ],
    ),
    (
        4,
        &["ALTER TABLE targets ADD COLUMN IF NOT EXISTS database TEXT"],
    ),
    (
        5,
        &[
            "ALTER TABLE runs ADD COLUMN IF NOT EXISTS progress_rows_generated BIGINT",
            "ALTER TABLE runs ADD COLUMN IF NOT EXISTS progress_rows_total BIGINT",
            "ALTER TABLE runs ADD COLUMN IF NOT EXISTS progress_entities_done BIGINT",
            "ALTER TABLE runs ADD COLUMN IF NOT EXISTS progress_entities_total BIGINT",
            "ALTER TABLE runs ADD COLUMN IF NOT EXISTS progress_current_entity TEXT",
        ],
    ),
    (
        6,
        &[
            "CREATE TABLE IF NOT EXISTS run_logs (\
                id BIGSERIAL PRIMARY KEY, \
                run_id UUID NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL, \
                level TEXT NOT NULL, \
                message TEXT NOT NULL)",
            "CREATE INDEX IF NOT EXISTS idx_run_logs_run_time ON run_logs(run_id, id DESC)",
        ],
    ),
];

fn run_from_row(row: &PgRow) -> Result<Run, StoreError> {
    let mode: String = row.get("mode");
    let status: String = row.get("status");
    let resolved_counts: Option<String> = row.get("resolved_counts");
    let execution_order: Option<String> = row.get("execution_order");
    let warnings: Option<String> = row.get("warnings");
    let stats: Option<String> = row.get("stats");

    Ok(Run {
        id: row.get("id"),
        scenario_id: row.get("scenario_id"),
        scenario_name: row.get("scenario_name"),
        scenario_version: row.get("scenario_version"),
        target_id: row.get("target_id"),
        target_name: row.get("target_name"),
        target_kind: row.get("target_kind"),
        seed: row.get("seed"),
        mode: TableMode::from_str(&mode).map_err(StoreError::Decode)?,
        scale: row.get("scale"),
        resolved_counts: match resolved_counts {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Default::default(),
        },
        execution_order: match execution_order {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        },
        warnings: match warnings {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Vec::new(),
        },
        config_hash: row.get("config_hash"),
        status: RunStatus::from_str(&status).map_err(StoreError::Decode)?,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        stats: match stats {
            Some(raw) if !raw.is_empty() => Some(serde_json::from_str(&raw)?),
            _ => None,
        },
        error: row.get::<Option<String>, _>("error").unwrap_or_default(),
        progress: RunProgress {
            rows_generated: row
                .get::<Option<i64>, _>("progress_rows_generated")
                .unwrap_or_default(),
            rows_total: row
                .get::<Option<i64>, _>("progress_rows_total")
                .unwrap_or_default(),
            entities_done: row
                .get::<Option<i64>, _>("progress_entities_done")
                .unwrap_or_default(),
            entities_total: row
                .get::<Option<i64>, _>("progress_entities_total")
                .unwrap_or_default(),
            current_entity: row
                .get::<Option<String>, _>("progress_current_entity")
                .unwrap_or_default(),
        },
    })
}

#[async_trait]
impl RunStore for PostgresControlStore {
    async fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO runs ({RUN_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, $18, $19, $20, $21, $22, $23, $24)"
        );
        sqlx::query(&sql)
            .bind(run.id)
            .bind(&run.scenario_id)
            .bind(&run.scenario_name)
            .bind(&run.scenario_version)
            .bind(&run.target_id)
            .bind(&run.target_name)
            .bind(&run.target_kind)
            .bind(run.seed)
            .bind(run.mode.as_str())
            .bind(run.scale)
            .bind(serde_json::to_string(&run.resolved_counts)?)
            .bind(serde_json::to_string(&run.execution_order)?)
            .bind(serde_json::to_string(&run.warnings)?)
            .bind(&run.config_hash)
            .bind(run.status.as_str())
            .bind(run.started_at)
            .bind(run.completed_at)
            .bind(
                run.stats
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
            )
            .bind(&run.error)
            .bind(run.progress.rows_generated)
            .bind(run.progress.rows_total)
            .bind(run.progress.entities_done)
            .bind(run.progress.entities_total)
            .bind(&run.progress.current_entity)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Run, StoreError> {
        let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run {id}")))?;
        run_from_row(&row)
    }

    async fn list_runs(
        &self,
        limit: i64,
        status: Option<RunStatus>,
    ) -> Result<Vec<Run>, StoreError> {
        let limit = if limit <= 0 { 50 } else { limit };
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {RUN_COLUMNS} FROM runs WHERE status = $1 \
                     ORDER BY started_at DESC LIMIT $2"
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql =
                    format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at DESC LIMIT $1");
                sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(run_from_row).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RunStatus,
        error: Option<&str>,
        stats: Option<&RunStats>,
    ) -> Result<(), StoreError> {
        let completed_at: Option<DateTime<Utc>> = status.is_terminal().then(Utc::now);
        sqlx::query(
            "UPDATE runs SET status = $1, error = $2, \
             stats = COALESCE($3, stats), completed_at = COALESCE($4, completed_at) \
             WHERE id = $5",
        )
        .bind(status.as_str())
        .bind(error.unwrap_or_default())
        .bind(stats.map(serde_json::to_string).transpose()?)
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: &RunProgress) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE runs SET progress_rows_generated = $1, progress_rows_total = $2, \
             progress_entities_done = $3, progress_entities_total = $4, \
             progress_current_entity = $5 WHERE id = $6",
        )
        .bind(progress.rows_generated)
        .bind(progress.rows_total)
        .bind(progress.entities_done)
        .bind(progress.entities_total)
        .bind(&progress.current_entity)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_run_log(
        &self,
        run_id: Uuid,
        level: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO run_logs (run_id, created_at, level, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(run_id)
        .bind(Utc::now())
        .bind(level)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_run_logs(&self, run_id: Uuid, limit: i64) -> Result<Vec<RunLog>, StoreError> {
        let limit = if limit <= 0 { 200 } else { limit };
        let rows = sqlx::query(
            "SELECT id, run_id, created_at, level, message FROM run_logs \
             WHERE run_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(run_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| RunLog {
                id: row.get("id"),
                run_id: row.get("run_id"),
                created_at: row.get("created_at"),
                level: row.get("level"),
                message: row.get("message"),
            })
            .collect())
    }
}

fn target_from_row(row: &PgRow) -> Result<TargetConfig, StoreError> {
    let kind: String = row.get("kind");
    let options_json: Option<String> = row.get("options_json");
    Ok(TargetConfig {
        id: row.get("id"),
        name: row.get("name"),
        kind: TargetKind::from_str(&kind).map_err(StoreError::Decode)?,
        dsn: row.get("dsn"),
        database: row.get("database"),
        schema: row.get("schema"),
        options: match options_json {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
            _ => Default::default(),
        },
    })
}

fn map_unique_violation(err: sqlx::Error, name: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("target name already exists: {name}"))
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl TargetStore for PostgresControlStore {
    async fn create_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO targets (id, name, kind, dsn, database, schema, options_json, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&target.id)
        .bind(&target.name)
        .bind(target.kind.as_str())
        .bind(&target.dsn)
        .bind(&target.database)
        .bind(&target.schema)
        .bind(serde_json::to_string(&target.options)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &target.name))?;
        Ok(())
    }

    async fn update_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE targets SET name = $1, kind = $2, dsn = $3, database = $4, \
             schema = $5, options_json = $6, updated_at = $7 WHERE id = $8",
        )
        .bind(&target.name)
        .bind(target.kind.as_str())
        .bind(&target.dsn)
        .bind(&target.database)
        .bind(&target.schema)
        .bind(serde_json::to_string(&target.options)?)
        .bind(Utc::now())
        .bind(&target.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &target.name))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("target {}", target.id)));
        }
        Ok(())
    }

    async fn delete_target(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM targets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("target {id}")));
        }
        Ok(())
    }

    async fn get_target(&self, id: &str) -> Result<TargetConfig, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, kind, dsn, database, schema, options_json FROM targets \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("target {id}")))?;
        target_from_row(&row)
    }

    async fn get_target_by_name(&self, name: &str) -> Result<TargetConfig, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, kind, dsn, database, schema, options_json FROM targets \
             WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("target named {name}")))?;
        target_from_row(&row)
    }

    async fn list_targets(&self) -> Result<Vec<TargetConfig>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, kind, dsn, database, schema, options_json FROM targets \
             ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(target_from_row).collect()
    }

    async fn record_check(&self, check: &TargetCheck) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO target_checks (id, target_id, checked_at, ok, latency_ms, \
             server_version, capabilities_json, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(check.id)
        .bind(&check.target_id)
        .bind(check.checked_at)
        .bind(check.ok)
        .bind(check.latency_ms)
        .bind(&check.server_version)
        .bind(serde_json::to_string(&check.capabilities)?)
        .bind(&check.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_checks(
        &self,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<TargetCheck>, StoreError> {
        let limit = if limit <= 0 { 50 } else { limit };
        let rows = sqlx::query(
            "SELECT id, target_id, checked_at, ok, latency_ms, server_version, \
             capabilities_json, error FROM target_checks \
             WHERE target_id = $1 ORDER BY checked_at DESC LIMIT $2",
        )
        .bind(target_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let capabilities: Option<String> = row.get("capabilities_json");
                Ok(TargetCheck {
                    id: row.get("id"),
                    target_id: row.get("target_id"),
                    checked_at: row.get("checked_at"),
                    ok: row.get("ok"),
                    latency_ms: row.get("latency_ms"),
                    server_version: row
                        .get::<Option<String>, _>("server_version")
                        .unwrap_or_default(),
                    capabilities: match capabilities {
                        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)?,
                        _ => Default::default(),
                    },
                    error: row.get::<Option<String>, _>("error").unwrap_or_default(),
                })
            })
            .collect()
    }
}
