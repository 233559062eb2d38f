//! SQLite control-plane store.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::schema::{RunLogs, TargetChecks, Targets};
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

/// Embedded control-plane database.
///
/// A single pooled connection serializes writers; SQLite only allows one
/// anyway.
pub struct SqliteControlStore {
    pool: SqlitePool,
}

impl SqliteControlStore {
    /// Open (creating if necessary) the database at `path` and apply
    /// pending migrations.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        ensure_parent_dir(path);
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the migration ladder. Idempotent: each version runs at most
    /// once, and the DDL itself tolerates re-application.
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;
        let current: i64 =
            sqlx::query("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?
                .get(0);

        for version in 1..=6i64 {
            if current >= version {
                continue;
            }
            match version {
                1 => self.migrate_v1_runs().await?,
                2 => self.migrate_v2_targets().await?,
                3 => self.migrate_v3_target_checks().await?,
                4 => self.migrate_v4_target_database().await?,
                5 => self.migrate_v5_run_progress().await?,
                6 => self.migrate_v6_run_logs().await?,
                _ => unreachable!(),
            }
            sqlx::query("INSERT INTO schema_migrations(version) VALUES (?)")
                .bind(version)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn migrate_v1_runs(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS runs (\
                id TEXT PRIMARY KEY, \
                scenario_id TEXT, \
                scenario_name TEXT, \
                scenario_version TEXT, \
                target_id TEXT, \
                target_name TEXT, \
                target_kind TEXT, \
                seed INTEGER, \
                mode TEXT, \
                scale REAL, \
                resolved_counts TEXT, \
                execution_order TEXT, \
                warnings TEXT, \
                config_hash TEXT, \
                status TEXT, \
                started_at TEXT, \
                completed_at TEXT, \
                stats TEXT, \
                error TEXT)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_v2_targets(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS targets (\
                id TEXT PRIMARY KEY, \
                name TEXT NOT NULL, \
                kind TEXT NOT NULL, \
                dsn TEXT NOT NULL, \
                schema TEXT, \
                options_json TEXT, \
                created_at TEXT NOT NULL, \
                updated_at TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_targets_name ON targets(name)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn migrate_v3_target_checks(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS target_checks (\
                id TEXT PRIMARY KEY, \
                target_id TEXT NOT NULL, \
                checked_at TEXT NOT NULL, \
                ok INTEGER NOT NULL, \
                latency_ms INTEGER NOT NULL, \
                server_version TEXT, \
                capabilities_json TEXT, \
                error TEXT)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_target_checks_target_time \
             ON target_checks(target_id, checked_at DESC)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn migrate_v4_target_database(&self) -> Result<(), StoreError> {
        if !self.has_column("targets", "database").await? {
            sqlx::query("ALTER TABLE targets ADD COLUMN database TEXT")
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn migrate_v5_run_progress(&self) -> Result<(), StoreError> {
        // SQLite has no ADD COLUMN IF NOT EXISTS; probe the table first.
        for (name, ddl) in [
            (
                "progress_rows_generated",
                "ALTER TABLE runs ADD COLUMN progress_rows_generated INTEGER",
            ),
            (
                "progress_rows_total",
                "ALTER TABLE runs ADD COLUMN progress_rows_total INTEGER",
            ),
            (
                "progress_entities_done",
                "ALTER TABLE runs ADD COLUMN progress_entities_done INTEGER",
            ),
            (
                "progress_entities_total",
                "ALTER TABLE runs ADD COLUMN progress_entities_total INTEGER",
            ),
            (
                "progress_current_entity",
                "ALTER TABLE runs ADD COLUMN progress_current_entity TEXT",
            ),
        ] {
            if !self.has_column("runs", name).await? {
                sqlx::query(ddl).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    async fn migrate_v6_run_logs(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS run_logs (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                run_id TEXT NOT NULL, \
                created_at TEXT NOT NULL, \
                level TEXT NOT NULL, \
                message TEXT NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_run_logs_run_time ON run_logs(run_id, id DESC)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool, StoreError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .any(|row| row.get::<String, _>("name") == column))
    }
}

fn ensure_parent_dir(path: &str) {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed == ":memory:" || trimmed.starts_with("sqlite:") {
        return;
    }
    if let Some(parent) = Path::new(trimmed).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn run_from_row(row: &SqliteRow) -> Result<Run, StoreError> {
    let id: String = row.get("id");
    let mode: String = row.get("mode");
    let status: String = row.get("status");
    let started_at: String = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");
    let resolved_counts: Option<String> = row.get("resolved_counts");
    let execution_order: Option<String> = row.get("execution_order");
    let warnings: Option<String> = row.get("warnings");
    let stats: Option<String> = row.get("stats");

    Ok(Run {
        id: Uuid::parse_str(&id)?,
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
        started_at: parse_timestamp(&started_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
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
impl RunStore for SqliteControlStore {
    async fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO runs ({RUN_COLUMNS}) VALUES \
             (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        sqlx::query(&sql)
            .bind(run.id.to_string())
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
            .bind(run.started_at.to_rfc3339())
            .bind(run.completed_at.map(|t| t.to_rfc3339()))
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
        let sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
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
                    "SELECT {RUN_COLUMNS} FROM runs WHERE status = ? \
                     ORDER BY started_at DESC LIMIT ?"
                );
                sqlx::query(&sql)
                    .bind(status.as_str())
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql =
                    format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at DESC LIMIT ?");
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
        let completed_at = status.is_terminal().then(|| Utc::now().to_rfc3339());
        sqlx::query(
            "UPDATE runs SET status = ?, error = ?, \
             stats = COALESCE(?, stats), completed_at = COALESCE(?, completed_at) \
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error.unwrap_or_default())
        .bind(stats.map(serde_json::to_string).transpose()?)
        .bind(completed_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: &RunProgress) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE runs SET progress_rows_generated = ?, progress_rows_total = ?, \
             progress_entities_done = ?, progress_entities_total = ?, \
             progress_current_entity = ? WHERE id = ?",
        )
        .bind(progress.rows_generated)
        .bind(progress.rows_total)
        .bind(progress.entities_done)
        .bind(progress.entities_total)
        .bind(&progress.current_entity)
        .bind(id.to_string())
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
        let query = Query::insert()
            .into_table(RunLogs::Table)
            .columns([
                RunLogs::RunId,
                RunLogs::CreatedAt,
                RunLogs::Level,
                RunLogs::Message,
            ])
            .values_panic([
                run_id.to_string().into(),
                Utc::now().to_rfc3339().into(),
                level.into(),
                message.into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_run_logs(&self, run_id: Uuid, limit: i64) -> Result<Vec<RunLog>, StoreError> {
        let limit = if limit <= 0 { 200 } else { limit };
        let query = Query::select()
            .columns([
                RunLogs::Id,
                RunLogs::RunId,
                RunLogs::CreatedAt,
                RunLogs::Level,
                RunLogs::Message,
            ])
            .from(RunLogs::Table)
            .and_where(Expr::col(RunLogs::RunId).eq(run_id.to_string()))
            .order_by(RunLogs::Id, Order::Desc)
            .limit(limit as u64)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let run_id: String = row.get("run_id");
                let created_at: String = row.get("created_at");
                Ok(RunLog {
                    id: row.get("id"),
                    run_id: Uuid::parse_str(&run_id)?,
                    created_at: parse_timestamp(&created_at)?,
                    level: row.get("level"),
                    message: row.get("message"),
                })
            })
            .collect()
    }
}

fn target_from_row(row: &SqliteRow) -> Result<TargetConfig, StoreError> {
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
impl TargetStore for SqliteControlStore {
    async fn create_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let query = Query::insert()
            .into_table(Targets::Table)
            .columns([
                Targets::Id,
                Targets::Name,
                Targets::Kind,
                Targets::Dsn,
                Targets::Database,
                Targets::Schema,
                Targets::OptionsJson,
                Targets::CreatedAt,
                Targets::UpdatedAt,
            ])
            .values_panic([
                target.id.clone().into(),
                target.name.clone().into(),
                target.kind.as_str().into(),
                target.dsn.clone().into(),
                target.database.clone().into(),
                target.schema.clone().into(),
                serde_json::to_string(&target.options)?.into(),
                now.clone().into(),
                now.into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &target.name))?;
        Ok(())
    }

    async fn update_target(&self, target: &TargetConfig) -> Result<(), StoreError> {
        let query = Query::update()
            .table(Targets::Table)
            .values([
                (Targets::Name, target.name.clone().into()),
                (Targets::Kind, target.kind.as_str().into()),
                (Targets::Dsn, target.dsn.clone().into()),
                (Targets::Database, target.database.clone().into()),
                (Targets::Schema, target.schema.clone().into()),
                (
                    Targets::OptionsJson,
                    serde_json::to_string(&target.options)?.into(),
                ),
                (Targets::UpdatedAt, Utc::now().to_rfc3339().into()),
            ])
            .and_where(Expr::col(Targets::Id).eq(target.id.clone()))
            .to_string(SqliteQueryBuilder);
        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &target.name))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("target {}", target.id)));
        }
        Ok(())
    }

    async fn delete_target(&self, id: &str) -> Result<(), StoreError> {
        let query = Query::delete()
            .from_table(Targets::Table)
            .and_where(Expr::col(Targets::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        let result = sqlx::query(&query).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("target {id}")));
        }
        Ok(())
    }

    async fn get_target(&self, id: &str) -> Result<TargetConfig, StoreError> {
        let query = Query::select()
            .columns(TARGET_COLUMNS)
            .from(Targets::Table)
            .and_where(Expr::col(Targets::Id).eq(id))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("target {id}")))?;
        target_from_row(&row)
    }

    async fn get_target_by_name(&self, name: &str) -> Result<TargetConfig, StoreError> {
        let query = Query::select()
            .columns(TARGET_COLUMNS)
            .from(Targets::Table)
            .and_where(Expr::col(Targets::Name).eq(name))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&query)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("target named {name}")))?;
        target_from_row(&row)
    }

    async fn list_targets(&self) -> Result<Vec<TargetConfig>, StoreError> {
        let query = Query::select()
            .columns(TARGET_COLUMNS)
            .from(Targets::Table)
            .order_by(Targets::Name, Order::Asc)
            .to_string(SqliteQueryBuilder);
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(target_from_row).collect()
    }

    async fn record_check(&self, check: &TargetCheck) -> Result<(), StoreError> {
        let query = Query::insert()
            .into_table(TargetChecks::Table)
            .columns([
                TargetChecks::Id,
                TargetChecks::TargetId,
                TargetChecks::CheckedAt,
                TargetChecks::Ok,
                TargetChecks::LatencyMs,
                TargetChecks::ServerVersion,
                TargetChecks::CapabilitiesJson,
                TargetChecks::Error,
            ])
            .values_panic([
                check.id.to_string().into(),
                check.target_id.clone().into(),
                check.checked_at.to_rfc3339().into(),
                i64::from(check.ok).into(),
                check.latency_ms.into(),
                check.server_version.clone().into(),
                serde_json::to_string(&check.capabilities)?.into(),
                check.error.clone().into(),
            ])
            .to_string(SqliteQueryBuilder);
        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_checks(
        &self,
        target_id: &str,
        limit: i64,
    ) -> Result<Vec<TargetCheck>, StoreError> {
        let limit = if limit <= 0 { 50 } else { limit };
        let query = Query::select()
            .columns([
                TargetChecks::Id,
                TargetChecks::TargetId,
                TargetChecks::CheckedAt,
                TargetChecks::Ok,
                TargetChecks::LatencyMs,
                TargetChecks::ServerVersion,
                TargetChecks::CapabilitiesJson,
                TargetChecks::Error,
            ])
            .from(TargetChecks::Table)
            .and_where(Expr::col(TargetChecks::TargetId).eq(target_id))
            .order_by(TargetChecks::CheckedAt, Order::Desc)
            .limit(limit as u64)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let checked_at: String = row.get("checked_at");
                let capabilities: Option<String> = row.get("capabilities_json");
                Ok(TargetCheck {
                    id: Uuid::parse_str(&id)?,
                    target_id: row.get("target_id"),
                    checked_at: parse_timestamp(&checked_at)?,
                    ok: row.get::<i64, _>("ok") != 0,
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

const TARGET_COLUMNS: [Targets; 7] = [
    Targets::Id,
    Targets::Name,
    Targets::Kind,
    Targets::Dsn,
    Targets::Database,
    Targets::Schema,
    Targets::OptionsJson,
];

#[cfg(test)]
mod tests;
