//! Target capability probe.
//!
//! Runs a minimal lifecycle against a target: connect, create a scratch
//! table, insert one row, truncate, close. Each successful step sets a
//! capability bit. The probe never panics and never returns an error; a
//! failed probe carries `ok = false` and the failure text.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tokio::time::timeout;
use uuid::Uuid;

use crate::domain::{
    Column, ColumnType, Entity, GeneratorSpec, TargetCapabilities, TargetCheck, TargetConfig,
    Value,
};
use crate::interfaces::Target;
use crate::targets;
use crate::validation::validate_target;

use super::target_dsn::resolve_target_for_run;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe a target's connectivity, server version, and capabilities.
/// Latency is end-to-end wall time from start to completion or first
/// failure.
pub async fn check_target(config: &TargetConfig) -> TargetCheck {
    let mut check = TargetCheck {
        id: Uuid::new_v4(),
        target_id: config.id.clone(),
        checked_at: Utc::now(),
        ok: false,
        latency_ms: 0,
        server_version: String::new(),
        capabilities: TargetCapabilities::default(),
        error: String::new(),
    };

    if let Err(e) = validate_target(config) {
        check.error = e.to_string();
        return check;
    }

    let started = Instant::now();
    let effective = resolve_target_for_run(config, None);
    let mut target = targets::for_config(&effective);

    match timeout(PROBE_TIMEOUT, target.connect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            check.error = e.to_string();
            check.latency_ms = started.elapsed().as_millis() as i64;
            return check;
        }
        Err(_) => {
            check.error = "connect timed out".to_string();
            check.latency_ms = started.elapsed().as_millis() as i64;
            return check;
        }
    }

    if let Ok(Ok(version)) = timeout(PROBE_TIMEOUT, target.server_version()).await {
        check.server_version = version;
    }

    check.capabilities = probe_capabilities(target.as_mut()).await;
    let _ = timeout(PROBE_TIMEOUT, target.close()).await;

    check.ok = true;
    check.latency_ms = started.elapsed().as_millis() as i64;
    check
}

/// Scratch entity named after the probe time so concurrent probes don't
/// collide.
fn probe_entity() -> Entity {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    Entity {
        name: "sdgen_check".to_string(),
        target_table: format!("sdgen_check_{nanos}"),
        rows: 1,
        columns: vec![Column {
            name: "id".to_string(),
            column_type: ColumnType::Int,
            nullable: false,
            generator: GeneratorSpec::new("const"),
            fk: None,
        }],
    }
}

async fn probe_capabilities(target: &mut dyn Target) -> TargetCapabilities {
    let entity = probe_entity();
    let mut caps = TargetCapabilities::default();

    match timeout(PROBE_TIMEOUT, target.create_table_if_not_exists(&entity)).await {
        Ok(Ok(())) => caps.can_create = true,
        _ => return caps,
    }

    let columns = vec!["id".to_string()];
    match timeout(
        PROBE_TIMEOUT,
        target.insert_batch(&entity, &columns, vec![vec![Value::Int(1)]]),
    )
    .await
    {
        Ok(Ok(())) => caps.can_insert = true,
        _ => return caps,
    }

    match timeout(PROBE_TIMEOUT, target.truncate_table(&entity.target_table)).await {
        Ok(Ok(())) => caps.can_truncate = true,
        _ => {}
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetKind;

    #[tokio::test]
    async fn sqlite_probe_reports_full_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.db");
        let config = TargetConfig {
            id: "tg-1".into(),
            name: "local".into(),
            kind: TargetKind::Sqlite,
            dsn: path.to_str().unwrap().to_string(),
            database: None,
            schema: None,
            options: Default::default(),
        };

        let check = check_target(&config).await;
        assert!(check.ok, "probe failed: {}", check.error);
        assert!(check.capabilities.can_create);
        assert!(check.capabilities.can_insert);
        assert!(check.capabilities.can_truncate);
        assert!(!check.server_version.is_empty());
        assert!(check.error.is_empty());
    }

    #[tokio::test]
    async fn invalid_target_fails_without_probing() {
        let config = TargetConfig {
            id: "tg-2".into(),
            name: String::new(),
            kind: TargetKind::Sqlite,
            dsn: "/tmp/x.db".into(),
            database: None,
            schema: None,
            options: Default::default(),
        };
        let check = check_target(&config).await;
        assert!(!check.ok);
        assert!(!check.error.is_empty());
        assert!(!check.capabilities.can_create);
    }
}
