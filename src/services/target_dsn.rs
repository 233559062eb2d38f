//! Target DSN resolution for runs.

use url::Url;

use crate::domain::{TargetConfig, TargetKind};

/// Produce the effective target for a run, applying an optional database
/// override. Kinds that address a single database ignore the override (the
/// validator already rejects setting it for them).
pub fn resolve_target_for_run(base: &TargetConfig, db_override: Option<&str>) -> TargetConfig {
    let mut target = base.clone();
    if let Some(db) = db_override {
        if !db.is_empty() {
            target.database = Some(db.to_string());
        }
    }
    if target.kind == TargetKind::Postgres {
        if let Some(db) = target.database.clone() {
            target.dsn = with_postgres_database(&target.dsn, &db);
        }
    }
    target
}

/// Rewrite the database component of a postgres DSN: the URL path for
/// URL-form DSNs, the `dbname=` token for keyword-form DSNs (appended when
/// absent).
pub fn with_postgres_database(dsn: &str, database: &str) -> String {
    let dsn = dsn.trim();
    if dsn.is_empty() {
        return dsn.to_string();
    }

    if let Ok(mut url) = Url::parse(dsn) {
        if url.host().is_some() {
            url.set_path(&format!("/{database}"));
            return url.to_string();
        }
    }

    let mut parts: Vec<String> = dsn.split_whitespace().map(str::to_string).collect();
    let mut found = false;
    for part in &mut parts {
        if part.to_lowercase().starts_with("dbname=") {
            *part = format!("dbname={database}");
            found = true;
            break;
        }
    }
    if !found {
        parts.push(format!("dbname={database}"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetKind;

    #[test]
    fn rewrites_url_form_path() {
        assert_eq!(
            with_postgres_database("postgres://user:pw@db.example.com:5432/app?sslmode=disable", "metrics"),
            "postgres://user:pw@db.example.com:5432/metrics?sslmode=disable"
        );
    }

    #[test]
    fn rewrites_keyword_form_dbname() {
        assert_eq!(
            with_postgres_database("host=localhost user=app dbname=app", "metrics"),
            "host=localhost user=app dbname=metrics"
        );
        assert_eq!(
            with_postgres_database("host=localhost user=app", "metrics"),
            "host=localhost user=app dbname=metrics"
        );
    }

    #[test]
    fn override_applies_only_to_postgres() {
        let base = TargetConfig {
            id: String::new(),
            name: "local".into(),
            kind: TargetKind::Sqlite,
            dsn: "/tmp/out.db".into(),
            database: None,
            schema: None,
            options: Default::default(),
        };
        let resolved = resolve_target_for_run(&base, Some("metrics"));
        assert_eq!(resolved.dsn, "/tmp/out.db");

        let pg = TargetConfig {
            kind: TargetKind::Postgres,
            dsn: "postgres://db.example.com/app".into(),
            ..base
        };
        let resolved = resolve_target_for_run(&pg, Some("metrics"));
        assert_eq!(resolved.dsn, "postgres://db.example.com/metrics");
        assert_eq!(resolved.database.as_deref(), Some("metrics"));
    }
}
