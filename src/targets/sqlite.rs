//! SQLite target adapter.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::domain::{ColumnType, Entity, Value};
use crate::interfaces::{Target, TargetError};

/// Writes generated rows into a SQLite database file.
pub struct SqliteTarget {
    dsn: String,
    pool: Option<SqlitePool>,
}

impl SqliteTarget {
    pub fn new(dsn: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            pool: None,
        }
    }

    fn pool(&self) -> Result<&SqlitePool, TargetError> {
        self.pool.as_ref().ok_or(TargetError::NotConnected)
    }

    fn map_column_type(column_type: ColumnType) -> &'static str {
        match column_type {
            ColumnType::Int | ColumnType::BigInt | ColumnType::Bool => "INTEGER",
            ColumnType::Float | ColumnType::Double => "REAL",
            ColumnType::String
            | ColumnType::Text
            | ColumnType::Timestamp
            | ColumnType::Date
            | ColumnType::Uuid => "TEXT",
        }
    }
}

/// Normalize a plain file path into a sqlx sqlite URL that creates the
/// database on first open.
fn connect_url(dsn: &str) -> String {
    let dsn = dsn.trim();
    if dsn.starts_with("sqlite:") {
        dsn.to_string()
    } else if dsn == ":memory:" {
        "sqlite::memory:".to_string()
    } else {
        format!("sqlite:{dsn}?mode=rwc")
    }
}

#[async_trait]
impl Target for SqliteTarget {
    async fn connect(&mut self) -> Result<(), TargetError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&connect_url(&self.dsn))
            .await
            .map_err(|e| TargetError::Connect(e.to_string()))?;
        self.pool = Some(pool);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
        Ok(())
    }

    async fn create_table_if_not_exists(&mut self, entity: &Entity) -> Result<(), TargetError> {
        let pool = self.pool()?;
        let exists =
            sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(&entity.target_table)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            return Ok(());
        }

        let column_defs: Vec<String> = entity
            .columns
            .iter()
            .map(|col| {
                let nullable = if col.nullable { "" } else { " NOT NULL" };
                format!(
                    "{} {}{nullable}",
                    col.name,
                    Self::map_column_type(col.column_type)
                )
            })
            .collect();

        let create_sql = format!(
            "CREATE TABLE {} ({})",
            entity.target_table,
            column_defs.join(", ")
        );
        sqlx::query(&create_sql).execute(pool).await?;
        Ok(())
    }

    async fn truncate_table(&mut self, table: &str) -> Result<(), TargetError> {
        let pool = self.pool()?;
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        entity: &Entity,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), TargetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let pool = self.pool()?;

        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            entity.target_table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut tx = pool.begin().await?;
        for row in rows {
            let mut query = sqlx::query(&insert_sql);
            for value in row {
                query = bind_value(query, value);
            }
            query.execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn server_version(&mut self) -> Result<String, TargetError> {
        let pool = self.pool()?;
        let row = sqlx::query("SELECT sqlite_version()").fetch_one(pool).await?;
        Ok(row.get::<String, _>(0))
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: Value,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(i64::from(b)),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Uuid(u) => query.bind(u.to_string()),
        Value::Timestamp(t) => query.bind(t.to_rfc3339()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, GeneratorSpec};
    use chrono::Utc;

    fn entity() -> Entity {
        Entity {
            name: "readings".into(),
            target_table: "readings".into(),
            rows: 2,
            columns: vec![
                Column {
                    name: "id".into(),
                    column_type: ColumnType::Int,
                    nullable: false,
                    generator: GeneratorSpec::new("uniform_int"),
                    fk: None,
                },
                Column {
                    name: "taken_at".into(),
                    column_type: ColumnType::Timestamp,
                    nullable: false,
                    generator: GeneratorSpec::new("time_series"),
                    fk: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn create_insert_truncate_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.db");
        let mut target = SqliteTarget::new(path.to_str().unwrap());

        target.connect().await.unwrap();
        let entity = entity();
        target.create_table_if_not_exists(&entity).await.unwrap();
        // a second create is a no-op
        target.create_table_if_not_exists(&entity).await.unwrap();

        let columns = vec!["id".to_string(), "taken_at".to_string()];
        target
            .insert_batch(
                &entity,
                &columns,
                vec![
                    vec![Value::Int(1), Value::Timestamp(Utc::now())],
                    vec![Value::Int(2), Value::Timestamp(Utc::now())],
                ],
            )
            .await
            .unwrap();

        let pool = target.pool().unwrap();
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM readings")
            .fetch_one(pool)
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, 2);

        target.truncate_table("readings").await.unwrap();
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM readings")
            .fetch_one(target.pool().unwrap())
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, 0);

        assert!(!target.server_version().await.unwrap().is_empty());
        target.close().await.unwrap();
    }

    #[test]
    fn connect_url_normalizes_paths() {
        assert_eq!(connect_url(":memory:"), "sqlite::memory:");
        assert_eq!(connect_url("/tmp/x.db"), "sqlite:/tmp/x.db?mode=rwc");
        assert_eq!(connect_url("sqlite::memory:"), "sqlite::memory:");
    }
}
