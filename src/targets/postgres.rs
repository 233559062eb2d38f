//! PostgreSQL target adapter.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::domain::{ColumnType, Entity, Value};
use crate::interfaces::{Target, TargetError};

/// Writes generated rows into a PostgreSQL schema using multi-row inserts
/// with numbered placeholders.
pub struct PostgresTarget {
    dsn: String,
    schema: String,
    pool: Option<PgPool>,
}

impl PostgresTarget {
    pub fn new(dsn: &str, schema: &str) -> Self {
        let schema = if schema.is_empty() { "public" } else { schema };
        Self {
            dsn: dsn.to_string(),
            schema: schema.to_string(),
            pool: None,
        }
    }

    fn pool(&self) -> Result<&PgPool, TargetError> {
        self.pool.as_ref().ok_or(TargetError::NotConnected)
    }

    fn map_column_type(column_type: ColumnType) -> &'static str {
        match column_type {
            ColumnType::Int => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "REAL",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::String => "VARCHAR(255)",
            ColumnType::Text => "TEXT",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Date => "DATE",
            ColumnType::Uuid => "UUID",
        }
    }

    /// Explicit cast suffix for columns whose parameter type would not
    /// coerce on assignment (text into uuid/timestamp/date).
    fn placeholder_cast(column_type: ColumnType) -> &'static str {
        match column_type {
            ColumnType::Uuid => "::uuid",
            ColumnType::Timestamp => "::timestamp",
            ColumnType::Date => "::date",
            _ => "",
        }
    }
}

#[async_trait]
impl Target for PostgresTarget {
    async fn connect(&mut self) -> Result<(), TargetError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&self.dsn)
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
        let exists: bool = sqlx::query(
            "SELECT EXISTS (SELECT FROM information_schema.tables \
             WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&self.schema)
        .bind(&entity.target_table)
        .fetch_one(pool)
        .await?
        .get(0);
        if exists {
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
            "CREATE TABLE {}.{} ({})",
            self.schema,
            entity.target_table,
            column_defs.join(", ")
        );
        sqlx::query(&create_sql).execute(pool).await?;
        Ok(())
    }

    async fn truncate_table(&mut self, table: &str) -> Result<(), TargetError> {
        let pool = self.pool()?;
        sqlx::query(&format!("TRUNCATE TABLE {}.{table}", self.schema))
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

        let casts: Vec<&'static str> = entity
            .columns
            .iter()
            .map(|c| Self::placeholder_cast(c.column_type))
            .collect();

        let mut placeholders = Vec::with_capacity(rows.len());
        for row_idx in 0..rows.len() {
            let row_params: Vec<String> = (0..columns.len())
                .map(|col_idx| {
                    let n = row_idx * columns.len() + col_idx + 1;
                    format!("${n}{}", casts.get(col_idx).copied().unwrap_or(""))
                })
                .collect();
            placeholders.push(format!("({})", row_params.join(", ")));
        }

        let insert_sql = format!(
            "INSERT INTO {}.{} ({}) VALUES {}",
            self.schema,
            entity.target_table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&insert_sql);
        for row in rows {
            for value in row {
                query = bind_value(query, value);
            }
        }
        query.execute(pool).await?;
        Ok(())
    }

    async fn server_version(&mut self) -> Result<String, TargetError> {
        let pool = self.pool()?;
        let row = sqlx::query("SHOW server_version").fetch_one(pool).await?;
        Ok(row.get::<String, _>(0))
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    value: Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Text(s) => query.bind(s),
        Value::Uuid(u) => query.bind(u.to_string()),
        // columns are TIMESTAMP (no tz); bind the UTC wall time
        Value::Timestamp(t) => query.bind(t.naive_utc()),
    }
}
