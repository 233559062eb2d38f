//! Target adapter interface.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Entity, Value};

/// Errors from target adapters.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("not connected")]
    NotConnected,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Protocol(String),
}

/// A concrete external data store receiving generated rows.
///
/// An adapter instance is owned by a single executor invocation and never
/// shared across runs. Identifiers passed in (table and column names) have
/// already been proven safe by the validator; row values always travel as
/// bound parameters.
#[async_trait]
pub trait Target: Send {
    async fn connect(&mut self) -> Result<(), TargetError>;

    async fn close(&mut self) -> Result<(), TargetError>;

    /// Create the entity's table/index if it does not exist yet.
    async fn create_table_if_not_exists(&mut self, entity: &Entity) -> Result<(), TargetError>;

    /// Remove all rows from a table/index, keeping its schema.
    async fn truncate_table(&mut self, table: &str) -> Result<(), TargetError>;

    /// Insert a batch of rows. `columns` gives the column order of each row.
    async fn insert_batch(
        &mut self,
        entity: &Entity,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), TargetError>;

    /// Adapter-specific server version string.
    async fn server_version(&mut self) -> Result<String, TargetError>;
}
