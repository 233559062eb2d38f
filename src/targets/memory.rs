//! In-memory target adapter.
//!
//! Captures generated rows instead of shipping them anywhere. Clones share
//! state, so a test can hand one handle to the executor and inspect rows
//! through another. Failure toggles let tests exercise error paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Entity, Value};
use crate::interfaces::{Target, TargetError};

#[derive(Default)]
struct MemoryState {
    connected: bool,
    created: BTreeSet<String>,
    truncated: Vec<String>,
    tables: BTreeMap<String, Vec<Vec<Value>>>,
    fail_connect: bool,
    fail_insert: bool,
}

/// Target adapter that records rows in memory.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_connect(&self, fail: bool) {
        self.state.write().await.fail_connect = fail;
    }

    pub async fn set_fail_insert(&self, fail: bool) {
        self.state.write().await.fail_insert = fail;
    }

    /// Rows captured for a table, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn created_tables(&self) -> Vec<String> {
        self.state.read().await.created.iter().cloned().collect()
    }

    pub async fn truncated_tables(&self) -> Vec<String> {
        self.state.read().await.truncated.clone()
    }
}

#[async_trait]
impl Target for MemoryTarget {
    async fn connect(&mut self) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        if state.fail_connect {
            return Err(TargetError::Connect("induced connect failure".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TargetError> {
        self.state.write().await.connected = false;
        Ok(())
    }

    async fn create_table_if_not_exists(&mut self, entity: &Entity) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        if !state.connected {
            return Err(TargetError::NotConnected);
        }
        state.created.insert(entity.target_table.clone());
        state.tables.entry(entity.target_table.clone()).or_default();
        Ok(())
    }

    async fn truncate_table(&mut self, table: &str) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        if !state.connected {
            return Err(TargetError::NotConnected);
        }
        state.truncated.push(table.to_string());
        state.tables.entry(table.to_string()).or_default().clear();
        Ok(())
    }

    async fn insert_batch(
        &mut self,
        entity: &Entity,
        _columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<(), TargetError> {
        let mut state = self.state.write().await;
        if !state.connected {
            return Err(TargetError::NotConnected);
        }
        if state.fail_insert {
            return Err(TargetError::Protocol("induced insert failure".into()));
        }
        state
            .tables
            .entry(entity.target_table.clone())
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn server_version(&mut self) -> Result<String, TargetError> {
        Ok("memory".to_string())
    }
}
