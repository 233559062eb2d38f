//! Run execution engine.
//!
//! Streams deterministic pseudo-random rows entity-by-entity through a
//! target adapter. Entities run strictly sequentially in FK dependency
//! order; within an entity, rows accumulate into batches that flush to the
//! target. Execution is fail-fast and non-transactional across entities:
//! the first error aborts the run and already-inserted rows remain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::domain::{Entity, EntityRunStats, RunStats, Scenario, TableMode, Value};
use crate::generators::{GeneratorContext, GeneratorError, GeneratorRegistry};
use crate::interfaces::{Target, TargetError};
use crate::validation::{self, ValidationError};

/// Default rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Errors aborting a run, wrapped with entity/column/row context.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to connect to target: {0}")]
    Connect(#[source] TargetError),

    #[error("failed to sort entities: {0}")]
    Order(#[from] ValidationError),

    #[error("failed to prepare table for entity '{entity}': {source}")]
    Prepare {
        entity: String,
        #[source]
        source: TargetError,
    },

    #[error("entity '{entity}', column '{column}', row {row}: {source}")]
    Generate {
        entity: String,
        column: String,
        row: i64,
        #[source]
        source: GeneratorError,
    },

    #[error("failed to insert batch for entity '{entity}': {source}")]
    Insert {
        entity: String,
        #[source]
        source: TargetError,
    },

    #[error("FK reference {0} not yet generated")]
    MissingReference(String),
}

/// One progress notification. Exactly one of `entity_started`,
/// `entity_completed`, or a non-zero `rows_delta` describes the event.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub entity_name: String,
    pub entity_started: bool,
    pub entity_completed: bool,
    pub rows_delta: i64,
    pub rows_total: i64,
    pub entities_done: i64,
    pub entities_total: i64,
}

/// Receives progress events in execution order on a single logical stream.
///
/// Sinks are telemetry: they cannot fail the run, so `on_event` is
/// infallible and implementations drop their own errors.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_event(&self, event: ProgressEvent);
}

/// Streams rows for a resolved scenario through a target adapter.
pub struct Executor {
    registry: Arc<GeneratorRegistry>,
    batch_size: usize,
}

impl Executor {
    /// A non-positive `batch_size` falls back to [`DEFAULT_BATCH_SIZE`].
    pub fn new(registry: Arc<GeneratorRegistry>, batch_size: usize) -> Self {
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        Self {
            registry,
            batch_size,
        }
    }

    /// Execute a resolved scenario. Returns aggregate stats, or the first
    /// error encountered.
    pub async fn execute(
        &self,
        scenario: &Scenario,
        target: &mut dyn Target,
        seed: i64,
        mode: TableMode,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RunStats, ExecError> {
        target.connect().await.map_err(ExecError::Connect)?;
        let result = self
            .run_entities(scenario, target, seed, mode, progress)
            .await;
        let _ = target.close().await;
        result
    }

    async fn run_entities(
        &self,
        scenario: &Scenario,
        target: &mut dyn Target,
        seed: i64,
        mode: TableMode,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<RunStats, ExecError> {
        let order = validation::topological_sort(scenario)?;
        let entities_total = order.len() as i64;

        let mut entity_values: HashMap<String, Vec<Value>> = HashMap::new();
        let mut stats = RunStats::default();
        let mut entities_done: i64 = 0;

        for entity_name in &order {
            let entity = scenario
                .entity(entity_name)
                .ok_or_else(|| ExecError::MissingReference(entity_name.clone()))?;
            let started = Instant::now();

            if let Some(sink) = progress {
                sink.on_event(ProgressEvent {
                    entity_name: entity.name.clone(),
                    entity_started: true,
                    entity_completed: false,
                    rows_delta: 0,
                    rows_total: entity.rows,
                    entities_done,
                    entities_total,
                })
                .await;
            }

            // Sibling entities diverge through the name-length mix; the
            // contract is only that (seed, scenario) reproduces outputs.
            let entity_seed = seed.wrapping_add(entity.name.len() as i64);
            let mut rng = ChaCha8Rng::seed_from_u64(entity_seed as u64);

            match mode {
                TableMode::Create => {
                    target
                        .create_table_if_not_exists(entity)
                        .await
                        .map_err(|e| ExecError::Prepare {
                            entity: entity.name.clone(),
                            source: e,
                        })?;
                }
                TableMode::Truncate => {
                    target
                        .create_table_if_not_exists(entity)
                        .await
                        .map_err(|e| ExecError::Prepare {
                            entity: entity.name.clone(),
                            source: e,
                        })?;
                    target
                        .truncate_table(&entity.target_table)
                        .await
                        .map_err(|e| ExecError::Prepare {
                            entity: entity.name.clone(),
                            source: e,
                        })?;
                }
                TableMode::Append => {}
            }

            let column_names: Vec<String> =
                entity.columns.iter().map(|c| c.name.clone()).collect();

            // FK columns read from earlier entities' streams and are not
            // recorded themselves.
            let mut fk_columns = vec![false; entity.columns.len()];
            for (idx, col) in entity.columns.iter().enumerate() {
                if col.generator.gen_type != "fk" {
                    continue;
                }
                let key = fk_key(col);
                if !entity_values.contains_key(&key) {
                    return Err(ExecError::MissingReference(key));
                }
                fk_columns[idx] = true;
            }

            let mut batch: Vec<Vec<Value>> = Vec::with_capacity(self.batch_size);

            for row_idx in 0..entity.rows {
                let mut row = Vec::with_capacity(entity.columns.len());
                for (col_idx, col) in entity.columns.iter().enumerate() {
                    let value = self
                        .generate_value(&mut rng, col, row_idx, &entity_values)
                        .map_err(|e| ExecError::Generate {
                            entity: entity.name.clone(),
                            column: col.name.clone(),
                            row: row_idx,
                            source: e,
                        })?;

                    if !fk_columns[col_idx] {
                        entity_values
                            .entry(format!("{}.{}", entity.name, col.name))
                            .or_default()
                            .push(value.clone());
                    }
                    row.push(value);
                }
                batch.push(row);

                if batch.len() >= self.batch_size {
                    self.flush(
                        target,
                        entity,
                        &column_names,
                        &mut batch,
                        progress,
                        entities_done,
                        entities_total,
                    )
                    .await?;
                }
            }

            if !batch.is_empty() {
                self.flush(
                    target,
                    entity,
                    &column_names,
                    &mut batch,
                    progress,
                    entities_done,
                    entities_total,
                )
                .await?;
            }

            stats.entity_stats.push(EntityRunStats {
                entity_name: entity.name.clone(),
                rows_generated: entity.rows,
                duration_seconds: started.elapsed().as_secs_f64(),
            });
            stats.total_rows += entity.rows;
            entities_done += 1;

            if let Some(sink) = progress {
                sink.on_event(ProgressEvent {
                    entity_name: entity.name.clone(),
                    entity_started: false,
                    entity_completed: true,
                    rows_delta: 0,
                    rows_total: entity.rows,
                    entities_done,
                    entities_total,
                })
                .await;
            }
        }

        stats.entities_generated = entities_total;
        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    async fn flush(
        &self,
        target: &mut dyn Target,
        entity: &Entity,
        column_names: &[String],
        batch: &mut Vec<Vec<Value>>,
        progress: Option<&dyn ProgressSink>,
        entities_done: i64,
        entities_total: i64,
    ) -> Result<(), ExecError> {
        let rows = std::mem::take(batch);
        let flushed = rows.len() as i64;
        target
            .insert_batch(entity, column_names, rows)
            .await
            .map_err(|e| ExecError::Insert {
                entity: entity.name.clone(),
                source: e,
            })?;

        if let Some(sink) = progress {
            sink.on_event(ProgressEvent {
                entity_name: entity.name.clone(),
                entity_started: false,
                entity_completed: false,
                rows_delta: flushed,
                rows_total: entity.rows,
                entities_done,
                entities_total,
            })
            .await;
        }
        Ok(())
    }

    fn generate_value(
        &self,
        rng: &mut ChaCha8Rng,
        col: &crate::domain::Column,
        row_index: i64,
        entity_values: &HashMap<String, Vec<Value>>,
    ) -> Result<Value, GeneratorError> {
        let gen = self.registry.get(&col.generator.gen_type)?;
        let ctx = GeneratorContext {
            row_index,
            entity_values,
        };
        gen.generate(rng, &col.generator, &ctx)
    }
}

fn fk_key(col: &crate::domain::Column) -> String {
    let entity = col
        .generator
        .params
        .get("entity")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let column = col
        .generator
        .params
        .get("column")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    format!("{entity}.{column}")
}

#[cfg(test)]
mod tests;
