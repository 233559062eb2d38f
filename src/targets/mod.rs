//! Target adapters.
//!
//! One adapter per supported store kind, plus an in-memory capture adapter
//! for tests and dry runs. Adapters interpolate only validator-proven
//! identifiers into statements; row values are always bound.

mod elasticsearch;
mod memory;
mod postgres;
mod sqlite;

pub use elasticsearch::ElasticsearchTarget;
pub use memory::MemoryTarget;
pub use postgres::PostgresTarget;
pub use sqlite::SqliteTarget;

use crate::domain::{TargetConfig, TargetKind};
use crate::interfaces::Target;

/// Build the adapter for a target configuration.
pub fn for_config(config: &TargetConfig) -> Box<dyn Target> {
    match config.kind {
        TargetKind::Postgres => Box::new(PostgresTarget::new(
            &config.dsn,
            config.schema.as_deref().unwrap_or("public"),
        )),
        TargetKind::Sqlite => Box::new(SqliteTarget::new(&config.dsn)),
        TargetKind::Elasticsearch => Box::new(ElasticsearchTarget::new(&config.dsn)),
    }
}
