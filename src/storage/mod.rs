//! Control-plane persistence.
//!
//! Two real backends apply the same logical migrations: an embedded SQLite
//! database and a networked PostgreSQL database. The in-memory store backs
//! tests and embedded use. Timestamps are UTC; JSON-valued columns hold
//! canonical serializations of the corresponding in-memory values.

pub mod memory;
mod postgres;
mod schema;
mod sqlite;

pub use memory::{MemoryControlStore, MemoryScenarioStore};
pub use postgres::PostgresControlStore;
pub use sqlite::SqliteControlStore;
