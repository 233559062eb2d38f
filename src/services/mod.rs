//! Service orchestration.

mod run_service;
mod target_check;
mod target_dsn;

pub use run_service::RunService;
pub use target_check::check_target;
pub use target_dsn::{resolve_target_for_run, with_postgres_database};
