//! Core interfaces.
//!
//! Traits at the seams of the system: target adapters, the control-plane
//! store, and scenario access. Implementations live in `targets/` and
//! `storage/`.

mod scenario_store;
mod store;
mod target;

pub use scenario_store::ScenarioStore;
pub use store::{RunStore, StoreError, TargetStore};
pub use target::{Target, TargetError};
