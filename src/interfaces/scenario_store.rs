//! Scenario access interface.
//!
//! Scenarios are authored externally and read-only at runtime; the service
//! only needs lookup and listing. File loading is a collaborator outside
//! this crate.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::Scenario;

#[async_trait]
pub trait ScenarioStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Scenario, StoreError>;

    async fn list(&self) -> Result<Vec<Scenario>, StoreError>;
}
