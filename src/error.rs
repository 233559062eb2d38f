//! Service-level error kinds.

use thiserror::Error;

use crate::interfaces::StoreError;
use crate::validation::ValidationError;

/// Errors surfaced by the run control plane.
///
/// Synchronous calls (`start_run`, `plan_run`, `test_target`, CRUD) return
/// these directly; failures after a run is dispatched are reported through
/// the run's status instead.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("plan infeasible: {0}")]
    PlanInfeasible(String),

    #[error("target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::CyclicDependencies => ServiceError::PlanInfeasible(err.to_string()),
            other => ServiceError::InvalidRequest(other.to_string()),
        }
    }
}
