//! Errors a reconcile pass can surface to `kube_runtime::Controller`.

use ark_core::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("kube API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("object is missing {0}")]
    MissingObjectKey(&'static str),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("status patch exhausted its conflict-retry budget for {0}")]
    StatusConflictRetriesExhausted(String),
}
