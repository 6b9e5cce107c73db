//! A2A Task Reconciler errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum A2aError {
    #[error("request to A2A server failed: {0}")]
    Transport(String),
    #[error("A2A server returned status {0}: {1}")]
    Status(u16, String),
    /// Malformed task object or unknown JSON-RPC error.
    #[error("A2A protocol error: {0}")]
    Protocol(String),
    #[error("canceled")]
    Canceled,
}

impl From<reqwest::Error> for A2aError {
    fn from(e: reqwest::Error) -> Self {
        A2aError::Transport(e.to_string())
    }
}
