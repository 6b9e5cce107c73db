//! Memory Gateway errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory service request failed: {0}")]
    Request(String),
    #[error("memory service returned status {0}: {1}")]
    Status(u16, String),
}

impl MemoryError {
    /// `ErrMemory` is retryable up to 3x with backoff.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(e: reqwest::Error) -> Self {
        MemoryError::Request(e.to_string())
    }
}
