//! Tool Executor errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool call failed (status {status:?}): {message}")]
    Failed { status: Option<u16>, message: String },
    #[error("argument schema violation: {0}")]
    Schema(String),
    #[error("tool call timed out")]
    Timeout,
    #[error("tool call canceled")]
    Canceled,
}

impl ToolError {
    /// `ErrToolFailed` is retryable up to 2x; schema violations
    /// never are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Failed { .. } | ToolError::Timeout)
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ToolError::Timeout
        } else {
            ToolError::Failed { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
        }
    }
}
