//! LLM-invocation errors, classified at the call site into transient vs.
//! fatal kinds (`ErrLLMTransient` vs `ErrLLMFatal`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transient provider error: {0}")]
    Transient(String),
    #[error("fatal provider error: {0}")]
    Fatal(String),
    #[error("request timed out")]
    Timeout,
    #[error("request canceled")]
    Canceled,
}

impl LlmError {
    /// 4xx other than 408/429 are fatal; 5xx, connection errors, 429 and 408
    /// are transient.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        if status >= 500 || status == 408 || status == 429 {
            LlmError::Transient(format!("HTTP {status}: {}", body.into()))
        } else {
            LlmError::Fatal(format!("HTTP {status}: {}", body.into()))
        }
    }

    /// Whether [`crate::invoker::Invoker`] should retry this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Transient(_) | LlmError::Timeout)
    }

    /// The `ErrLLMTransient`/`ErrLLMFatal` split persisted to `status.error`
    /// once retries are exhausted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LlmError::Fatal(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_connect() {
            LlmError::Transient(e.to_string())
        } else {
            LlmError::Fatal(e.to_string())
        }
    }
}
