//! The error taxonomy surfaced on `Query.status.error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A local error kind, stable across the engine, persisted as `status.error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub enum ErrorKind {
    Resolve,
    Template,
    LlmTransient,
    LlmFatal,
    ToolFailed,
    ToolSchema,
    A2aProtocol,
    AgentLoopLimit,
    AgentAbort,
    Timeout,
    Canceled,
    Memory,
}

impl ErrorKind {
    /// Whether the Query Reconciler should requeue with backoff rather than
    /// transition straight to `error`.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::LlmTransient | ErrorKind::ToolFailed | ErrorKind::Memory)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Resolve => "ErrResolve",
            ErrorKind::Template => "ErrTemplate",
            ErrorKind::LlmTransient => "ErrLLMTransient",
            ErrorKind::LlmFatal => "ErrLLMFatal",
            ErrorKind::ToolFailed => "ErrToolFailed",
            ErrorKind::ToolSchema => "ErrToolSchema",
            ErrorKind::A2aProtocol => "ErrA2AProtocol",
            ErrorKind::AgentLoopLimit => "ErrAgentLoopLimit",
            ErrorKind::AgentAbort => "ErrAgentAbort",
            ErrorKind::Timeout => "ErrTimeout",
            ErrorKind::Canceled => "ErrCanceled",
            ErrorKind::Memory => "ErrMemory",
        };
        f.write_str(s)
    }
}

/// The persisted, already-redacted form of an engine error (`status.error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StatusError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl StatusError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = redact_secrets(&message.into());
        StatusError {
            kind,
            retryable: kind.retryable(),
            message,
        }
    }
}

/// Strip anything that looks like a bearer token, API key, or `key=value` secret
/// from an error message before it is ever persisted to `status.error`.
///
/// Mirrors the shape of secret redaction elsewhere in the platform: this is a
/// best-effort textual scrub, not a guarantee against operator error upstream.
pub fn redact_secrets(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for line in input.split_inclusive('\n') {
        out.push_str(&redact_line(line));
    }
    out
}

fn redact_line(line: &str) -> String {
    const MARKERS: &[&str] = &["apikey", "api_key", "authorization", "bearer", "secret", "token", "password"];
    let lower = line.to_ascii_lowercase();
    if MARKERS.iter().any(|m| lower.contains(m)) {
        if let Some(idx) = line.find([':', '=']) {
            let (prefix, _) = line.split_at(idx + 1);
            return format!("{prefix} [REDACTED]");
        }
        return "[REDACTED]".to_string();
    }
    line.to_string()
}

/// The top-level engine error, used internally before being downgraded to a
/// [`StatusError`] by the Query Reconciler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind}: {message}")]
    Classified { kind: ErrorKind, message: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        EngineError::Classified {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Classified { kind, .. } => *kind,
            EngineError::Other(_) => ErrorKind::Resolve,
        }
    }

    pub fn into_status(self) -> StatusError {
        match self {
            EngineError::Classified { kind, message } => StatusError::new(kind, message),
            EngineError::Other(e) => StatusError::new(ErrorKind::Resolve, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_bearer_tokens() {
        let msg = "request failed: Authorization: Bearer sk-abcdef1234567890";
        let redacted = redact_secrets(msg);
        assert!(!redacted.contains("sk-abcdef1234567890"));
        assert!(redacted.contains("[REDACTED]"));
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let msg = "connection refused to host 10.0.0.1:443";
        assert_eq!(redact_secrets(msg), msg);
    }

    #[test]
    fn retryable_matches_taxonomy() {
        assert!(ErrorKind::LlmTransient.retryable());
        assert!(ErrorKind::ToolFailed.retryable());
        assert!(ErrorKind::Memory.retryable());
        assert!(!ErrorKind::Resolve.retryable());
        assert!(!ErrorKind::Template.retryable());
        assert!(!ErrorKind::Timeout.retryable());
    }

    #[test]
    fn status_error_is_redacted_on_construction() {
        let err = StatusError::new(ErrorKind::Resolve, "secret: sk-live-12345");
        assert!(!err.message.contains("sk-live-12345"));
    }
}
