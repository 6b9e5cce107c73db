//! The `Query` CRD — the top-level unit of work.

use crate::params::Parameter;
use crate::target::Target;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Running,
    Evaluating,
    Done,
    Error,
    Canceled,
    Unknown,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Error | Phase::Canceled)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt += other.prompt;
        self.completion += other.completion;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub target: Target,
    pub content: String,
    #[serde(default)]
    pub token_usage: TokenUsage,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Query",
    namespaced,
    status = "QueryStatus",
    shortname = "qry",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub input: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    pub targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_ref: Option<crate::memory::MemoryRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default)]
    pub evaluators_labels: std::collections::BTreeMap<String, String>,
    /// ISO-8601 duration; defaults to 5m at the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryEvent {
    pub reason: String,
    pub message: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryStatus {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub token_usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<crate::error::StatusError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Targets after selector expansion.
    #[serde(default)]
    pub resolved_targets: Vec<Target>,
    #[serde(default)]
    pub events: Vec<QueryEvent>,
    /// Retry attempts consumed so far against the retry budget.
    #[serde(default)]
    pub retry_count: u32,
}

impl Default for QueryStatus {
    fn default() -> Self {
        QueryStatus {
            phase: Phase::default(),
            started_at: None,
            completed_at: None,
            responses: Vec::new(),
            token_usage: TokenUsage::default(),
            error: None,
            cancellation_reason: None,
            resolved_targets: Vec::new(),
            events: Vec::new(),
            retry_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Error.is_terminal());
        assert!(Phase::Canceled.is_terminal());
        assert!(!Phase::Pending.is_terminal());
        assert!(!Phase::Running.is_terminal());
        assert!(!Phase::Evaluating.is_terminal());
    }

    #[test]
    fn token_usage_aggregates() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage {
            prompt: 5,
            completion: 1,
            total: 6,
        });
        total.add(&TokenUsage {
            prompt: 2,
            completion: 3,
            total: 5,
        });
        assert_eq!(total, TokenUsage {
            prompt: 7,
            completion: 4,
            total: 11,
        });
    }
}
