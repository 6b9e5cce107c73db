//! The A2A task mirror and remote-state mapping.

use crate::memory::Message;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of remote A2A task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RemoteState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    AuthRequired,
    #[serde(other)]
    Unknown,
}

/// The local phase a remote state maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MirrorPhase {
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl MirrorPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, MirrorPhase::Completed | MirrorPhase::Failed | MirrorPhase::Cancelled)
    }
}

/// Map a remote `state` to a local `phase`.
///
/// `input-required` and `auth-required` keep polling by design (external
/// resolution) rather than being treated as terminal.
pub fn map_remote_state(state: RemoteState) -> MirrorPhase {
    match state {
        RemoteState::Submitted => MirrorPhase::Assigned,
        RemoteState::Working => MirrorPhase::Running,
        RemoteState::Completed => MirrorPhase::Completed,
        RemoteState::Failed | RemoteState::Rejected => MirrorPhase::Failed,
        RemoteState::Canceled => MirrorPhase::Cancelled,
        RemoteState::InputRequired | RemoteState::AuthRequired => MirrorPhase::Running,
        RemoteState::Unknown => MirrorPhase::Running,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTaskStatus {
    pub state: RemoteState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parts: Vec<crate::memory::Part>,
}

/// The on-wire A2A `Task` object, used both as the JSON-RPC
/// response shape and as the payload converted into [`A2ATaskStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub status: RemoteTaskStatus,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// The local mirror of a remote A2A task. `artifacts`/`history` are
/// monotone: entries accumulate and are never removed, even across polls.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "A2ATaskMirror",
    namespaced,
    status = "A2ATaskMirrorStatus",
    shortname = "a2at"
)]
#[serde(rename_all = "camelCase")]
pub struct A2ATaskMirrorSpec {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub agent_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct A2ATaskMirrorStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<MirrorPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_state: Option<RemoteState>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_terminal_states() {
        assert_eq!(map_remote_state(RemoteState::Completed), MirrorPhase::Completed);
        assert_eq!(map_remote_state(RemoteState::Failed), MirrorPhase::Failed);
        assert_eq!(map_remote_state(RemoteState::Rejected), MirrorPhase::Failed);
        assert_eq!(map_remote_state(RemoteState::Canceled), MirrorPhase::Cancelled);
        assert!(MirrorPhase::Completed.is_terminal());
        assert!(MirrorPhase::Failed.is_terminal());
    }

    #[test]
    fn input_required_keeps_polling() {
        assert_eq!(map_remote_state(RemoteState::InputRequired), MirrorPhase::Running);
        assert_eq!(map_remote_state(RemoteState::AuthRequired), MirrorPhase::Running);
        assert!(!MirrorPhase::Running.is_terminal());
    }
}
