//! The on-wire A2A JSON-RPC 2.0 shapes, kept separate from
//! `ark_core`'s domain types the same way `ark-memory`'s `types::WireMessage`
//! is kept separate from `ark_core::Message` — the wire format and the
//! local representation evolve independently.

use ark_core::{Artifact, Message, MessageMetadata, Part, RemoteState, RemoteTask, RemoteTaskStatus, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum WirePart {
    Text { text: String },
    Data { data: Value },
    File {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text { text } => WirePart::Text { text: text.clone() },
            Part::Data { data } => WirePart::Data { data: data.clone() },
            Part::File { uri, mime_type } => WirePart::File { uri: uri.clone(), mime_type: mime_type.clone() },
        }
    }
}

impl From<WirePart> for Part {
    fn from(part: WirePart) -> Self {
        match part {
            WirePart::Text { text } => Part::Text { text },
            WirePart::Data { data } => Part::Data { data },
            WirePart::File { uri, mime_type } => Part::File { uri, mime_type },
        }
    }
}

/// Outbound `message/send` params.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    pub message: OutboundMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub message_id: String,
    pub role: &'static str,
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusParams {
    pub task_id: String,
    pub history_length: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCancelParams {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTaskStatus {
    pub state: RemoteState,
    #[serde(default)]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireArtifact {
    pub artifact_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<WirePart>,
}

/// The on-wire `Task` object . History messages carry no sequence
/// number of their own on the wire — [`crate::merge`] assigns one as it
/// appends each newly-seen message to the mirror.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    pub id: String,
    #[serde(default)]
    pub context_id: Option<String>,
    pub status: WireTaskStatus,
    #[serde(default)]
    pub artifacts: Vec<WireArtifact>,
    #[serde(default)]
    pub history: Vec<WireMessage>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Converts the wire `Task` into the domain [`RemoteTask`] shape `ark-core`
/// already defines for the local mirror's merge input. History messages get
/// `sequence = 0` and the task's own status timestamp — [`crate::merge`]
/// overwrites both as it assigns real ordering.
pub fn into_remote_task(wire: WireTask) -> RemoteTask {
    let timestamp = wire.status.timestamp;
    RemoteTask {
        id: wire.id,
        context_id: wire.context_id,
        status: RemoteTaskStatus { state: wire.status.state, message: wire.status.message, timestamp },
        artifacts: wire
            .artifacts
            .into_iter()
            .map(|a| Artifact {
                artifact_id: a.artifact_id,
                name: a.name,
                description: a.description,
                parts: a.parts.into_iter().map(Part::from).collect(),
            })
            .collect(),
        history: wire
            .history
            .into_iter()
            .map(|m| Message {
                role: m.role,
                parts: m.parts.into_iter().map(Part::from).collect(),
                metadata: MessageMetadata::default(),
                sequence: 0,
                timestamp,
            })
            .collect(),
        metadata: wire.metadata,
    }
}
