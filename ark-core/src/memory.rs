//! Memory handle and conversation message types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRef {
    pub service: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Agent,
    Tool,
}

/// One piece of message content; mirrors the A2A wire parts so the
/// same type serves local history and the A2A history mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    File { uri: String, mime_type: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub metadata: MessageMetadata,
    /// Total order assigned by the Memory Gateway.
    pub sequence: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>, sequence: u64, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Message {
            role,
            parts: vec![Part::Text { text: text.into() }],
            metadata: MessageMetadata::default(),
            sequence,
            timestamp,
        }
    }

    /// The concatenated text content, used when feeding the LLM invoker or
    /// matching the "system message once per agent" rule.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
