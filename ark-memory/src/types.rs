//! Wire types for the memory service HTTP API.

use ark_core::{Part, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    pub role: Role,
    pub parts: Vec<Part>,
}

/// One row of `GET /v1/sessions/{sid}/messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
    pub memory_name: String,
    pub session_id: String,
    pub query_id: String,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub message: WireMessage,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesResponse {
    pub items: Vec<MessageItem>,
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsResponse {
    pub items: Vec<String>,
}

/// A message queued for `POST /v1/sessions/{sid}/messages`. `client_message_id`
/// is the idempotency key the backend dedupes on, keyed by `(queryId,
/// clientMessageId)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutMessage {
    pub client_message_id: String,
    pub role: Role,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutMessagesRequest {
    pub query_id: String,
    pub messages: Vec<PutMessage>,
}

#[derive(Debug, Default, Clone)]
pub struct MessageFilter {
    pub memory: Option<String>,
    pub session: Option<String>,
    pub query: Option<String>,
}

impl MessageFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(m) = &self.memory {
            pairs.push(("memory", m.clone()));
        }
        if let Some(s) = &self.session {
            pairs.push(("session", s.clone()));
        }
        if let Some(q) = &self.query {
            pairs.push(("query", q.clone()));
        }
        pairs
    }
}
