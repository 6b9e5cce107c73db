//! The Memory Gateway: reads/writes session messages and
//! enforces the "system message once per agent per session" rule on writes.

use crate::client::MemoryClient;
use crate::error::MemoryError;
use crate::types::{MessageFilter, MessageItem, PutMessage};
use ark_core::{Message, MessageMetadata, Role};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;

/// `ErrMemory` retries up to 3x with backoff before surfacing; the
/// same 1s/2s/4s schedule as the LLM Invoker, reused here rather than
/// inventing a second backoff shape for the same kind of transient failure.
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;

pub struct MemoryGateway {
    client: MemoryClient,
}

impl MemoryGateway {
    pub fn new(client: MemoryClient) -> Self {
        MemoryGateway { client }
    }

    /// `getMessages(sessionId, filter) -> Message[]` ordered by `sequence`.
    pub async fn get_messages(&self, session_id: &str, filter: &MessageFilter) -> Result<Vec<Message>, MemoryError> {
        let mut items = with_retry(|| self.client.get_messages(session_id, filter)).await?;
        items.sort_by_key(|i| i.sequence);
        Ok(items.into_iter().map(to_message).collect())
    }

    /// `putMessages(sessionId, queryId, messages[])`. Filters out
    /// a system message whose text duplicates one already present for this
    /// session before sending, then retries the whole batch atomically on
    /// failure — safe because the backend dedupes by `(queryId,
    /// clientMessageId)` and `clientMessageId` is derived deterministically
    /// from content, so a retried batch is idempotent.
    pub async fn put_messages(&self, session_id: &str, query_id: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let existing_system_texts = if messages.iter().any(|m| m.role == Role::System) {
            self.existing_system_texts(session_id).await?
        } else {
            Vec::new()
        };

        let to_send: Vec<PutMessage> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| !(m.role == Role::System && existing_system_texts.contains(&m.text_content())))
            .map(|(index, m)| PutMessage {
                client_message_id: client_message_id(query_id, index, m),
                role: m.role,
                parts: m.parts.clone(),
            })
            .collect();

        if to_send.is_empty() {
            return Ok(());
        }

        with_retry(|| self.client.put_messages(session_id, query_id, to_send.clone())).await
    }

    async fn existing_system_texts(&self, session_id: &str) -> Result<Vec<String>, MemoryError> {
        Ok(self
            .get_messages(session_id, &MessageFilter::default())
            .await?
            .into_iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text_content())
            .collect())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), MemoryError> {
        with_retry(|| self.client.delete_session(session_id)).await
    }

    pub async fn delete_query_messages(&self, session_id: &str, query_id: &str) -> Result<(), MemoryError> {
        with_retry(|| self.client.delete_query_messages(session_id, query_id)).await
    }

    pub async fn reset_all(&self) -> Result<(), MemoryError> {
        with_retry(|| self.client.reset_all()).await
    }
}

fn to_message(item: MessageItem) -> Message {
    Message {
        role: item.message.role,
        parts: item.message.parts,
        metadata: MessageMetadata::default(),
        sequence: item.sequence,
        timestamp: item.timestamp,
    }
}

/// Deterministic so a retried batch sends the same idempotency key.
fn client_message_id(query_id: &str, index: usize, message: &Message) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update([message.role as u8]);
    hasher.update(message.text_content().as_bytes());
    format!("{:x}", hasher.finalize())
}

async fn with_retry<F, Fut, T>(mut op: F) -> Result<T, MemoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MemoryError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < MAX_RETRIES => {
                attempt += 1;
                tokio::time::sleep(backoff_delay(attempt - 1)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_core::Part;
    use chrono::Utc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base_url: String) -> MemoryGateway {
        MemoryGateway::new(MemoryClient::new(base_url).unwrap())
    }

    fn msg(role: Role, text: &str) -> Message {
        Message {
            role,
            parts: vec![Part::Text { text: text.to_string() }],
            metadata: MessageMetadata::default(),
            sequence: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_messages_sorts_by_sequence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"memoryName": "m", "sessionId": "s1", "queryId": "q2", "sequence": 2, "timestamp": "2026-01-01T00:00:02Z",
                     "message": {"role": "user", "parts": [{"kind": "text", "text": "second"}]}},
                    {"memoryName": "m", "sessionId": "s1", "queryId": "q1", "sequence": 1, "timestamp": "2026-01-01T00:00:01Z",
                     "message": {"role": "system", "parts": [{"kind": "text", "text": "first"}]}}
                ]
            })))
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let messages = gw.get_messages("s1", &MessageFilter::default()).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sequence, 1);
        assert_eq!(messages[1].sequence, 2);
    }

    #[tokio::test]
    async fn skips_duplicate_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"memoryName": "m", "sessionId": "s1", "queryId": "q0", "sequence": 1, "timestamp": "2026-01-01T00:00:00Z",
                     "message": {"role": "system", "parts": [{"kind": "text", "text": "You are a calculator"}]}}
                ]
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/sessions/s1/messages"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = req.body_json().unwrap();
                let messages = body["messages"].as_array().unwrap();
                assert_eq!(messages.len(), 1, "duplicate system message must be filtered before sending");
                assert_eq!(messages[0]["role"], "user");
                ResponseTemplate::new(200)
            })
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let messages = vec![msg(Role::System, "You are a calculator"), msg(Role::User, "2+2?")];
        gw.put_messages("s1", "q1", messages).await.unwrap();
    }

    #[tokio::test]
    async fn writes_first_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions/s1/messages"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = req.body_json().unwrap();
                assert_eq!(body["messages"].as_array().unwrap().len(), 2);
                ResponseTemplate::new(200)
            })
            .mount(&server)
            .await;

        let gw = gateway(server.uri());
        let messages = vec![msg(Role::System, "You are a calculator"), msg(Role::User, "2+2?")];
        gw.put_messages("s1", "q1", messages).await.unwrap();
    }

    #[test]
    fn client_message_id_is_deterministic() {
        let m = msg(Role::User, "hello");
        let a = client_message_id("q1", 0, &m);
        let b = client_message_id("q1", 0, &m);
        assert_eq!(a, b);
        let c = client_message_id("q1", 1, &m);
        assert_ne!(a, c);
    }
}
