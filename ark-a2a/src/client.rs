//! A thin JSON-RPC 2.0 client for the A2A wire protocol: one HTTP
//! endpoint per agent server, method dispatched through the request body.

use crate::error::A2aError;
use crate::wire::{OutboundMessage, SendMessageParams, TaskCancelParams, TaskStatusParams, WirePart, WireTask};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// `task/status` asks the remote for this many trailing history entries
const HISTORY_LENGTH: u32 = 100;

pub struct A2aClient {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl Default for A2aClient {
    fn default() -> Self {
        A2aClient::new()
    }
}

impl A2aClient {
    pub fn new() -> Self {
        A2aClient { http: reqwest::Client::new(), next_id: AtomicU64::new(1) }
    }

    /// `message/send`: submits `input` as the sole
    /// text part of a new user message, returning the created task.
    pub async fn send_message(
        &self,
        agent_address: &str,
        message_id: impl Into<String>,
        input: &str,
        callback_url: Option<String>,
        headers: &[(String, String)],
    ) -> Result<WireTask, A2aError> {
        let params = SendMessageParams {
            message: OutboundMessage {
                message_id: message_id.into(),
                role: "user",
                parts: vec![WirePart::Text { text: input.to_string() }],
            },
            callback_url,
        };
        self.call(agent_address, "message/send", params, headers).await
    }

    /// `task/status`.
    pub async fn task_status(&self, agent_address: &str, task_id: &str, headers: &[(String, String)]) -> Result<WireTask, A2aError> {
        let params = TaskStatusParams { task_id: task_id.to_string(), history_length: HISTORY_LENGTH };
        self.call(agent_address, "task/status", params, headers).await
    }

    /// `task/cancel`.
    pub async fn task_cancel(&self, agent_address: &str, task_id: &str, headers: &[(String, String)]) -> Result<WireTask, A2aError> {
        let params = TaskCancelParams { task_id: task_id.to_string() };
        self.call(agent_address, "task/cancel", params, headers).await
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        agent_address: &str,
        method: &str,
        params: P,
        headers: &[(String, String)],
    ) -> Result<R, A2aError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(agent_address).json(&body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(A2aError::Status(status.as_u16(), text));
        }

        let envelope: RpcEnvelope<R> = response.json().await.map_err(|e| A2aError::Protocol(e.to_string()))?;
        match envelope {
            RpcEnvelope { result: Some(result), error: None } => Ok(result),
            RpcEnvelope { error: Some(error), .. } => {
                Err(A2aError::Protocol(format!("{} ({})", error.message, error.code)))
            }
            RpcEnvelope { result: None, error: None } => Err(A2aError::Protocol("empty JSON-RPC response".to_string())),
        }
    }
}

#[derive(serde::Deserialize)]
struct RpcEnvelope<R> {
    #[serde(default)]
    result: Option<R>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(serde::Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}
