//! The `anthropic` provider adapter: translates to/from the Anthropic
//! Messages API, which splits the system prompt out of the message list and
//! represents tool calls as typed content blocks rather than a `tool_calls`
//! array.

use crate::error::LlmError;
use crate::provider::ProviderAdapter;
use crate::types::{ChatMessage, ChatRole, FinishReason, LlmRequest, LlmResponse, ToolCall};
use ark_core::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_name: String,
    anthropic_version: String,
    extra_headers: Vec<(String, String)>,
}

impl AnthropicAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model_name: impl Into<String>,
        extra_headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(AnthropicAdapter {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_name: model_name.into(),
            anthropic_version: "2023-06-01".to_string(),
            extra_headers,
        })
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: Vec<WireBlock>,
}

#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Default max output tokens when the caller doesn't impose one. Anthropic's
/// Messages API requires `max_tokens`; OpenAI-shaped callers never set it.
const DEFAULT_MAX_TOKENS: u32 = 4096;

fn to_wire_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage>) {
    let mut system = None;
    let mut wire = Vec::new();
    for m in messages {
        match m.role {
            ChatRole::System => system = Some(m.content.clone()),
            ChatRole::User => wire.push(WireMessage {
                role: "user".to_string(),
                content: vec![WireBlock::Text { text: m.content.clone() }],
            }),
            ChatRole::Assistant => {
                let mut content = Vec::new();
                if !m.content.is_empty() {
                    content.push(WireBlock::Text { text: m.content.clone() });
                }
                for call in &m.tool_calls {
                    content.push(WireBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                wire.push(WireMessage { role: "assistant".to_string(), content });
            }
            ChatRole::Tool => wire.push(WireMessage {
                role: "user".to_string(),
                content: vec![WireBlock::ToolResult {
                    tool_use_id: m.tool_call_id.clone().unwrap_or_default(),
                    content: m.content.clone(),
                }],
            }),
        }
    }
    (system, wire)
}

fn from_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> &'static str {
        "anthropic"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let (system, messages) = to_wire_messages(&request.messages);
        let wire = WireRequest {
            model: &self.model_name,
            system: system.as_deref(),
            messages,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: request
                .tools
                .iter()
                .map(|t| WireTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.parameters.clone(),
                })
                .collect(),
        };

        let mut req = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.anthropic_version)
            .json(&wire);
        for (name, value) in &self.extra_headers {
            req = req.header(name, value);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let wire: WireResponse = response.json().await.map_err(|e| LlmError::Fatal(format!("invalid response body: {e}")))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in wire.content {
            match block {
                WireBlock::Text { text } => content.push_str(&text),
                WireBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall { id, name, arguments: input }),
                WireBlock::ToolResult { .. } => {}
            }
        }

        Ok(LlmResponse {
            message: ChatMessage {
                role: ChatRole::Assistant,
                content,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason: from_stop_reason(wire.stop_reason.as_deref()),
            tokens: TokenUsage {
                prompt: wire.usage.input_tokens,
                completion: wire.usage.output_tokens,
                total: wire.usage.input_tokens + wire.usage.output_tokens,
            },
        })
    }
}
