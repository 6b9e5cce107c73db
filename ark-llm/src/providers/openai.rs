//! The `openai` (and `custom`, `ollama`) provider adapter: plain OpenAI
//! chat-completions wire format, grounded in the request/response shape an
//! OpenAI-compatible local server speaks.

use crate::error::LlmError;
use crate::provider::ProviderAdapter;
use crate::types::{ChatMessage, ChatRole, FinishReason, LlmRequest, LlmResponse, ToolCall, ToolDescriptor};
use ark_core::TokenUsage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct OpenAiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model_name: String,
    extra_headers: Vec<(String, String)>,
    extra_query: Vec<(String, String)>,
    kind: &'static str,
}

impl OpenAiAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model_name: impl Into<String>,
        extra_headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(OpenAiAdapter {
            client,
            base_url: base_url.into(),
            api_key,
            model_name: model_name.into(),
            extra_headers,
            extra_query: Vec::new(),
            kind: "openai",
        })
    }

    /// Same wire format, different provider label (used for `ollama`/`custom`).
    pub fn with_kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    /// Query-string parameters appended to every request (Azure's
    /// `api-version`, for instance).
    pub fn with_extra_query(mut self, params: Vec<(String, String)>) -> Self {
        self.extra_query = params;
        self
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Clone)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

fn to_wire_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
        ChatRole::Tool => "tool",
    }
}

fn from_wire_role(role: &str) -> ChatRole {
    match role {
        "system" => ChatRole::System,
        "user" => ChatRole::User,
        "tool" => ChatRole::Tool,
        _ => ChatRole::Assistant,
    }
}

fn to_wire_message(m: &ChatMessage) -> WireMessage {
    let tool_calls = if m.tool_calls.is_empty() {
        None
    } else {
        Some(
            m.tool_calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    kind: "function".to_string(),
                    function: WireFunctionCall {
                        name: c.name.clone(),
                        arguments: c.arguments.to_string(),
                    },
                })
                .collect(),
        )
    };
    WireMessage {
        role: to_wire_role(m.role).to_string(),
        content: m.content.clone(),
        tool_calls,
        tool_call_id: m.tool_call_id.clone(),
    }
}

fn to_wire_tool(t: &ToolDescriptor) -> WireTool {
    WireTool {
        kind: "function",
        function: WireFunctionDef {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.parameters.clone(),
        },
    }
}

fn from_wire_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") => FinishReason::Stop,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let wire = WireRequest {
            model: &self.model_name,
            messages: request.messages.iter().map(to_wire_message).collect(),
            tools: request.tools.iter().map(to_wire_tool).collect(),
        };

        let mut req = self.client.post(format!("{}/chat/completions", self.base_url)).json(&wire);
        if !self.extra_query.is_empty() {
            req = req.query(&self.extra_query);
        }
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
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
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Fatal("provider returned no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                let arguments = serde_json::from_str(&c.function.arguments).unwrap_or(Value::String(c.function.arguments));
                ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments,
                }
            })
            .collect();

        let usage = wire.usage.unwrap_or_default();
        Ok(LlmResponse {
            message: ChatMessage {
                role: from_wire_role(&choice.message.role),
                content: choice.message.content,
                tool_calls,
                tool_call_id: None,
            },
            finish_reason: from_wire_finish_reason(choice.finish_reason.as_deref()),
            tokens: TokenUsage {
                prompt: usage.prompt_tokens,
                completion: usage.completion_tokens,
                total: usage.total_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn parses_final_assistant_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {"role": "assistant", "content": "4"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(server.uri(), None, "stub-echo", Vec::new(), Duration::from_secs(5)).unwrap();
        let response = adapter
            .invoke(&LlmRequest {
                messages: vec![ChatMessage::user("What is 2+2?")],
                tools: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.message.content, "4");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.tokens, TokenUsage { prompt: 5, completion: 1, total: 6 });
    }

    #[tokio::test]
    async fn parses_tool_call_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "add", "arguments": "{\"a\":2,\"b\":3}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(server.uri(), None, "stub", Vec::new(), Duration::from_secs(5)).unwrap();
        let response = adapter
            .invoke(&LlmRequest {
                messages: vec![ChatMessage::user("add 2 and 3")],
                tools: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].name, "add");
    }

    #[tokio::test]
    async fn classifies_5xx_as_transient_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = OpenAiAdapter::new(server.uri(), None, "stub", Vec::new(), Duration::from_secs(5)).unwrap();
        let err = adapter
            .invoke(&LlmRequest {
                messages: vec![ChatMessage::user("hi")],
                tools: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Transient(_)));
    }
}
