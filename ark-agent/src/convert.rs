//! Conversion between ark-core's durable [`Message`] history and ark-llm's
//! wire-facing [`ChatMessage`]. The A2A wire's `Part` kinds
//! (text/data/file) have no dedicated tool-call kind, so an
//! assistant turn that issued tool calls carries them as a `Part::Data` part
//! shaped `{"toolCalls": [...]}` rather than growing the shared type for one
//! LLM-internal concept.

use ark_core::{Message, MessageMetadata, Part, Role};
use ark_llm::{ChatMessage, ChatRole, ToolCall};
use chrono::Utc;
use serde_json::json;

pub fn system_message(text: impl Into<String>) -> Message {
    Message {
        role: Role::System,
        parts: vec![Part::Text { text: text.into() }],
        metadata: MessageMetadata::default(),
        sequence: 0,
        timestamp: Utc::now(),
    }
}

pub fn user_message(text: impl Into<String>) -> Message {
    Message {
        role: Role::User,
        parts: vec![Part::Text { text: text.into() }],
        metadata: MessageMetadata::default(),
        sequence: 0,
        timestamp: Utc::now(),
    }
}

/// An agent turn, possibly carrying the tool calls the LLM asked for
/// alongside (or instead of) text content.
pub fn assistant_message(content: impl Into<String>, tool_calls: &[ToolCall]) -> Message {
    let content = content.into();
    let mut parts = Vec::new();
    if !content.is_empty() {
        parts.push(Part::Text { text: content });
    }
    if !tool_calls.is_empty() {
        parts.push(Part::Data { data: json!({ "toolCalls": tool_calls }) });
    }
    Message {
        role: Role::Agent,
        parts,
        metadata: MessageMetadata::default(),
        sequence: 0,
        timestamp: Utc::now(),
    }
}

pub fn tool_result_message(tool_call_id: impl Into<String>, text: impl Into<String>) -> Message {
    Message {
        role: Role::Tool,
        parts: vec![Part::Text { text: text.into() }],
        metadata: MessageMetadata { agent_name: None, tool_call_id: Some(tool_call_id.into()) },
        sequence: 0,
        timestamp: Utc::now(),
    }
}

pub fn to_chat_message(message: &Message) -> ChatMessage {
    match message.role {
        Role::System => ChatMessage::system(message.text_content()),
        Role::User => ChatMessage::user(message.text_content()),
        Role::Tool => {
            let tool_call_id = message.metadata.tool_call_id.clone().unwrap_or_default();
            ChatMessage::tool_result(tool_call_id, message.text_content())
        }
        Role::Agent => ChatMessage {
            role: ChatRole::Assistant,
            content: message.text_content(),
            tool_calls: extract_tool_calls(message),
            tool_call_id: None,
        },
    }
}

fn extract_tool_calls(message: &Message) -> Vec<ToolCall> {
    message
        .parts
        .iter()
        .find_map(|part| match part {
            Part::Data { data } => data.get("toolCalls").and_then(|v| serde_json::from_value(v.clone()).ok()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tool_calls_through_a_data_part() {
        let calls = vec![ToolCall { id: "1".to_string(), name: "add".to_string(), arguments: json!({"a": 1}) }];
        let message = assistant_message("", &calls);
        let chat = to_chat_message(&message);
        assert_eq!(chat.role, ChatRole::Assistant);
        assert_eq!(chat.content, "");
        assert_eq!(chat.tool_calls, calls);
    }

    #[test]
    fn assistant_message_with_no_tool_calls_has_only_a_text_part() {
        let message = assistant_message("hello", &[]);
        assert_eq!(message.parts.len(), 1);
        assert!(matches!(message.parts[0], Part::Text { .. }));
    }

    #[test]
    fn tool_message_carries_the_call_id_in_metadata() {
        let message = tool_result_message("call-1", "42");
        let chat = to_chat_message(&message);
        assert_eq!(chat.role, ChatRole::Tool);
        assert_eq!(chat.tool_call_id, Some("call-1".to_string()));
        assert_eq!(chat.content, "42");
    }
}
