//! The Agent Runner: drives one agent's system/user/tool-call
//! loop to completion, independent of how it's invoked — directly by the
//! Query Reconciler for a single-agent target, or once per turn inside the
//! Team Strategist.

use crate::convert::{assistant_message, system_message, to_chat_message, tool_result_message, user_message};
use ark_core::{EngineError, ErrorKind, Message, Role, TokenUsage};
use ark_llm::{ChatMessage, Invoker, LlmError, LlmRequest, ToolCall, ToolDescriptor};
use ark_telemetry::Telemetry;
use ark_tools::{ResolvedTool, ToolError, ToolExecutor};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// Iterations are capped to guard against an LLM stuck calling tools forever
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Tool calls within one LLM turn fan out at most this many at a time, with
/// results appended in the LLM's original call order rather than completion
/// order.
const MAX_PARALLEL_TOOL_CALLS: usize = 4;

/// A tool the agent may call, paired with its already-`valueFrom`-resolved
/// dispatch info.
pub struct ToolBinding {
    pub name: String,
    pub description: String,
    pub resolved: ResolvedTool,
}

pub struct AgentRunRequest<'a> {
    pub agent_prompt: &'a str,
    pub input: &'a str,
    /// Prior turns for this agent in this session, already loaded by the
    /// caller from the Memory Gateway — the Agent Runner never
    /// talks to memory itself.
    pub history: &'a [Message],
    pub tools: &'a [ToolBinding],
    /// 0 selects [`DEFAULT_MAX_ITERATIONS`].
    pub max_iterations: u32,
}

pub struct AgentRunOutcome {
    pub final_message: Message,
    /// Every message produced by this run, in order: the system message (if
    /// newly included), the user message, and each assistant/tool turn —
    /// everything the caller needs to persist via the Memory Gateway.
    pub new_messages: Vec<Message>,
    pub tokens: TokenUsage,
}

pub struct AgentRunner;

impl AgentRunner {
    /// Run to a final assistant message or `ErrAgentLoopLimit`.
    /// The system message is included only if no prior message in `history`
    /// is a `System` message with identical text.
    pub async fn run(
        invoker: &Invoker<'_>,
        executor: &ToolExecutor,
        request: AgentRunRequest<'_>,
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<AgentRunOutcome, EngineError> {
        let max_iterations = if request.max_iterations == 0 { DEFAULT_MAX_ITERATIONS } else { request.max_iterations };

        let include_system = !request
            .history
            .iter()
            .any(|m| m.role == Role::System && m.text_content() == request.agent_prompt);

        let mut chat_messages: Vec<ChatMessage> = Vec::new();
        let mut new_messages: Vec<Message> = Vec::new();

        if include_system {
            chat_messages.push(ChatMessage::system(request.agent_prompt));
            new_messages.push(system_message(request.agent_prompt));
        }
        chat_messages.extend(request.history.iter().map(to_chat_message));
        chat_messages.push(ChatMessage::user(request.input));
        new_messages.push(user_message(request.input));

        let tool_descriptors: Vec<ToolDescriptor> = request
            .tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.resolved.input_schema().cloned().unwrap_or_else(|| serde_json::json!({})),
            })
            .collect();

        let mut tokens = TokenUsage::default();

        for _ in 0..max_iterations {
            let llm_request = LlmRequest { messages: chat_messages.clone(), tools: tool_descriptors.clone() };
            let response = invoker.call(&llm_request, telemetry, cancel).await.map_err(map_llm_error)?;
            tokens.add(&response.tokens);

            if response.message.tool_calls.is_empty() {
                let final_message = assistant_message(response.message.content.clone(), &[]);
                new_messages.push(final_message.clone());
                return Ok(AgentRunOutcome { final_message, new_messages, tokens });
            }

            new_messages.push(assistant_message(response.message.content.clone(), &response.message.tool_calls));
            chat_messages.push(response.message.clone());

            let mut results = Vec::with_capacity(response.message.tool_calls.len());
            for chunk in response.message.tool_calls.chunks(MAX_PARALLEL_TOOL_CALLS) {
                let futs = chunk.iter().map(|call| dispatch_one(request.tools, executor, call, telemetry, cancel));
                results.extend(join_all(futs).await);
            }

            for (call, result) in response.message.tool_calls.iter().zip(results.into_iter()) {
                let text = result.map_err(map_tool_error)?;
                new_messages.push(tool_result_message(call.id.clone(), text.clone()));
                chat_messages.push(ChatMessage::tool_result(call.id.clone(), text));
            }
        }

        Err(EngineError::new(
            ErrorKind::AgentLoopLimit,
            format!("agent loop exceeded {max_iterations} iterations without a final response"),
        ))
    }
}

async fn dispatch_one(
    tools: &[ToolBinding],
    executor: &ToolExecutor,
    call: &ToolCall,
    telemetry: &Telemetry,
    cancel: &CancellationToken,
) -> Result<String, ToolError> {
    match tools.iter().find(|t| t.name == call.name) {
        Some(binding) => executor.invoke(&binding.resolved, &call.arguments, telemetry, cancel).await,
        None => Err(ToolError::Failed { status: None, message: format!("unknown tool '{}'", call.name) }),
    }
}

fn map_llm_error(err: LlmError) -> EngineError {
    match err {
        LlmError::Canceled => EngineError::new(ErrorKind::Canceled, err.to_string()),
        LlmError::Fatal(_) => EngineError::new(ErrorKind::LlmFatal, err.to_string()),
        LlmError::Transient(_) | LlmError::Timeout => EngineError::new(ErrorKind::LlmTransient, err.to_string()),
    }
}

fn map_tool_error(err: ToolError) -> EngineError {
    match err {
        ToolError::Schema(_) => EngineError::new(ErrorKind::ToolSchema, err.to_string()),
        ToolError::Canceled => EngineError::new(ErrorKind::Canceled, err.to_string()),
        ToolError::Failed { .. } | ToolError::Timeout => EngineError::new(ErrorKind::ToolFailed, err.to_string()),
    }
}
