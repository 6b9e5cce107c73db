//! Dispatches one resolved `Target` to its backing executor.
//!
//! Kept behind a trait so `reconcile` depends on an interface rather than a
//! concrete registry wiring;
//! [`K8sTargetExecutor`] is the production implementation, fetching
//! Agent/Team/Model/Tool CRDs live from the cluster on every call.

use ark_a2a::A2aReconciler;
use ark_core::{
    Agent, EngineError, ErrorKind, Message, Model, ModelType, Response, Target, TargetType, Team, Tool, TokenUsage,
};
use ark_llm::providers::{anthropic::AnthropicAdapter, azure::AzureAdapter, bedrock::BedrockAdapter, openai::OpenAiAdapter};
use ark_llm::{ChatMessage, Invoker, LlmRequest, ProviderAdapter};
use ark_resolver::Resolver;
use ark_team::{MemberRunner, TeamStrategist};
use ark_telemetry::Telemetry;
use ark_tools::{ResolvedTool, ToolExecutor};
use async_trait::async_trait;
use kube::{Api, Client, ResourceExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Per-call dispatch timeout default for a raw `model`/`tool` target.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Returns the status response plus any new conversation messages the
    /// caller should persist through the Memory Gateway . Direct
    /// `model`/`tool` targets don't participate in the conversation
    /// transcript, so they always return an empty delta.
    async fn execute(
        &self,
        target: &Target,
        namespace: &str,
        input: &str,
        params: &BTreeMap<String, String>,
        history: &[Message],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<(Response, Vec<Message>), EngineError>;
}

pub struct K8sTargetExecutor {
    client: Client,
    resolver: Arc<Resolver>,
    tools: Arc<ToolExecutor>,
}

impl K8sTargetExecutor {
    pub fn new(client: Client, resolver: Arc<Resolver>, tools: Arc<ToolExecutor>) -> Self {
        K8sTargetExecutor { client, resolver, tools }
    }

    async fn fetch_model(&self, name: &str, namespace: &str) -> Result<Model, EngineError> {
        let api: Api<Model> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| EngineError::new(ErrorKind::Resolve, format!("model '{name}' lookup failed: {e}")))
    }

    async fn fetch_tool(&self, name: &str, namespace: &str) -> Result<Tool, EngineError> {
        let api: Api<Tool> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| EngineError::new(ErrorKind::Resolve, format!("tool '{name}' lookup failed: {e}")))
    }

    async fn fetch_agent(&self, name: &str, namespace: &str) -> Result<Agent, EngineError> {
        let api: Api<Agent> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| EngineError::new(ErrorKind::Resolve, format!("agent '{name}' lookup failed: {e}")))
    }

    async fn fetch_team(&self, name: &str, namespace: &str) -> Result<Team, EngineError> {
        let api: Api<Team> = Api::namespaced(self.client.clone(), namespace);
        api.get(name).await.map_err(|e| EngineError::new(ErrorKind::Resolve, format!("team '{name}' lookup failed: {e}")))
    }

    async fn resolve_headers(
        &self,
        headers: &[ark_core::HeaderRef],
        namespace: &str,
    ) -> Result<Vec<(String, String)>, EngineError> {
        let mut resolved = Vec::with_capacity(headers.len());
        for header in headers {
            let value = self.resolver.resolve(&header.value, namespace).await?;
            resolved.push((header.name.clone(), value));
        }
        Ok(resolved)
    }

    /// Build a [`ProviderAdapter`] for `model`'s type.
    async fn build_adapter(&self, model: &Model, namespace: &str) -> Result<Box<dyn ProviderAdapter>, EngineError> {
        let config = &model.spec.config;
        let headers = self.resolve_headers(&config.headers, namespace).await?;
        let api_key = config.api_key.clone().unwrap_or_default();

        let adapter: Box<dyn ProviderAdapter> = match model.spec.kind {
            ModelType::Openai | ModelType::Ollama | ModelType::Custom => Box::new(
                OpenAiAdapter::new(config.base_url.clone(), config.api_key.clone(), config.model_name.clone(), headers, DEFAULT_CALL_TIMEOUT)
                    .map_err(|e| EngineError::new(ErrorKind::LlmFatal, e.to_string()))?,
            ),
            ModelType::Azure => Box::new(
                AzureAdapter::new(
                    config.base_url.clone(),
                    config.api_key.clone(),
                    config.model_name.clone(),
                    config.api_version.clone().unwrap_or_default(),
                    headers,
                    DEFAULT_CALL_TIMEOUT,
                )
                .map_err(|e| EngineError::new(ErrorKind::LlmFatal, e.to_string()))?,
            ),
            ModelType::Bedrock => Box::new(
                BedrockAdapter::new(config.base_url.clone(), api_key, config.model_name.clone(), headers, DEFAULT_CALL_TIMEOUT)
                    .map_err(|e| EngineError::new(ErrorKind::LlmFatal, e.to_string()))?,
            ),
            ModelType::Anthropic => Box::new(
                AnthropicAdapter::new(config.base_url.clone(), api_key, config.model_name.clone(), headers, DEFAULT_CALL_TIMEOUT)
                    .map_err(|e| EngineError::new(ErrorKind::LlmFatal, e.to_string()))?,
            ),
        };
        Ok(adapter)
    }

    async fn build_tool_binding(&self, tool: &Tool, namespace: &str) -> Result<ark_agent::ToolBinding, EngineError> {
        let headers = self.resolve_headers(&tool.spec.spec.headers, namespace).await?;
        let name = tool.name_any();
        let resolved = match tool.spec.kind {
            ark_core::ToolType::Http => ResolvedTool::Http {
                address: tool.spec.spec.address.clone(),
                method: tool.spec.spec.method.clone().unwrap_or_else(|| "POST".to_string()),
                headers,
                input_schema: tool.spec.spec.input_schema.clone(),
                timeout: Duration::from_secs(30),
            },
            ark_core::ToolType::Mcp => ResolvedTool::Mcp {
                server_url: tool.spec.spec.address.clone(),
                tool_name: name.clone(),
                input_schema: tool.spec.spec.input_schema.clone(),
            },
            ark_core::ToolType::Builtin => {
                ResolvedTool::Builtin { name: tool.spec.spec.address.clone(), input_schema: tool.spec.spec.input_schema.clone() }
            }
            ark_core::ToolType::FunctionSchema => ResolvedTool::FunctionSchema,
        };
        Ok(ark_agent::ToolBinding { name, description: String::new(), resolved })
    }

    async fn run_agent_turn(
        &self,
        agent: &Agent,
        namespace: &str,
        input: &str,
        params: &BTreeMap<String, String>,
        history: &[Message],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<AgentTurnOutcome, EngineError> {
        if agent.spec.is_a2a() {
            return self.run_a2a_agent(agent, input, telemetry, cancel).await;
        }

        let rendered_prompt = ark_core::template::render(&agent.spec.prompt, params)?;

        let model_ref = &agent.spec.model_ref;
        let model_namespace = model_ref.namespace.as_deref().unwrap_or(namespace);
        let model = self.fetch_model(&model_ref.name, model_namespace).await?;
        let adapter = self.build_adapter(&model, model_namespace).await?;
        let invoker = Invoker::new(adapter.as_ref(), model.spec.config.model_name.clone());

        let mut bindings = Vec::with_capacity(agent.spec.tools.len());
        for tool_ref in &agent.spec.tools {
            let tool_namespace = tool_ref.namespace.as_deref().unwrap_or(namespace);
            let tool = self.fetch_tool(&tool_ref.name, tool_namespace).await?;
            bindings.push(self.build_tool_binding(&tool, tool_namespace).await?);
        }

        let request = ark_agent::AgentRunRequest {
            agent_prompt: &rendered_prompt,
            input,
            history,
            tools: &bindings,
            max_iterations: 0,
        };

        let outcome = ark_agent::AgentRunner::run(&invoker, &self.tools, request, telemetry, cancel).await?;
        Ok(AgentTurnOutcome { message: outcome.final_message, tokens: outcome.tokens, new_messages: outcome.new_messages })
    }

    async fn run_a2a_agent(
        &self,
        agent: &Agent,
        input: &str,
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<AgentTurnOutcome, EngineError> {
        let agent_address = agent
            .spec
            .a2a_server_address
            .as_deref()
            .ok_or_else(|| EngineError::new(ErrorKind::Resolve, "a2a agent is missing a2aServerAddress".to_string()))?;

        let reconciler = A2aReconciler::new();
        let message_id = uuid::Uuid::new_v4().to_string();
        let (task_id, _context_id, mut status) = reconciler
            .create_task(agent_address, message_id, input, None, &[])
            .await
            .map_err(|e| EngineError::new(ErrorKind::A2aProtocol, e.to_string()))?;

        let mut next_sequence = status.history.len() as u64;
        reconciler
            .run_to_terminal(agent_address, &task_id, &mut status, &mut next_sequence, &[], telemetry, cancel)
            .await
            .map_err(|e| EngineError::new(ErrorKind::A2aProtocol, e.to_string()))?;

        let last = status.history.last();
        let final_text = last.map(|m| m.text_content()).unwrap_or_default();
        let sequence = last.map(|m| m.sequence).unwrap_or(0);
        let message = Message::text(ark_core::Role::Agent, final_text, sequence, chrono::Utc::now());
        Ok(AgentTurnOutcome { message: message.clone(), tokens: TokenUsage::default(), new_messages: vec![message] })
    }
}

/// One agent turn's result: the final message plus everything the caller
/// should persist through the Memory Gateway.
struct AgentTurnOutcome {
    message: Message,
    tokens: TokenUsage,
    new_messages: Vec<Message>,
}

#[async_trait]
impl TargetExecutor for K8sTargetExecutor {
    async fn execute(
        &self,
        target: &Target,
        namespace: &str,
        input: &str,
        params: &BTreeMap<String, String>,
        history: &[Message],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<(Response, Vec<Message>), EngineError> {
        let target_namespace = target.namespace.as_deref().unwrap_or(namespace);
        let span = telemetry.target_span(target);

        async move {
            match target.kind {
                TargetType::Agent => {
                    let agent = self.fetch_agent(&target.name, target_namespace).await?;
                    let outcome =
                        self.run_agent_turn(&agent, target_namespace, input, params, history, telemetry, cancel).await?;
                    let response =
                        Response { target: target.clone(), content: outcome.message.text_content(), token_usage: outcome.tokens };
                    Ok((response, outcome.new_messages))
                }
                TargetType::Team => {
                    let team = self.fetch_team(&target.name, target_namespace).await?;
                    let runner = AgentMemberRunner { executor: self, namespace: target_namespace.to_string(), params };
                    let outcome = TeamStrategist::run(&team.spec, &target.name, input, &runner, None, telemetry, cancel).await?;
                    let response = Response {
                        target: target.clone(),
                        content: outcome.final_message.text_content(),
                        token_usage: TokenUsage::default(),
                    };
                    Ok((response, outcome.transcript))
                }
                TargetType::Model => {
                    let model = self.fetch_model(&target.name, target_namespace).await?;
                    let adapter = self.build_adapter(&model, target_namespace).await?;
                    let invoker = Invoker::new(adapter.as_ref(), model.spec.config.model_name.clone());
                    let request = LlmRequest { messages: vec![ChatMessage::user(input)], tools: Vec::new() };
                    let response = invoker.call(&request, telemetry, cancel).await.map_err(classify_llm_error)?;
                    let response =
                        Response { target: target.clone(), content: response.message.content, token_usage: response.tokens };
                    Ok((response, Vec::new()))
                }
                TargetType::Tool => {
                    let tool = self.fetch_tool(&target.name, target_namespace).await?;
                    let binding = self.build_tool_binding(&tool, target_namespace).await?;
                    let arguments: Value = serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()));
                    let result = self
                        .tools
                        .invoke(&binding.resolved, &arguments, telemetry, cancel)
                        .await
                        .map_err(classify_tool_error)?;
                    let response = Response { target: target.clone(), content: result, token_usage: TokenUsage::default() };
                    Ok((response, Vec::new()))
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Adapts [`K8sTargetExecutor`]'s single-agent dispatch to the [`MemberRunner`]
/// seam the Team Strategist calls into once per turn.
struct AgentMemberRunner<'a> {
    executor: &'a K8sTargetExecutor,
    namespace: String,
    params: &'a BTreeMap<String, String>,
}

#[async_trait]
impl<'a> MemberRunner for AgentMemberRunner<'a> {
    async fn run_member(
        &self,
        member: &str,
        input: &str,
        history: &[Message],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<Message, EngineError> {
        let agent = self.executor.fetch_agent(member, &self.namespace).await?;
        let outcome =
            self.executor.run_agent_turn(&agent, &self.namespace, input, self.params, history, telemetry, cancel).await?;
        Ok(outcome.message)
    }
}

fn classify_llm_error(e: ark_llm::LlmError) -> EngineError {
    let kind = if e.is_fatal() { ErrorKind::LlmFatal } else { ErrorKind::LlmTransient };
    EngineError::new(kind, e.to_string())
}

fn classify_tool_error(e: ark_tools::ToolError) -> EngineError {
    let kind = match &e {
        ark_tools::ToolError::Schema(_) => ErrorKind::ToolSchema,
        _ => ErrorKind::ToolFailed,
    };
    EngineError::new(kind, e.to_string())
}
