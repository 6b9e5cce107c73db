//! The Telemetry Fabric: span creation, attribute recording,
//! and token aggregation, injected into every call via a context value rather
//! than a process-wide singleton.

use ark_core::{Target, TargetType, TokenUsage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Span;

/// Handle threaded through Resolver/LLM/Tool/A2A/Memory calls. Cheap to
/// clone; cloning does not create a new telemetry context, it shares one.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Inner>,
}

struct Inner {
    query_name: String,
    query_namespace: String,
    session_id: parking_lot::Mutex<Option<String>>,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
}

impl Telemetry {
    pub fn new(query_name: impl Into<String>, query_namespace: impl Into<String>) -> Self {
        Telemetry {
            inner: Arc::new(Inner {
                query_name: query_name.into(),
                query_namespace: query_namespace.into(),
                session_id: parking_lot::Mutex::new(None),
                prompt_tokens: AtomicU64::new(0),
                completion_tokens: AtomicU64::new(0),
            }),
        }
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.inner.session_id.lock() = Some(session_id.into());
    }

    /// The root span for one Query Reconciler invocation.
    pub fn query_span(&self, phase: &str) -> Span {
        tracing::info_span!(
            "query.reconcile",
            query.name = %self.inner.query_name,
            query.namespace = %self.inner.query_namespace,
            query.phase = %phase,
        )
    }

    /// Span for one LLM invocation.
    pub fn llm_span(&self, model_name: &str, provider: &str) -> Span {
        tracing::info_span!(
            "llm.call",
            llm.model.name = %model_name,
            llm.model.provider = %provider,
            session.id = self.session_id_field(),
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            gen_ai.usage.total_tokens = tracing::field::Empty,
            gen_ai.completion.finish_reason = tracing::field::Empty,
        )
    }

    /// Span for one tool invocation.
    pub fn tool_span(&self, tool_name: &str, tool_type: &str) -> Span {
        tracing::info_span!(
            "tool.call",
            tool.name = %tool_name,
            tool.type = %tool_type,
        )
    }

    /// Span for one member turn within a team strategy.
    pub fn team_turn_span(&self, team_name: &str, member_name: &str) -> Span {
        tracing::info_span!(
            "team.turn",
            team.name = %team_name,
            target.type = "agent",
            target.name = %member_name,
        )
    }

    /// Span for one target's execution within a Query.
    pub fn target_span(&self, target: &Target) -> Span {
        let kind = match target.kind {
            TargetType::Agent => "agent",
            TargetType::Team => "team",
            TargetType::Model => "model",
            TargetType::Tool => "tool",
        };
        tracing::info_span!(
            "query.target",
            target.type = kind,
            target.name = %target.name,
        )
    }

    /// Span for one A2A task poll.
    pub fn a2a_poll_span(&self, task_id: &str) -> Span {
        tracing::info_span!("a2a.poll", task.id = %task_id)
    }

    fn session_id_field(&self) -> String {
        self.inner.session_id.lock().clone().unwrap_or_default()
    }

    /// Record `gen_ai.usage.*` attributes on the current span and fold the
    /// usage into the running total returned by [`Telemetry::total_tokens`].
    pub fn record_usage(&self, span: &Span, usage: &TokenUsage) {
        span.record("gen_ai.usage.input_tokens", usage.prompt);
        span.record("gen_ai.usage.output_tokens", usage.completion);
        span.record("gen_ai.usage.total_tokens", usage.total);
        self.inner.prompt_tokens.fetch_add(usage.prompt, Ordering::Relaxed);
        self.inner.completion_tokens.fetch_add(usage.completion, Ordering::Relaxed);
    }

    pub fn total_tokens(&self) -> TokenUsage {
        let prompt = self.inner.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.inner.completion_tokens.load(Ordering::Relaxed);
        TokenUsage {
            prompt,
            completion,
            total: prompt + completion,
        }
    }
}
