//! Timeout, retry, and telemetry wrapped around a [`ProviderAdapter`]
//! . This is "the LLM Invoker" as the rest of the engine calls it;
//! the adapter itself only knows one provider's wire dialect.

use crate::error::LlmError;
use crate::provider::ProviderAdapter;
use crate::types::{LlmRequest, LlmResponse};
use ark_telemetry::Telemetry;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_RETRIES: u32 = 3;
/// Backoff schedule before jitter: 1s, 2s, 4s.
const BACKOFF_BASE_MS: u64 = 1000;

pub struct Invoker<'a> {
    adapter: &'a dyn ProviderAdapter,
    model_name: String,
    timeout: Duration,
}

impl<'a> Invoker<'a> {
    pub fn new(adapter: &'a dyn ProviderAdapter, model_name: impl Into<String>) -> Self {
        Invoker {
            adapter,
            model_name: model_name.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Call the adapter, retrying transient failures up to 3x with full-jitter
    /// backoff (1s, 2s, 4s) and recording a `llm.call` span.
    ///
    /// `cancel` is checked between attempts and races each attempt; a fired
    /// token returns [`LlmError::Canceled`] immediately, never retried.
    pub async fn call(
        &self,
        request: &LlmRequest,
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        let span = telemetry.llm_span(&self.model_name, self.adapter.kind());
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LlmError::Canceled);
            }

            let attempt_span = span.clone();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(LlmError::Canceled),
                outcome = self.call_once(request).instrument(attempt_span) => outcome,
            };

            match result {
                Ok(response) => {
                    telemetry.record_usage(&span, &response.tokens);
                    span.record("gen_ai.completion.finish_reason", format!("{:?}", response.finish_reason));
                    return Ok(response);
                }
                Err(err) if attempt < MAX_RETRIES && err.is_transient() => {
                    let delay = backoff_delay(attempt);
                    attempt += 1;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(LlmError::Canceled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_once(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match tokio::time::timeout(self.timeout, self.adapter.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout),
        }
    }
}

/// Full-jitter exponential backoff: `random(0, base * 2^attempt)`.
fn backoff_delay(attempt: u32) -> Duration {
    let cap_ms = BACKOFF_BASE_MS * 2u64.pow(attempt);
    let jittered_ms = rand::thread_rng().gen_range(0..=cap_ms);
    Duration::from_millis(jittered_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, FinishReason};
    use ark_core::TokenUsage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyAdapter {
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl ProviderAdapter for FlakyAdapter {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn invoke(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                return Err(LlmError::Transient("temporarily unavailable".to_string()));
            }
            Ok(LlmResponse {
                message: ChatMessage::user("ok"),
                finish_reason: FinishReason::Stop,
                tokens: TokenUsage { prompt: 1, completion: 1, total: 2 },
            })
        }
    }

    struct AlwaysFatal;

    #[async_trait]
    impl ProviderAdapter for AlwaysFatal {
        fn kind(&self) -> &'static str {
            "stub"
        }

        async fn invoke(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            Err(LlmError::Fatal("bad request".to_string()))
        }
    }

    fn request() -> LlmRequest {
        LlmRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let adapter = FlakyAdapter {
            calls: Arc::new(AtomicU32::new(0)),
            fail_times: 2,
        };
        let invoker = Invoker::new(&adapter, "stub-model");
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let response = invoker.call(&request(), &telemetry, &cancel).await.unwrap();
        assert_eq!(response.message.content, "ok");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_never_retried() {
        let adapter = AlwaysFatal;
        let invoker = Invoker::new(&adapter, "stub-model");
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let err = invoker.call(&request(), &telemetry, &cancel).await.unwrap_err();
        assert!(matches!(err, LlmError::Fatal(_)));
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_last_transient_error() {
        let adapter = FlakyAdapter {
            calls: Arc::new(AtomicU32::new(0)),
            fail_times: 10,
        };
        let invoker = Invoker::new(&adapter, "stub-model");
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let err = invoker.call(&request(), &telemetry, &cancel).await.unwrap_err();
        assert!(matches!(err, LlmError::Transient(_)));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_short_circuits_immediately() {
        let adapter = AlwaysFatal;
        let invoker = Invoker::new(&adapter, "stub-model");
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = invoker.call(&request(), &telemetry, &cancel).await.unwrap_err();
        assert!(matches!(err, LlmError::Canceled));
    }

    #[test]
    fn backoff_delay_is_bounded_by_cap() {
        for attempt in 0..3 {
            let cap = BACKOFF_BASE_MS * 2u64.pow(attempt);
            for _ in 0..20 {
                assert!(backoff_delay(attempt).as_millis() as u64 <= cap);
            }
        }
    }
}
