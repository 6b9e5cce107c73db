//! The `selector` strategy's member-choice seam: call
//! `selector.model` with the transcript and a list of candidate names, then
//! parse its response for one of them.

use ark_core::{EngineError, Message};
use ark_telemetry::Telemetry;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Picks the next member to run. Returns `Ok(None)` when the model's answer
/// doesn't name a candidate — the strategist falls back to round-robin order
/// for that turn, which still counts against `maxTurns`.
#[async_trait]
pub trait SelectorDecider: Send + Sync {
    async fn select(
        &self,
        transcript: &[Message],
        candidates: &[String],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EngineError>;
}

/// Find a candidate name in `response`, preferring an exact match and
/// falling back to "the response contains this name as a substring" so a
/// selector model that answers in a sentence ("I'll pick beta") still
/// resolves. Pure, so it's unit-testable independent of any model call.
pub fn parse_selection(response: &str, candidates: &[String]) -> Option<String> {
    let trimmed = response.trim();
    if let Some(exact) = candidates.iter().find(|c| c.as_str() == trimmed) {
        return Some(exact.clone());
    }
    candidates.iter().find(|c| response.contains(c.as_str())).cloned()
}
