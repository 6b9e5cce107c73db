//! The seam between the Team Strategist and however a member turn actually
//! runs . A member is usually a local Agent Runner invocation, but
//! a caller is free to route a given member to an A2A reconciler instead —
//! the strategist only needs one final [`Message`] back per turn.

use ark_core::{EngineError, Message};
use ark_telemetry::Telemetry;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Runs one team member's turn and returns its final message.
///
/// Implementations own dereferencing `member` to a concrete agent, building
/// its prompt/tools, and calling the Agent Runner (or an A2A reconciler) —
/// none of that is the strategist's concern.
#[async_trait]
pub trait MemberRunner: Send + Sync {
    async fn run_member(
        &self,
        member: &str,
        input: &str,
        history: &[Message],
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<Message, EngineError>;
}
