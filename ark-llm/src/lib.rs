//! The LLM Invoker: a provider-neutral chat-completion client.
//!
//! Adapters normalize each provider's wire dialect to [`types::LlmRequest`]/
//! [`types::LlmResponse`]; [`invoker::Invoker`] wraps whichever adapter is
//! configured with the shared timeout/retry/telemetry policy every provider
//! gets for free.

pub mod error;
pub mod invoker;
pub mod provider;
pub mod providers;
pub mod types;

pub use error::LlmError;
pub use invoker::Invoker;
pub use provider::ProviderAdapter;
pub use types::{ChatMessage, ChatRole, FinishReason, LlmRequest, LlmResponse, ToolCall, ToolDescriptor};
