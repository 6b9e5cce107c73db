//! The provider adapter seam.

use crate::error::LlmError;
use crate::types::LlmRequest;
use crate::types::LlmResponse;
use async_trait::async_trait;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider name recorded on `llm.model.provider`.
    fn kind(&self) -> &'static str;

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}
