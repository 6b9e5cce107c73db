//! The `bedrock` provider adapter, scoped to Anthropic-family Bedrock models
//! (the common case in practice): reuses the Anthropic Messages wire shape
//!
//! Request signing is narrowed to a caller-supplied bearer token rather than
//! full SigV4, matching the `bedrock-runtime` gateway deployments that front
//! Bedrock with a static auth header. Full SigV4 (host-header canonicalization
//! and request-body hashing per request) is not implemented.

use crate::error::LlmError;
use crate::provider::ProviderAdapter;
use crate::providers::anthropic::AnthropicAdapter;
use crate::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::time::Duration;

pub struct BedrockAdapter {
    inner: AnthropicAdapter,
}

impl BedrockAdapter {
    /// `base_url` is the caller's Bedrock-fronting gateway (e.g. an
    /// API-Gateway/ALB endpoint translating to `bedrock-runtime`'s
    /// `invoke-model` API); `bearer_token` stands in for SigV4.
    ///
    /// TODO: sign requests with SigV4 directly against
    /// `bedrock-runtime.{region}.amazonaws.com` instead of requiring a
    /// pre-authenticated gateway, once a concrete deployment needs it.
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        model_id: impl Into<String>,
        extra_headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = extra_headers;
        let token = bearer_token.into();
        if !token.is_empty() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        let inner = AnthropicAdapter::new(base_url, "", model_id, headers, timeout)?;
        Ok(BedrockAdapter { inner })
    }
}

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn kind(&self) -> &'static str {
        "bedrock"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.invoke(request).await
    }
}
