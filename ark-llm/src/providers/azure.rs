//! The `azure` provider adapter: same chat-completions schema as `openai`,
//! dialect-translated for Azure OpenAI's deployment-scoped URL, `api-version`
//! query parameter, and `api-key` header.

use crate::error::LlmError;
use crate::provider::ProviderAdapter;
use crate::types::{LlmRequest, LlmResponse};
use async_trait::async_trait;
use std::time::Duration;

pub struct AzureAdapter {
    inner: super::openai::OpenAiAdapter,
}

impl AzureAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        deployment_name: impl Into<String>,
        api_version: impl Into<String>,
        extra_headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = extra_headers;
        if let Some(key) = &api_key {
            headers.push(("api-key".to_string(), key.clone()));
        }
        let inner = super::openai::OpenAiAdapter::new(base_url, None, deployment_name, headers, timeout)?
            .with_kind("azure")
            .with_extra_query(vec![("api-version".to_string(), api_version.into())]);
        Ok(AzureAdapter { inner })
    }
}

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn kind(&self) -> &'static str {
        "azure"
    }

    async fn invoke(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        // Azure scopes the deployment into the URL path (configured by the
        // caller into `base_url`) and the api-version into the query string,
        // appended via `OpenAiAdapter::with_extra_query` at construction.
        self.inner.invoke(request).await
    }
}
