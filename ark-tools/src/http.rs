//! The `http` tool dispatch: renders a request from the tool's `spec`
//! (method, headers, JSON body) and enforces a per-tool timeout.

use crate::error::ToolError;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;

/// Default per-tool timeout when the CRD doesn't override it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpDispatcher {
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new() -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ToolError::Failed { status: None, message: format!("failed to build HTTP client: {e}") })?;
        Ok(HttpDispatcher { client })
    }

    pub async fn invoke(
        &self,
        address: &str,
        method: &str,
        headers: &[(String, String)],
        arguments: &Value,
        timeout: Duration,
    ) -> Result<String, ToolError> {
        let method = reqwest::Method::from_str(method)
            .map_err(|_| ToolError::Failed { status: None, message: format!("invalid HTTP method '{method}'") })?;

        let mut req = self.client.request(method, address).timeout(timeout).json(arguments);
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Failed { status: Some(status.as_u16()), message: body });
        }
        response.text().await.map_err(ToolError::from)
    }
}

impl Default for HttpDispatcher {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn renders_request_and_returns_body_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .and(body_json(serde_json::json!({"a": 2, "b": 3})))
            .respond_with(ResponseTemplate::new(200).set_body_string("5"))
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new().unwrap();
        let result = dispatcher
            .invoke(
                &format!("{}/add", server.uri()),
                "POST",
                &[],
                &serde_json::json!({"a": 2, "b": 3}),
                DEFAULT_TIMEOUT,
            )
            .await
            .unwrap();
        assert_eq!(result, "5");
    }

    #[tokio::test]
    async fn non_2xx_is_tool_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new().unwrap();
        let err = dispatcher
            .invoke(&format!("{}/add", server.uri()), "POST", &[], &serde_json::json!({}), DEFAULT_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed { status: Some(500), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn sends_resolved_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(wiremock::matchers::header("x-api-key", "secret-value"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let dispatcher = HttpDispatcher::new().unwrap();
        let result = dispatcher
            .invoke(
                &format!("{}/ping", server.uri()),
                "GET",
                &[("x-api-key".to_string(), "secret-value".to_string())],
                &Value::Null,
                DEFAULT_TIMEOUT,
            )
            .await
            .unwrap();
        assert_eq!(result, "pong");
    }
}
