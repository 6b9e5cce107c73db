//! The Tool Executor: validates arguments against the tool's
//! `inputSchema`, then dispatches by tool type.

use crate::builtin::BuiltinRegistry;
use crate::error::ToolError;
use crate::http::{HttpDispatcher, DEFAULT_TIMEOUT};
use crate::mcp::McpPool;
use ark_telemetry::Telemetry;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// A tool after `valueFrom` headers have been resolved by `ark-resolver` and
/// the CRD's variant-specific fields projected out — the Tool Executor itself
/// never looks up a `valueFrom` chain.
pub enum ResolvedTool {
    Http {
        address: String,
        method: String,
        headers: Vec<(String, String)>,
        input_schema: Value,
        timeout: Duration,
    },
    Mcp {
        server_url: String,
        tool_name: String,
        input_schema: Value,
    },
    Builtin {
        name: String,
        input_schema: Value,
    },
    /// Schema-only: the LLM may emit a call, but nothing in this engine
    /// executes it.
    FunctionSchema,
}

impl ResolvedTool {
    /// The tool's `inputSchema`, used both for validation here and to build
    /// the `ToolDescriptor` the Agent Runner hands the LLM.
    pub fn input_schema(&self) -> Option<&Value> {
        match self {
            ResolvedTool::Http { input_schema, .. } => Some(input_schema),
            ResolvedTool::Mcp { input_schema, .. } => Some(input_schema),
            ResolvedTool::Builtin { input_schema, .. } => Some(input_schema),
            ResolvedTool::FunctionSchema => None,
        }
    }

    fn name(&self) -> &str {
        match self {
            ResolvedTool::Http { address, .. } => address,
            ResolvedTool::Mcp { tool_name, .. } => tool_name,
            ResolvedTool::Builtin { name, .. } => name,
            ResolvedTool::FunctionSchema => "function-schema",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ResolvedTool::Http { .. } => "http",
            ResolvedTool::Mcp { .. } => "mcp",
            ResolvedTool::Builtin { .. } => "builtin",
            ResolvedTool::FunctionSchema => "function-schema",
        }
    }
}

const MAX_RETRIES: u32 = 2;

pub struct ToolExecutor {
    http: HttpDispatcher,
    builtins: BuiltinRegistry,
    mcp: McpPool,
}

impl ToolExecutor {
    pub fn new(builtins: BuiltinRegistry) -> Result<Self, ToolError> {
        Ok(ToolExecutor { http: HttpDispatcher::new()?, builtins, mcp: McpPool::new() })
    }

    /// Validate `arguments` against the tool's `inputSchema`, then dispatch
    /// . Transient
    /// `ErrToolFailed` is retried up to 2x.
    pub async fn invoke(
        &self,
        tool: &ResolvedTool,
        arguments: &Value,
        telemetry: &Telemetry,
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        if let Some(schema) = tool.input_schema() {
            validate_arguments(schema, arguments)?;
        }

        let span = telemetry.tool_span(tool.name(), tool.kind());

        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ToolError::Canceled);
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ToolError::Canceled),
                outcome = self.dispatch(tool, arguments).instrument(span.clone()) => outcome,
            };

            match result {
                Ok(text) => return Ok(text),
                Err(err) if attempt < MAX_RETRIES && err.is_retryable() => {
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn dispatch(&self, tool: &ResolvedTool, arguments: &Value) -> Result<String, ToolError> {
        match tool {
            ResolvedTool::Http { address, method, headers, timeout, .. } => {
                self.http.invoke(address, method, headers, arguments, *timeout).await
            }
            ResolvedTool::Mcp { server_url, tool_name, .. } => {
                let result = self.mcp.invoke(server_url, tool_name, arguments.clone()).await;
                if result.is_err() {
                    self.mcp.evict(server_url).await;
                }
                result
            }
            ResolvedTool::Builtin { name, .. } => self.builtins.invoke(name, arguments.clone()).await,
            ResolvedTool::FunctionSchema => {
                Err(ToolError::Schema("function-schema tools have no in-engine executor".to_string()))
            }
        }
    }
}

fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ToolError::Schema(format!("invalid inputSchema: {e}")))?;
    let errors: Vec<String> = validator.iter_errors(arguments).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ToolError::Schema(errors.join("; ")))
    }
}

pub fn default_http_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn schema() -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        })
    }

    #[tokio::test]
    async fn rejects_arguments_violating_schema() {
        let executor = ToolExecutor::new(BuiltinRegistry::new()).unwrap();
        let tool = ResolvedTool::Http {
            address: "http://unused.invalid/add".to_string(),
            method: "POST".to_string(),
            headers: Vec::new(),
            input_schema: schema(),
            timeout: DEFAULT_TIMEOUT,
        };
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let err = executor.invoke(&tool, &serde_json::json!({"a": 1}), &telemetry, &cancel).await.unwrap_err();
        assert!(matches!(err, ToolError::Schema(_)));
    }

    #[tokio::test]
    async fn dispatches_http_after_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(200).set_body_string("5"))
            .mount(&server)
            .await;

        let executor = ToolExecutor::new(BuiltinRegistry::new()).unwrap();
        let tool = ResolvedTool::Http {
            address: format!("{}/add", server.uri()),
            method: "POST".to_string(),
            headers: Vec::new(),
            input_schema: schema(),
            timeout: DEFAULT_TIMEOUT,
        };
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let result = executor.invoke(&tool, &serde_json::json!({"a": 2, "b": 3}), &telemetry, &cancel).await.unwrap();
        assert_eq!(result, "5");
    }

    #[tokio::test]
    async fn retries_failed_http_up_to_two_times() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/add"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let executor = ToolExecutor::new(BuiltinRegistry::new()).unwrap();
        let tool = ResolvedTool::Http {
            address: format!("{}/add", server.uri()),
            method: "POST".to_string(),
            headers: Vec::new(),
            input_schema: schema(),
            timeout: DEFAULT_TIMEOUT,
        };
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let result = executor.invoke(&tool, &serde_json::json!({"a": 2, "b": 3}), &telemetry, &cancel).await.unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn function_schema_tools_are_not_executable() {
        let executor = ToolExecutor::new(BuiltinRegistry::new()).unwrap();
        let telemetry = Telemetry::new("q1", "default");
        let cancel = CancellationToken::new();
        let err = executor.invoke(&ResolvedTool::FunctionSchema, &Value::Null, &telemetry, &cancel).await.unwrap_err();
        assert!(matches!(err, ToolError::Schema(_)));
    }
}
