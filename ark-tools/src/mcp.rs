//! `mcp` tool dispatch: a pooled Model Context Protocol client session per
//! server URL.

use crate::error::ToolError;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type Session = Arc<Mutex<RunningService<RoleClient, ()>>>;

/// Sessions are keyed by server URL and shared: concurrent calls to the same
/// server serialize on that server's mutex rather than opening a new
/// connection per call.
#[derive(Clone, Default)]
pub struct McpPool {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl McpPool {
    pub fn new() -> Self {
        McpPool::default()
    }

    async fn session_for(&self, server_url: &str) -> Result<Session, ToolError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(server_url) {
            return Ok(session.clone());
        }
        let transport = StreamableHttpClientTransport::from_uri(server_url.to_string());
        let service = ()
            .serve(transport)
            .await
            .map_err(|e| ToolError::Failed { status: None, message: format!("mcp session to '{server_url}' failed: {e}") })?;
        let session: Session = Arc::new(Mutex::new(service));
        sessions.insert(server_url.to_string(), session.clone());
        Ok(session)
    }

    /// Drop a session after a protocol-level failure so the next call
    /// reconnects instead of reusing a session the server has closed.
    pub async fn evict(&self, server_url: &str) {
        self.sessions.lock().await.remove(server_url);
    }

    pub async fn invoke(&self, server_url: &str, tool_name: &str, arguments: Value) -> Result<String, ToolError> {
        let session = self.session_for(server_url).await?;
        let guard = session.lock().await;

        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };

        let result = guard
            .call_tool(CallToolRequestParam { name: tool_name.to_string().into(), arguments })
            .await
            .map_err(|e| ToolError::Failed { status: None, message: format!("mcp tools/call '{tool_name}' failed: {e}") })?;

        Ok(demux_content(&result))
    }
}

/// Join every text content block of a `tools/call` result into a single
/// string, the way a non-streaming caller consumes a (possibly chunked)
/// response.
fn demux_content(result: &rmcp::model::CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text().map(|t| t.text.clone()))
        .collect::<Vec<_>>()
        .join("")
}
