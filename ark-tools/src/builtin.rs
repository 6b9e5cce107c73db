//! `builtin` tool dispatch: in-process functions identified by name,
//! registered at construction rather than through a global registry

use crate::error::ToolError;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BuiltinFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;
pub type BuiltinFn = Arc<dyn Fn(Value) -> BuiltinFuture + Send + Sync>;

#[derive(Clone, Default)]
pub struct BuiltinRegistry {
    functions: HashMap<String, BuiltinFn>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        BuiltinRegistry::default()
    }

    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        self.functions.insert(name.into(), Arc::new(move |args| Box::pin(f(args))));
    }

    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| ToolError::Failed { status: None, message: format!("unknown builtin tool '{name}'") })?;
        f(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invokes_registered_function() {
        let mut registry = BuiltinRegistry::new();
        registry.register("echo", |args| async move { Ok(args.to_string()) });
        let result = registry.invoke("echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, "{\"x\":1}");
    }

    #[tokio::test]
    async fn unknown_builtin_is_tool_failed() {
        let registry = BuiltinRegistry::new();
        let err = registry.invoke("missing", Value::Null).await.unwrap_err();
        assert!(matches!(err, ToolError::Failed { .. }));
    }
}
