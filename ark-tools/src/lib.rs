//! The Tool Executor: runs a tool call — HTTP, MCP, or a
//! registered builtin — and produces the result text fed back to the LLM.

pub mod builtin;
pub mod error;
pub mod executor;
pub mod http;
pub mod mcp;

pub use builtin::{BuiltinFn, BuiltinFuture, BuiltinRegistry};
pub use error::ToolError;
pub use executor::{ResolvedTool, ToolExecutor};
