//! The Memory Gateway: reads prior session messages and writes
//! new ones, enforcing the once-per-agent-per-session system message rule.

pub mod client;
pub mod error;
pub mod gateway;
pub mod types;

pub use client::MemoryClient;
pub use error::MemoryError;
pub use gateway::MemoryGateway;
pub use types::{ListMessagesResponse, MessageFilter, MessageItem, PutMessage};
