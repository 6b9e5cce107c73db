//! The A2A Task Reconciler: creates and polls a remote
//! agent server's task, merging its artifacts and history into a local
//! mirror that is monotone and never loses an entry.

pub mod client;
pub mod error;
pub mod merge;
pub mod reconciler;
pub mod wire;

pub use client::A2aClient;
pub use error::A2aError;
pub use merge::{content_hash, merge_task};
pub use reconciler::{A2aReconciler, POLL_INTERVAL};
