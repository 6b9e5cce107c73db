//! Core data model and error taxonomy for the ARK query execution engine.
//!
//! This crate owns the shapes everything else in the workspace exchanges:
//! the `Query`/`Agent`/`Team`/`Model`/`Tool` CRDs, the A2A task mirror, memory
//! messages, and the local error taxonomy persisted to `status.error`. It has
//! no network or filesystem dependencies of its own.

pub mod a2a;
pub mod agent;
pub mod error;
pub mod memory;
pub mod model;
pub mod params;
pub mod query;
pub mod target;
pub mod team;
pub mod template;
pub mod tool;
pub mod valuefrom;

pub use a2a::{
    A2ATaskMirror, A2ATaskMirrorSpec, A2ATaskMirrorStatus, Artifact, MirrorPhase, RemoteState, RemoteTask, RemoteTaskStatus,
};
pub use agent::{Agent, AgentSpec};
pub use error::{EngineError, ErrorKind, StatusError};
pub use memory::{MemoryRef, Message, Part, Role};
pub use model::{Model, ModelSpec, ModelType};
pub use params::{NamedRef, Parameter};
pub use query::{Phase, Query, QuerySpec, QueryStatus, Response, TokenUsage};
pub use target::{Target, TargetType};
pub use team::{GraphEdge, GraphSpec, SelectorSpec, Strategy, Team, TeamSpec};
pub use tool::{Tool, ToolCrdSpec, ToolType};
pub use valuefrom::{HeaderRef, ResponseTarget, ValueFrom, ValueSource};
