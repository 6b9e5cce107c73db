//! The `Agent` CRD.

use crate::params::{NamedRef, Parameter};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// When set to `"a2a"`, the agent is externalized to a remote A2A server
/// instead of being driven by the local Agent Runner.
pub const EXECUTION_ENGINE_A2A: &str = "a2a";

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Agent",
    namespaced,
    shortname = "agt"
)]
#[serde(rename_all = "camelCase")]
pub struct AgentSpec {
    pub prompt: String,
    pub model_ref: NamedRef,
    #[serde(default)]
    pub tools: Vec<NamedRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_engine: Option<String>,
    /// Required when `execution_engine` is `"a2a"`: the remote agent
    /// server's address, in the same sense `A2ATaskMirrorSpec::agent_address`
    /// uses the term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a2a_server_address: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl AgentSpec {
    pub fn is_a2a(&self) -> bool {
        self.execution_engine.as_deref() == Some(EXECUTION_ENGINE_A2A)
    }
}
