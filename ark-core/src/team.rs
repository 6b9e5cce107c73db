//! The `Team` CRD.

use crate::error::{EngineError, ErrorKind};
use crate::params::NamedRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    RoundRobin,
    Selector,
    Graph,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpec {
    pub model: NamedRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    pub edges: Vec<GraphEdge>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Team",
    namespaced,
    shortname = "tm"
)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpec {
    pub members: Vec<NamedRef>,
    pub strategy: Strategy,
    pub max_turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<SelectorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<GraphSpec>,
    /// Assistant-message sentinel that ends a `round-robin` run early
    #[serde(default = "default_termination_token")]
    pub termination_token: String,
}

fn default_termination_token() -> String {
    "<<TERMINATE>>".to_string()
}

impl TeamSpec {
    /// Structural invariants: `maxTurns >= 1`; every graph edge's
    /// `to` resolves to a member; `selector` strategy requires `selector.model`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_turns < 1 {
            return Err(EngineError::new(ErrorKind::Resolve, "team.maxTurns must be >= 1"));
        }
        match self.strategy {
            Strategy::Selector if self.selector.is_none() => {
                return Err(EngineError::new(
                    ErrorKind::Resolve,
                    "selector strategy requires team.selector.model",
                ));
            }
            Strategy::Graph => {
                let Some(graph) = &self.graph else {
                    return Err(EngineError::new(ErrorKind::Resolve, "graph strategy requires team.graph"));
                };
                for edge in &graph.edges {
                    if !self.members.iter().any(|m| m.name == edge.to) {
                        return Err(EngineError::new(
                            ErrorKind::Resolve,
                            format!("graph edge target '{}' does not match any team member", edge.to),
                        ));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}
