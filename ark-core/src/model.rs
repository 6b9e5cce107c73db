//! The `Model` CRD.

use crate::valuefrom::HeaderRef;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Openai,
    Azure,
    Bedrock,
    Anthropic,
    Ollama,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub base_url: String,
    /// Secret-bearing; never echoed back in `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub model_name: String,
    #[serde(default)]
    pub headers: Vec<HeaderRef>,
}

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ark.mckinsey.com",
    version = "v1alpha1",
    kind = "Model",
    namespaced,
    shortname = "mdl"
)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    #[serde(rename = "type")]
    pub kind: ModelType,
    pub config: ModelConfig,
}
