//! Parameters and named references shared across CRDs.

use crate::valuefrom::ValueFrom;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reference to another namespaced resource by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// A `{{name}}` template parameter, either inlined (`value`) or indirected
/// through a `valueFrom` chain. Resolved values are substituted into `input`
/// and agent prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFrom>,
}
