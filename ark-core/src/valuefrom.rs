//! `valueFrom` chains, resolved by `ark-resolver`.

use serde::{Deserialize, Serialize};

/// A reference to a value, either inlined or indirected through a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValueFrom {
    pub value_from: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ValueSource {
    Literal { value: String },
    SecretRef { name: String, key: String },
    ConfigRef { name: String, key: String },
    ServiceRef { name: String, path: String },
    QueryRef { name: String, response_target: ResponseTarget },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ResponseTarget {
    Final,
    Intermediate,
}

/// A key/value header whose value may itself be a `valueFrom` chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HeaderRef {
    pub name: String,
    #[serde(flatten)]
    pub value: ValueFrom,
}
