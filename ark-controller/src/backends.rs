//! Cluster-backed implementations of the [`ark_resolver`] backend traits
//!: secrets and config come from native `Secret`/`ConfigMap`
//! objects, service addresses compose in-cluster DNS, and `queryRef` reads
//! another `Query`'s status straight off the API server.

use ark_core::{Query, ResponseTarget};
use ark_resolver::{ConfigBackend, QueryReader, SecretBackend, ServiceAddressBook};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};

pub struct K8sSecretBackend {
    client: Client,
}

impl K8sSecretBackend {
    pub fn new(client: Client) -> Self {
        K8sSecretBackend { client }
    }
}

#[async_trait]
impl SecretBackend for K8sSecretBackend {
    async fn get_secret(&self, namespace: &str, name: &str, key: &str) -> anyhow::Result<String> {
        // `secretRef` carries no namespace of its own; it resolves within
        // the calling Query's namespace, passed through by the Resolver.
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await?;
        let data = secret.data.ok_or_else(|| anyhow::anyhow!("secret '{name}' has no data"))?;
        let value = data.get(key).ok_or_else(|| anyhow::anyhow!("secret '{name}' has no key '{key}'"))?;
        Ok(String::from_utf8(value.0.clone())?)
    }
}

pub struct K8sConfigBackend {
    client: Client,
}

impl K8sConfigBackend {
    pub fn new(client: Client) -> Self {
        K8sConfigBackend { client }
    }
}

#[async_trait]
impl ConfigBackend for K8sConfigBackend {
    async fn get_config(&self, namespace: &str, name: &str, key: &str) -> anyhow::Result<String> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get(name).await?;
        let data = config_map.data.ok_or_else(|| anyhow::anyhow!("configMap '{name}' has no data"))?;
        data.get(key).cloned().ok_or_else(|| anyhow::anyhow!("configMap '{name}' has no key '{key}'"))
    }
}

/// Composes the conventional in-cluster DNS form for a `serviceRef`: no live DNS lookup,
/// just the address any pod in the cluster could resolve the same way.
pub struct DnsServiceAddressBook;

#[async_trait]
impl ServiceAddressBook for DnsServiceAddressBook {
    async fn resolve_service(&self, name: &str, namespace: &str, path: &str) -> anyhow::Result<String> {
        Ok(format!("http://{name}.{namespace}.svc.cluster.local{path}"))
    }
}

/// Reads a sibling `Query`'s response content for `queryRef`. `final` reads the last response; `intermediate`
/// reads the most recently written one regardless of whether the query has
/// reached a terminal phase yet.
pub struct K8sQueryReader {
    client: Client,
}

impl K8sQueryReader {
    pub fn new(client: Client) -> Self {
        K8sQueryReader { client }
    }
}

#[async_trait]
impl QueryReader for K8sQueryReader {
    async fn read_query_response(&self, name: &str, namespace: &str, target: ResponseTarget) -> anyhow::Result<String> {
        let api: Api<Query> = Api::namespaced(self.client.clone(), namespace);
        let query = api.get(name).await?;
        let status = query.status.ok_or_else(|| anyhow::anyhow!("query '{name}' has no status yet"))?;

        let response = match target {
            ResponseTarget::Final | ResponseTarget::Intermediate => status.responses.last(),
        };
        response
            .map(|r| r.content.clone())
            .ok_or_else(|| anyhow::anyhow!("query '{name}' has no responses yet"))
    }
}
