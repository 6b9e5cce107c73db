//! Backend traits the Resolver dereferences through. Implementations are
//! injected at construction.

use ark_core::ResponseTarget;
use async_trait::async_trait;

#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str, key: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait ConfigBackend: Send + Sync {
    async fn get_config(&self, namespace: &str, name: &str, key: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait ServiceAddressBook: Send + Sync {
    /// Compose the URL for `serviceRef{name, path}`. Resolved
    /// here as `http://{name}.{namespace}.svc.cluster.local{path}`, the
    /// conventional in-cluster DNS form.
    async fn resolve_service(&self, name: &str, namespace: &str, path: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait QueryReader: Send + Sync {
    /// Read the referenced Query's response content . `final` reads the last response; `intermediate` reads
    /// the most recent partial response written while still `running`.
    async fn read_query_response(&self, name: &str, namespace: &str, target: ResponseTarget) -> anyhow::Result<String>;
}
