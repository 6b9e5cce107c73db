//! The Resolver: dereferences `valueFrom` chains into concrete
//! values, following literal/secret/config/service/query refs.

mod backends;
mod cache;

pub use backends::{ConfigBackend, QueryReader, SecretBackend, ServiceAddressBook};
pub use cache::TtlCache;

use ark_core::{EngineError, ErrorKind, ValueFrom, ValueSource};
use std::collections::HashSet;
use std::sync::Arc;

const MAX_DEPTH: usize = 8;

pub struct Resolver {
    secrets: Arc<dyn SecretBackend>,
    config: Arc<dyn ConfigBackend>,
    services: Arc<dyn ServiceAddressBook>,
    queries: Arc<dyn QueryReader>,
    cache: TtlCache,
}

impl Resolver {
    pub fn new(
        secrets: Arc<dyn SecretBackend>,
        config: Arc<dyn ConfigBackend>,
        services: Arc<dyn ServiceAddressBook>,
        queries: Arc<dyn QueryReader>,
    ) -> Self {
        Resolver {
            secrets,
            config,
            services,
            queries,
            cache: TtlCache::new(),
        }
    }

    /// Resolve a single `valueFrom` chain in the context of `namespace`
    /// (used to compose `serviceRef` addresses).
    pub async fn resolve(&self, value_from: &ValueFrom, namespace: &str) -> Result<String, EngineError> {
        let mut visited = HashSet::new();
        self.resolve_inner(value_from, namespace, &mut visited, 0).await
    }

    async fn resolve_inner(
        &self,
        value_from: &ValueFrom,
        namespace: &str,
        visited: &mut HashSet<String>,
        depth: usize,
    ) -> Result<String, EngineError> {
        if depth > MAX_DEPTH {
            return Err(EngineError::new(ErrorKind::Resolve, "valueFrom chain exceeded max depth (8)"));
        }

        match &value_from.value_from {
            ValueSource::Literal { value } => Ok(value.clone()),

            ValueSource::SecretRef { name, key } => {
                let cache_key = format!("secret:{namespace}/{name}#{key}");
                self.mark_visited(&cache_key, visited)?;
                if let Some(cached) = self.cache.get(&cache_key).await {
                    return Ok(cached);
                }
                let value = self.secrets.get_secret(namespace, name, key).await.map_err(|e| {
                    EngineError::new(ErrorKind::Resolve, format!("secret '{name}/{key}' lookup failed: {e}"))
                })?;
                self.cache.put(cache_key, value.clone()).await;
                Ok(value)
            }

            ValueSource::ConfigRef { name, key } => {
                let cache_key = format!("config:{namespace}/{name}#{key}");
                self.mark_visited(&cache_key, visited)?;
                if let Some(cached) = self.cache.get(&cache_key).await {
                    return Ok(cached);
                }
                let value = self.config.get_config(namespace, name, key).await.map_err(|e| {
                    EngineError::new(ErrorKind::Resolve, format!("config '{name}/{key}' lookup failed: {e}"))
                })?;
                self.cache.put(cache_key, value.clone()).await;
                Ok(value)
            }

            ValueSource::ServiceRef { name, path } => {
                let cache_key = format!("service:{namespace}/{name}{path}");
                self.mark_visited(&cache_key, visited)?;
                self.services
                    .resolve_service(name, namespace, path)
                    .await
                    .map_err(|e| EngineError::new(ErrorKind::Resolve, format!("service '{name}' resolution failed: {e}")))
            }

            ValueSource::QueryRef { name, response_target } => {
                let cache_key = format!("query:{namespace}/{name}@{response_target:?}");
                self.mark_visited(&cache_key, visited)?;
                self.queries
                    .read_query_response(name, namespace, *response_target)
                    .await
                    .map_err(|e| EngineError::new(ErrorKind::Resolve, format!("query '{name}' response read failed: {e}")))
            }
        }
    }

    /// Invalidate a cached secret/config value after a known-bad response
    pub async fn invalidate(&self, namespace: &str, name: &str, key: &str, kind: &str) {
        self.cache.invalidate(&format!("{kind}:{namespace}/{name}#{key}")).await;
    }

    fn mark_visited(&self, key: &str, visited: &mut HashSet<String>) -> Result<(), EngineError> {
        if !visited.insert(key.to_string()) {
            return Err(EngineError::new(ErrorKind::Resolve, format!("cycle detected resolving '{key}'")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_core::ResponseTarget;
    use async_trait::async_trait;

    struct StubSecrets;
    #[async_trait]
    impl SecretBackend for StubSecrets {
        async fn get_secret(&self, _namespace: &str, name: &str, key: &str) -> anyhow::Result<String> {
            Ok(format!("secret-{name}-{key}"))
        }
    }

    struct StubConfig;
    #[async_trait]
    impl ConfigBackend for StubConfig {
        async fn get_config(&self, _namespace: &str, name: &str, key: &str) -> anyhow::Result<String> {
            Ok(format!("config-{name}-{key}"))
        }
    }

    struct StubServices;
    #[async_trait]
    impl ServiceAddressBook for StubServices {
        async fn resolve_service(&self, name: &str, namespace: &str, path: &str) -> anyhow::Result<String> {
            Ok(format!("http://{name}.{namespace}.svc.cluster.local{path}"))
        }
    }

    struct StubQueries;
    #[async_trait]
    impl QueryReader for StubQueries {
        async fn read_query_response(&self, name: &str, _namespace: &str, _target: ResponseTarget) -> anyhow::Result<String> {
            Ok(format!("response-of-{name}"))
        }
    }

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(StubSecrets), Arc::new(StubConfig), Arc::new(StubServices), Arc::new(StubQueries))
    }

    fn literal(value: &str) -> ValueFrom {
        ValueFrom {
            value_from: ValueSource::Literal { value: value.to_string() },
        }
    }

    #[tokio::test]
    async fn resolves_literal() {
        let r = resolver();
        assert_eq!(r.resolve(&literal("hi"), "default").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn resolves_secret_ref() {
        let r = resolver();
        let vf = ValueFrom {
            value_from: ValueSource::SecretRef {
                name: "creds".to_string(),
                key: "apiKey".to_string(),
            },
        };
        assert_eq!(r.resolve(&vf, "default").await.unwrap(), "secret-creds-apiKey");
    }

    #[tokio::test]
    async fn resolves_service_ref_to_in_cluster_dns() {
        let r = resolver();
        let vf = ValueFrom {
            value_from: ValueSource::ServiceRef {
                name: "memory".to_string(),
                path: "/v1/sessions".to_string(),
            },
        };
        assert_eq!(
            r.resolve(&vf, "ark-system").await.unwrap(),
            "http://memory.ark-system.svc.cluster.local/v1/sessions"
        );
    }

    #[tokio::test]
    async fn is_idempotent() {
        let r = resolver();
        let vf = literal("stable");
        let a = r.resolve(&vf, "default").await.unwrap();
        let b = r.resolve(&vf, "default").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn caches_secret_lookups() {
        let r = resolver();
        let vf = ValueFrom {
            value_from: ValueSource::SecretRef {
                name: "creds".to_string(),
                key: "apiKey".to_string(),
            },
        };
        r.resolve(&vf, "default").await.unwrap();
        assert_eq!(r.cache.get("secret:default/creds#apiKey").await, Some("secret-creds-apiKey".to_string()));
    }
}
