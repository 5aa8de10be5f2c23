use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::error::Result;

use super::hub::{ServiceHub, ServiceRegistry};
use super::limiter::TokenBucket;

/// Caching, rate-limited front of the service registry.
///
/// Endpoint lists are cached on first lookup; a one-time watcher per service
/// keeps the cache coherent with the coordination store, refetching the full
/// list on every PUT/DELETE under the service prefix. Discovery calls pass
/// through a token bucket and fail closed (empty list) when it is drained.
pub struct RegistryProxy {
    registry: Arc<ServiceRegistry>,
    cache: Arc<DashMap<String, Vec<String>>>,
    watched: DashMap<String, ()>,
    limiter: TokenBucket,
}

impl RegistryProxy {
    pub fn new(registry: Arc<ServiceRegistry>, qps: u32) -> Self {
        Self {
            registry,
            cache: Arc::new(DashMap::new()),
            watched: DashMap::new(),
            limiter: TokenBucket::new(qps),
        }
    }

    /// Install the watcher for `service` once; it runs until the store
    /// closes its watch stream.
    async fn ensure_watcher(&self, service: &str) {
        if self.watched.insert(service.to_string(), ()).is_some() {
            return;
        }
        let prefix = ServiceRegistry::service_prefix(service);
        let rx = match self.registry.store().watch_prefix(&prefix).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(service, error = %e, "installing endpoint watcher failed");
                self.watched.remove(service);
                return;
            }
        };
        info!(prefix, "watching service endpoints");

        let registry = self.registry.clone();
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                let path: Vec<&str> = event.key.split('/').collect();
                if path.len() < 2 {
                    continue;
                }
                let service = path[path.len() - 2].to_string();
                let endpoints = registry.get_service_endpoints(&service).await;
                if endpoints.is_empty() {
                    cache.remove(&service);
                } else {
                    cache.insert(service, endpoints);
                }
            }
        });
    }
}

#[async_trait]
impl ServiceHub for RegistryProxy {
    async fn register_service(&self, service: &str, endpoint: &str, lease_id: i64) -> Result<i64> {
        self.registry
            .register_service(service, endpoint, lease_id)
            .await
    }

    async fn unregister_service(&self, service: &str, endpoint: &str) -> Result<()> {
        self.registry.unregister_service(service, endpoint).await
    }

    async fn get_service_endpoints(&self, service: &str) -> Vec<String> {
        if !self.limiter.allow() {
            return Vec::new();
        }
        self.ensure_watcher(service).await;

        if let Some(cached) = self.cache.get(service) {
            return cached.clone();
        }
        let endpoints = self.registry.get_service_endpoints(service).await;
        if !endpoints.is_empty() {
            self.cache.insert(service.to_string(), endpoints.clone());
        }
        endpoints
    }

    async fn get_service_endpoint(&self, service: &str) -> String {
        self.registry.get_service_endpoint(service).await
    }

    async fn close(&self) {
        self.registry.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::coord::MemCoordStore;
    use std::time::Duration;

    fn proxy(qps: u32) -> RegistryProxy {
        let store = Arc::new(MemCoordStore::new());
        RegistryProxy::new(Arc::new(ServiceRegistry::new(store, 3)), qps)
    }

    #[tokio::test]
    async fn test_lookup_populates_cache() {
        let proxy = proxy(100);
        proxy
            .register_service("search", "127.0.0.1:7001", 0)
            .await
            .unwrap();
        let endpoints = proxy.get_service_endpoints("search").await;
        assert_eq!(endpoints, vec!["127.0.0.1:7001"]);
        assert!(proxy.cache.contains_key("search"));
    }

    #[tokio::test]
    async fn test_watch_updates_cache_on_register_and_unregister() {
        let proxy = proxy(100);
        proxy
            .register_service("search", "127.0.0.1:7001", 0)
            .await
            .unwrap();
        // First lookup installs the watcher.
        assert_eq!(proxy.get_service_endpoints("search").await.len(), 1);

        proxy
            .register_service("search", "127.0.0.1:7002", 0)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(proxy.get_service_endpoints("search").await.len(), 2);

        proxy
            .unregister_service("search", "127.0.0.1:7001")
            .await
            .unwrap();
        proxy
            .unregister_service("search", "127.0.0.1:7002")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(proxy.get_service_endpoints("search").await.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_fails_closed() {
        let proxy = proxy(10);
        proxy
            .register_service("search", "127.0.0.1:7001", 0)
            .await
            .unwrap();
        let mut non_empty = 0;
        for _ in 0..15 {
            if !proxy.get_service_endpoints("search").await.is_empty() {
                non_empty += 1;
            }
        }
        assert!(non_empty <= 10, "{} lookups passed a bucket of 10", non_empty);
    }
}
