use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;

use super::balancer::{LoadBalancer, RoundRobin};
use super::coord::CoordStore;

/// Prefix of every registration key in the coordination store.
pub const SERVICE_ROOT_PATH: &str = "/krill";

/// Service-discovery capability: registration with lease heartbeats,
/// unregistration, and endpoint lookup. Implemented by `ServiceRegistry`
/// and by `RegistryProxy` in front of it.
#[async_trait]
pub trait ServiceHub: Send + Sync {
    /// Register `service` at `endpoint`. A non-positive `lease_id` performs
    /// a first registration (grant + put); a positive one refreshes the
    /// lease, falling back to a fresh registration when the lease is gone.
    /// Returns the lease id to use for the next heartbeat.
    async fn register_service(&self, service: &str, endpoint: &str, lease_id: i64) -> Result<i64>;

    async fn unregister_service(&self, service: &str, endpoint: &str) -> Result<()>;

    /// All live endpoints of the service. Lookup failures yield an empty
    /// list.
    async fn get_service_endpoints(&self, service: &str) -> Vec<String>;

    /// One endpoint picked by the load balancer; empty string when none.
    async fn get_service_endpoint(&self, service: &str) -> String;

    async fn close(&self);
}

/// Lease-backed registry client over a coordination store.
pub struct ServiceRegistry {
    store: Arc<dyn CoordStore>,
    heartbeat_secs: i64,
    balancer: Box<dyn LoadBalancer>,
}

impl ServiceRegistry {
    /// `heartbeat_secs` doubles as the lease TTL: a worker that misses its
    /// heartbeat past the TTL disappears from the store automatically.
    pub fn new(store: Arc<dyn CoordStore>, heartbeat_secs: i64) -> Self {
        Self {
            store,
            heartbeat_secs,
            balancer: Box::new(RoundRobin::default()),
        }
    }

    pub fn with_balancer(mut self, balancer: Box<dyn LoadBalancer>) -> Self {
        self.balancer = balancer;
        self
    }

    pub fn heartbeat_secs(&self) -> i64 {
        self.heartbeat_secs
    }

    pub(crate) fn store(&self) -> Arc<dyn CoordStore> {
        self.store.clone()
    }

    fn service_key(service: &str, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            SERVICE_ROOT_PATH.trim_end_matches('/'),
            service,
            endpoint
        )
    }

    pub(crate) fn service_prefix(service: &str) -> String {
        format!("{}/{}/", SERVICE_ROOT_PATH.trim_end_matches('/'), service)
    }
}

#[async_trait]
impl ServiceHub for ServiceRegistry {
    async fn register_service(&self, service: &str, endpoint: &str, lease_id: i64) -> Result<i64> {
        let mut lease_id = lease_id;
        loop {
            if lease_id <= 0 {
                let granted = self.store.grant_lease(self.heartbeat_secs).await?;
                let key = Self::service_key(service, endpoint);
                self.store.put_with_lease(&key, granted).await?;
                info!(key, lease_id = granted, "registered service");
                return Ok(granted);
            }
            match self.store.keep_alive_once(lease_id).await {
                Ok(()) => return Ok(lease_id),
                Err(e) if e.is_lease_not_found() => {
                    info!(service, endpoint, "lease not found, re-registering");
                    lease_id = 0;
                }
                Err(e) => {
                    warn!(service, endpoint, error = %e, "lease keep-alive failed");
                    return Err(e);
                }
            }
        }
    }

    async fn unregister_service(&self, service: &str, endpoint: &str) -> Result<()> {
        let key = Self::service_key(service, endpoint);
        self.store.delete(&key).await?;
        info!(key, "unregistered service");
        Ok(())
    }

    async fn get_service_endpoints(&self, service: &str) -> Vec<String> {
        let prefix = Self::service_prefix(service);
        let keys = match self.store.list_prefix(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(service, error = %e, "listing service endpoints failed");
                return Vec::new();
            }
        };
        keys.iter()
            .filter_map(|key| key.split('/').last())
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .collect()
    }

    async fn get_service_endpoint(&self, service: &str) -> String {
        let endpoints = self.get_service_endpoints(service).await;
        self.balancer.take(&endpoints)
    }

    async fn close(&self) {
        self.store.close().await;
    }
}
