use async_trait::async_trait;
use etcd_client::{Client, EventType, GetOptions, PutOptions, WatchOptions};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{KrillError, Result};

use super::coord::{CoordStore, WatchEvent, WatchEventKind};

/// etcd-backed coordination store.
pub struct EtcdCoordStore {
    client: Client,
}

impl EtcdCoordStore {
    /// Connect to the etcd cluster. Failure here is a fatal configuration
    /// error for callers; there is no registry without the store.
    pub async fn connect(endpoints: &[String]) -> Result<Self> {
        let client = Client::connect(endpoints, None).await.map_err(|e| {
            KrillError::Registry(format!("failed to connect to coordination store: {}", e))
        })?;
        Ok(Self { client })
    }
}

fn registry_err(e: etcd_client::Error) -> KrillError {
    let text = e.to_string();
    if text.contains("lease not found") {
        KrillError::LeaseNotFound
    } else {
        KrillError::Registry(text)
    }
}

#[async_trait]
impl CoordStore for EtcdCoordStore {
    async fn grant_lease(&self, ttl_secs: i64) -> Result<i64> {
        let mut client = self.client.clone();
        let resp = client
            .lease_grant(ttl_secs, None)
            .await
            .map_err(registry_err)?;
        Ok(resp.id())
    }

    async fn keep_alive_once(&self, lease_id: i64) -> Result<()> {
        let mut client = self.client.clone();
        let (mut keeper, mut stream) = client
            .lease_keep_alive(lease_id)
            .await
            .map_err(registry_err)?;
        keeper.keep_alive().await.map_err(registry_err)?;
        match stream.message().await.map_err(registry_err)? {
            // etcd reports an expired lease as a keep-alive response with a
            // non-positive TTL rather than an error.
            Some(resp) if resp.ttl() > 0 => Ok(()),
            _ => Err(KrillError::LeaseNotFound),
        }
    }

    async fn put_with_lease(&self, key: &str, lease_id: i64) -> Result<()> {
        let mut client = self.client.clone();
        client
            .put(key, Vec::<u8>::new(), Some(PutOptions::new().with_lease(lease_id)))
            .await
            .map_err(registry_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut client = self.client.clone();
        client.delete(key, None).await.map_err(registry_err)?;
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut client = self.client.clone();
        let resp = client
            .get(prefix, Some(GetOptions::new().with_prefix()))
            .await
            .map_err(registry_err)?;
        let mut keys = Vec::with_capacity(resp.kvs().len());
        for kv in resp.kvs() {
            let key = kv.key_str().map_err(registry_err)?;
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::UnboundedReceiver<WatchEvent>> {
        let mut client = self.client.clone();
        let (watcher, mut stream) = client
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(registry_err)?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            // The watcher handle must stay alive for the stream to keep
            // delivering events.
            let _watcher = watcher;
            loop {
                let resp = match stream.message().await {
                    Ok(Some(resp)) => resp,
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = %e, "watch stream failed");
                        return;
                    }
                };
                for event in resp.events() {
                    let Some(kv) = event.kv() else {
                        continue;
                    };
                    let Ok(key) = kv.key_str() else {
                        continue;
                    };
                    let kind = match event.event_type() {
                        EventType::Put => WatchEventKind::Put,
                        EventType::Delete => WatchEventKind::Delete,
                    };
                    let event = WatchEvent {
                        kind,
                        key: key.to_string(),
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn close(&self) {
        // The client releases its connections on drop.
    }
}
