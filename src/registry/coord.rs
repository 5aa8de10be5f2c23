use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{KrillError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// One change observed by a prefix watch, carrying the full key.
#[derive(Clone, Debug)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
}

/// Contract of the external coordination store backing the service registry:
/// key/value with prefix listing, TTL leases with single-shot keep-alive
/// (reporting a distinguishable lease-not-found), and streaming prefix
/// watches.
#[async_trait]
pub trait CoordStore: Send + Sync {
    /// Grant a lease with the given TTL, returning its id.
    async fn grant_lease(&self, ttl_secs: i64) -> Result<i64>;

    /// Refresh a lease once. `KrillError::LeaseNotFound` when the lease has
    /// expired or never existed.
    async fn keep_alive_once(&self, lease_id: i64) -> Result<()>;

    /// Put a key bound to a lease; the key expires with the lease.
    async fn put_with_lease(&self, key: &str, lease_id: i64) -> Result<()>;

    /// Delete the exact key.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All keys under the prefix.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Subscribe to PUT/DELETE events under the prefix. The stream ends when
    /// the store closes.
    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::UnboundedReceiver<WatchEvent>>;

    /// Release the client.
    async fn close(&self);
}

struct LeaseState {
    deadline: Instant,
    ttl: Duration,
}

struct Watcher {
    prefix: String,
    tx: mpsc::UnboundedSender<WatchEvent>,
}

#[derive(Default)]
struct MemInner {
    keys: HashMap<String, i64>,
    leases: HashMap<i64, LeaseState>,
    next_lease: i64,
    watchers: Vec<Watcher>,
}

/// In-process coordination store with the same lease and watch semantics as
/// the external one. Lease expiry is enforced lazily on each operation.
/// Used by tests and single-machine wiring.
#[derive(Default)]
pub struct MemCoordStore {
    inner: Mutex<MemInner>,
}

impl MemCoordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expire_stale(inner: &mut MemInner) {
        let now = Instant::now();
        let stale: Vec<i64> = inner
            .leases
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(&id, _)| id)
            .collect();
        for lease_id in stale {
            inner.leases.remove(&lease_id);
            let dropped: Vec<String> = inner
                .keys
                .iter()
                .filter(|(_, &l)| l == lease_id)
                .map(|(k, _)| k.clone())
                .collect();
            for key in dropped {
                inner.keys.remove(&key);
                Self::notify(inner, WatchEventKind::Delete, &key);
            }
        }
    }

    fn notify(inner: &mut MemInner, kind: WatchEventKind, key: &str) {
        inner.watchers.retain(|w| {
            if !key.starts_with(&w.prefix) {
                return true;
            }
            w.tx
                .send(WatchEvent {
                    kind,
                    key: key.to_string(),
                })
                .is_ok()
        });
    }
}

#[async_trait]
impl CoordStore for MemCoordStore {
    async fn grant_lease(&self, ttl_secs: i64) -> Result<i64> {
        let mut inner = self.inner.lock();
        Self::expire_stale(&mut inner);
        inner.next_lease += 1;
        let lease_id = inner.next_lease;
        let ttl = Duration::from_secs(ttl_secs.max(1) as u64);
        inner.leases.insert(
            lease_id,
            LeaseState {
                deadline: Instant::now() + ttl,
                ttl,
            },
        );
        Ok(lease_id)
    }

    async fn keep_alive_once(&self, lease_id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::expire_stale(&mut inner);
        match inner.leases.get_mut(&lease_id) {
            Some(lease) => {
                lease.deadline = Instant::now() + lease.ttl;
                Ok(())
            }
            None => Err(KrillError::LeaseNotFound),
        }
    }

    async fn put_with_lease(&self, key: &str, lease_id: i64) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::expire_stale(&mut inner);
        if !inner.leases.contains_key(&lease_id) {
            return Err(KrillError::LeaseNotFound);
        }
        inner.keys.insert(key.to_string(), lease_id);
        Self::notify(&mut inner, WatchEventKind::Put, key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::expire_stale(&mut inner);
        if inner.keys.remove(key).is_some() {
            Self::notify(&mut inner, WatchEventKind::Delete, key);
        }
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        Self::expire_stale(&mut inner);
        let mut keys: Vec<String> = inner
            .keys
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<mpsc::UnboundedReceiver<WatchEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().watchers.push(Watcher {
            prefix: prefix.to_string(),
            tx,
        });
        Ok(rx)
    }

    async fn close(&self) {
        // Dropping the senders ends every watch stream.
        self.inner.lock().watchers.clear();
    }
}
