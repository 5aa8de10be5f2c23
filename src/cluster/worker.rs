use std::net::UdpSocket;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::error::{KrillError, Result};
use crate::indexer::LocalIndexer;
use crate::metrics::SearchMetrics;
use crate::models::TermQuery;
use crate::registry::{CoordStore, ServiceHub, ServiceRegistry};
use crate::storage::StorageKind;

use super::convert;
use super::proto;
use super::proto::index_service_server::IndexService;
use super::INDEX_SERVICE;

struct Registration {
    hub: Arc<ServiceRegistry>,
    endpoint: String,
    heartbeat: JoinHandle<()>,
}

/// RPC facade over one shard's local indexer. Registers itself with the
/// service registry and keeps its lease alive with a heartbeat task.
///
/// Cheap to clone; every clone serves the same indexer.
#[derive(Clone)]
pub struct IndexWorker {
    indexer: Arc<LocalIndexer>,
    metrics: SearchMetrics,
    registration: Arc<Mutex<Option<Registration>>>,
}

impl IndexWorker {
    pub fn open(doc_num_estimate: usize, kind: StorageKind, data_dir: &Path) -> Result<Self> {
        let indexer = LocalIndexer::open(doc_num_estimate, kind, data_dir)?;
        Ok(Self {
            indexer: Arc::new(indexer),
            metrics: SearchMetrics::default(),
            registration: Arc::new(Mutex::new(None)),
        })
    }

    pub fn indexer(&self) -> Arc<LocalIndexer> {
        self.indexer.clone()
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Rebuild the inverted index from the forward index on boot.
    pub fn load_from_index(&self) -> u32 {
        self.indexer.load_from_index()
    }

    /// Register this worker in the coordination store and spawn the
    /// heartbeat task. The heartbeat fires slightly ahead of the lease TTL
    /// and carries the lease id returned by each registration forward, so a
    /// lost lease re-registers once instead of every period.
    pub async fn register(
        &self,
        store: Arc<dyn CoordStore>,
        port: u16,
        heartbeat_secs: i64,
    ) -> Result<()> {
        if port <= 1024 {
            return Err(KrillError::InvalidRequest(format!(
                "invalid service port {}, must be above 1024",
                port
            )));
        }
        let ip = local_ip().unwrap_or_else(|_| "127.0.0.1".to_string());
        let endpoint = format!("{}:{}", ip, port);

        let hub = Arc::new(ServiceRegistry::new(store, heartbeat_secs));
        let lease = hub.register_service(INDEX_SERVICE, &endpoint, 0).await?;

        let period = Duration::from_secs(heartbeat_secs.max(1) as u64)
            .saturating_sub(Duration::from_millis(100));
        let heartbeat_hub = hub.clone();
        let heartbeat_endpoint = endpoint.clone();
        let heartbeat = tokio::spawn(async move {
            let mut lease = lease;
            loop {
                tokio::time::sleep(period).await;
                match heartbeat_hub
                    .register_service(INDEX_SERVICE, &heartbeat_endpoint, lease)
                    .await
                {
                    Ok(id) => lease = id,
                    Err(e) => {
                        warn!(endpoint = %heartbeat_endpoint, error = %e, "heartbeat failed");
                    }
                }
            }
        });

        info!(endpoint, "index worker registered");
        *self.registration.lock() = Some(Registration {
            hub,
            endpoint,
            heartbeat,
        });
        Ok(())
    }

    /// Unregister (when registered) and close the local indexer.
    pub async fn close(&self) -> Result<()> {
        let registration = self.registration.lock().take();
        if let Some(reg) = registration {
            reg.heartbeat.abort();
            if let Err(e) = reg.hub.unregister_service(INDEX_SERVICE, &reg.endpoint).await {
                warn!(endpoint = %reg.endpoint, error = %e, "unregistering worker failed");
            }
        }
        self.indexer.close()
    }
}

/// Local address as seen by the network, via a connected UDP socket. No
/// traffic is sent.
fn local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    Ok(socket.local_addr()?.ip().to_string())
}

#[tonic::async_trait]
impl IndexService for IndexWorker {
    async fn add_doc(
        &self,
        request: Request<proto::Document>,
    ) -> std::result::Result<Response<proto::AffectedCount>, Status> {
        let doc = convert::doc_from_proto(request.into_inner());
        let started = Instant::now();
        match self.indexer.add_doc(doc) {
            Ok(count) => {
                self.metrics.record_index(started.elapsed().as_secs_f64());
                self.metrics.set_total_documents(self.indexer.count() as u64);
                Ok(Response::new(proto::AffectedCount {
                    count: count as i32,
                }))
            }
            Err(KrillError::EmptyDocId) => {
                Err(Status::invalid_argument(KrillError::EmptyDocId.to_string()))
            }
            Err(e) => Err(Status::internal(e.to_string())),
        }
    }

    async fn delete_doc(
        &self,
        request: Request<proto::DocId>,
    ) -> std::result::Result<Response<proto::AffectedCount>, Status> {
        let doc_id = request.into_inner().doc_id;
        let count = self.indexer.delete_doc(&doc_id);
        if count > 0 {
            self.metrics.record_delete();
            self.metrics.set_total_documents(self.indexer.count() as u64);
        }
        Ok(Response::new(proto::AffectedCount {
            count: count as i32,
        }))
    }

    async fn search(
        &self,
        request: Request<proto::SearchRequest>,
    ) -> std::result::Result<Response<proto::SearchResult>, Status> {
        let request = request.into_inner();
        let query = request
            .query
            .map(convert::query_from_proto)
            .unwrap_or_else(TermQuery::default);
        let started = Instant::now();
        let docs = self.indexer.search(
            &query,
            request.on_flag,
            request.off_flag,
            &request.or_flags,
        );
        self.metrics.record_search(started.elapsed().as_secs_f64());
        Ok(Response::new(proto::SearchResult {
            results: docs.into_iter().map(convert::doc_to_proto).collect(),
        }))
    }

    async fn count(
        &self,
        _request: Request<proto::CountRequest>,
    ) -> std::result::Result<Response<proto::AffectedCount>, Status> {
        Ok(Response::new(proto::AffectedCount {
            count: self.indexer.count() as i32,
        }))
    }
}
