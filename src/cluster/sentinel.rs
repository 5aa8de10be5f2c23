use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use crate::error::{KrillError, Result};
use crate::indexer::Indexer;
use crate::models::{Document, TermQuery};
use crate::registry::{RegistryProxy, ServiceHub};

use super::convert;
use super::proto;
use super::proto::index_service_client::IndexServiceClient;
use super::INDEX_SERVICE;

const DIAL_TIMEOUT: Duration = Duration::from_millis(200);
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
// Fan-out results are merged through a bounded channel of this capacity.
const RESULT_CHANNEL_CAPACITY: usize = 1000;

/// Cluster front-end: routes writes to one worker via the load balancer and
/// fans reads out to every registered worker, merging the results.
///
/// Every outbound RPC carries the configured call deadline: it is enforced
/// on the client channel and stamped on the request so the worker observes
/// it too. An expired deadline surfaces as an RPC failure.
///
/// Cheap to clone; the connection pool and proxy are shared.
#[derive(Clone)]
pub struct Sentinel {
    hub: Arc<RegistryProxy>,
    conn_pool: Arc<DashMap<String, IndexServiceClient<Channel>>>,
    call_timeout: Duration,
}

impl Sentinel {
    pub fn new(hub: Arc<RegistryProxy>) -> Self {
        Self {
            hub,
            conn_pool: Arc::new(DashMap::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the deadline applied to every outbound call.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Obtain-or-create the pooled connection for an endpoint. Dialing
    /// blocks on the handshake so the timeout actually bounds it.
    async fn get_client(&self, endpoint: &str) -> Result<IndexServiceClient<Channel>> {
        if let Some(client) = self.conn_pool.get(endpoint) {
            return Ok(client.clone());
        }
        let channel = Endpoint::from_shared(format!("http://{}", endpoint))?
            .connect_timeout(DIAL_TIMEOUT)
            .timeout(self.call_timeout)
            .connect()
            .await?;
        let client = IndexServiceClient::new(channel);
        self.conn_pool.insert(endpoint.to_string(), client.clone());
        info!(endpoint, "connected to index worker");
        Ok(client)
    }

    /// Wrap a message with the call deadline; tonic forwards it to the
    /// worker as the gRPC timeout header.
    fn request_with_deadline<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.call_timeout);
        request
    }

    /// Evict a pooled connection after a failed call; the next use re-dials.
    fn drop_client(&self, endpoint: &str) {
        self.conn_pool.remove(endpoint);
    }

    /// Route the document to one worker picked by the load balancer.
    pub async fn add_doc(&self, doc: Document) -> Result<u32> {
        let endpoint = self.hub.get_service_endpoint(INDEX_SERVICE).await;
        if endpoint.is_empty() {
            return Err(KrillError::NoEndpoints(INDEX_SERVICE.to_string()));
        }
        let mut client = self.get_client(&endpoint).await?;
        let request = self.request_with_deadline(convert::doc_to_proto(doc));
        match client.add_doc(request).await {
            Ok(resp) => {
                let count = resp.into_inner().count.max(0) as u32;
                info!(endpoint, count, "added document via worker");
                Ok(count)
            }
            Err(status) => {
                self.drop_client(&endpoint);
                Err(status.into())
            }
        }
    }

    /// Delete on every worker in parallel; in steady state at most one of
    /// them holds the document.
    pub async fn delete_doc(&self, doc_id: &str) -> u32 {
        let endpoints = self.hub.get_service_endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return 0;
        }
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let sentinel = self.clone();
            let doc_id = doc_id.to_string();
            tasks.push(tokio::spawn(async move {
                let mut client = match sentinel.get_client(&endpoint).await {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(endpoint, error = %e, "connecting to worker failed");
                        return 0u32;
                    }
                };
                let request = sentinel.request_with_deadline(proto::DocId { doc_id });
                match client.delete_doc(request).await {
                    Ok(resp) => resp.into_inner().count.max(0) as u32,
                    Err(status) => {
                        warn!(endpoint, error = %status, "delete on worker failed");
                        sentinel.drop_client(&endpoint);
                        0
                    }
                }
            }));
        }
        let mut total = 0u32;
        for task in tasks {
            total += task.await.unwrap_or(0);
        }
        total
    }

    /// Search every worker in parallel and return the merged, unordered
    /// union of the surviving shards' results.
    pub async fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<Document> {
        let endpoints = self.hub.get_service_endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::channel::<Document>(RESULT_CHANNEL_CAPACITY);
        let collector = tokio::spawn(async move {
            let mut docs = Vec::with_capacity(RESULT_CHANNEL_CAPACITY);
            while let Some(doc) = rx.recv().await {
                docs.push(doc);
            }
            docs
        });

        let request = proto::SearchRequest {
            query: Some(convert::query_to_proto(query)),
            on_flag,
            off_flag,
            or_flags: or_flags.to_vec(),
        };

        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let sentinel = self.clone();
            let request = request.clone();
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                let mut client = match sentinel.get_client(&endpoint).await {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(endpoint, error = %e, "connecting to worker failed");
                        return;
                    }
                };
                let request = sentinel.request_with_deadline(request);
                let results = match client.search(request).await {
                    Ok(resp) => resp.into_inner().results,
                    Err(status) => {
                        warn!(endpoint, error = %status, "search on worker failed");
                        sentinel.drop_client(&endpoint);
                        return;
                    }
                };
                for doc in results {
                    if tx.send(convert::doc_from_proto(doc)).await.is_err() {
                        return;
                    }
                }
            }));
        }
        // The collector only finishes once every sender clone is gone.
        drop(tx);
        for task in tasks {
            let _ = task.await;
        }
        collector.await.unwrap_or_default()
    }

    /// Sum of the document counts of every reachable worker.
    pub async fn count(&self) -> u32 {
        let endpoints = self.hub.get_service_endpoints(INDEX_SERVICE).await;
        if endpoints.is_empty() {
            return 0;
        }
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let sentinel = self.clone();
            tasks.push(tokio::spawn(async move {
                let mut client = match sentinel.get_client(&endpoint).await {
                    Ok(client) => client,
                    Err(e) => {
                        warn!(endpoint, error = %e, "connecting to worker failed");
                        return 0u32;
                    }
                };
                let request = sentinel.request_with_deadline(proto::CountRequest {});
                match client.count(request).await {
                    Ok(resp) => resp.into_inner().count.max(0) as u32,
                    Err(status) => {
                        warn!(endpoint, error = %status, "count on worker failed");
                        sentinel.drop_client(&endpoint);
                        0
                    }
                }
            }));
        }
        let mut total = 0u32;
        for task in tasks {
            total += task.await.unwrap_or(0);
        }
        total
    }

    /// Drop every pooled connection and close the registry proxy.
    pub async fn close(&self) -> Result<()> {
        self.conn_pool.clear();
        self.hub.close().await;
        Ok(())
    }
}

#[async_trait]
impl Indexer for Sentinel {
    async fn add_doc(&self, doc: Document) -> Result<u32> {
        Sentinel::add_doc(self, doc).await
    }

    async fn delete_doc(&self, doc_id: &str) -> u32 {
        Sentinel::delete_doc(self, doc_id).await
    }

    async fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<Document> {
        Sentinel::search(self, query, on_flag, off_flag, or_flags).await
    }

    async fn count(&self) -> u32 {
        Sentinel::count(self).await
    }

    async fn close(&self) -> Result<()> {
        Sentinel::close(self).await
    }
}
