pub mod cluster;
pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod storage;

pub use cluster::{IndexWorker, Sentinel, INDEX_SERVICE};
pub use config::WorkerConfig;
pub use error::{KrillError, Result};
pub use indexer::{Indexer, LocalIndexer};
pub use metrics::SearchMetrics;
pub use models::*;
pub use registry::{
    CoordStore, EtcdCoordStore, LoadBalancer, MemCoordStore, RandomSelect, RegistryProxy,
    RoundRobin, ServiceHub, ServiceRegistry, TokenBucket,
};
pub use storage::{open_kv, KvStore, StorageKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
