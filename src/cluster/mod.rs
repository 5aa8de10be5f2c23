//! Cluster deployment: the worker RPC surface and the sentinel that fans
//! queries out across all registered workers.

pub mod convert;
pub mod sentinel;
pub mod worker;

// Include generated protobuf code
pub mod proto {
    tonic::include_proto!("krill.index");
}

/// Name under which index workers register themselves.
pub const INDEX_SERVICE: &str = "index_service";

pub use sentinel::Sentinel;
pub use worker::IndexWorker;
