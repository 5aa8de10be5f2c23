use std::path::PathBuf;

use crate::storage::StorageKind;

/// Configuration of one index worker / standalone node.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Estimated corpus size, used to pre-size the inverted index.
    pub doc_num_estimate: usize,
    pub storage: StorageKind,
    /// Base path of the forward-index data; sharded deployments append a
    /// `_part<index>` suffix per worker.
    pub data_dir: PathBuf,
    pub shard_index: u32,
    /// Heartbeat period in seconds; also the registration lease TTL.
    pub heartbeat_secs: i64,
    /// Token-bucket QPS of the discovery cache in front of the registry.
    pub discovery_qps: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            doc_num_estimate: 10_000,
            storage: StorageKind::BTree,
            data_dir: PathBuf::from("./data/forward"),
            shard_index: 0,
            heartbeat_secs: 3,
            discovery_qps: 100,
        }
    }
}

impl WorkerConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_shard_index(mut self, shard_index: u32) -> Self {
        self.shard_index = shard_index;
        self
    }

    pub fn with_doc_num_estimate(mut self, estimate: usize) -> Self {
        self.doc_num_estimate = estimate;
        self
    }

    /// Data directory of this shard: `<base>_part<index>`.
    pub fn shard_data_dir(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}_part{}",
            self.data_dir.display(),
            self.shard_index
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.doc_num_estimate, 10_000);
        assert_eq!(config.storage, StorageKind::BTree);
        assert_eq!(config.heartbeat_secs, 3);
    }

    #[test]
    fn test_builder_and_shard_dir() {
        let config = WorkerConfig::new(PathBuf::from("/tmp/krill/forward"))
            .with_storage(StorageKind::Lsm)
            .with_shard_index(2)
            .with_doc_num_estimate(500);
        assert_eq!(config.storage, StorageKind::Lsm);
        assert_eq!(config.doc_num_estimate, 500);
        assert_eq!(
            config.shard_data_dir(),
            PathBuf::from("/tmp/krill/forward_part2")
        );
    }
}
