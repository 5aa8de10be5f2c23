//! Pluggable embedded key/value backends for the forward index.

pub mod lsm;
pub mod tree;

use std::path::Path;

use tracing::warn;

use crate::error::Result;

pub use lsm::LsmStore;
pub use tree::TreeStore;

/// Backend selector for the forward-index store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    /// Single-file B+tree backend (sled).
    BTree,
    /// LSM-tree backend (fjall).
    Lsm,
}

/// Embedded key/value store contract shared by all backends.
///
/// `get` on a missing key returns the distinguished `KrillError::NoData`.
/// `batch_get` returns results in input order with `None` for missing keys;
/// callers must tolerate misses either way. The iteration callbacks may
/// return an error to stop early, which is propagated; otherwise the count
/// of visited entries is returned.
pub trait KvStore: Send + Sync {
    fn path(&self) -> &Path;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;
    fn batch_set(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<()>;

    fn get(&self, key: &[u8]) -> Result<Vec<u8>>;
    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>>;

    fn delete(&self, key: &[u8]) -> Result<()>;
    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()>;

    fn has(&self, key: &[u8]) -> bool;

    fn iter_entries(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<u64>;
    fn iter_keys(&self, f: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<u64>;

    /// Flush buffered writes and release file locks.
    fn close(&self) -> Result<()>;
}

/// Factory for `KvStore` backends.
///
/// Ensures the parent directory of `path` exists. If the parent path exists
/// as a regular file it is removed and recreated as a directory.
pub fn open_kv(kind: StorageKind, path: &Path) -> Result<Box<dyn KvStore>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            match std::fs::metadata(parent) {
                Ok(meta) if meta.is_file() => {
                    warn!(path = %parent.display(), "parent path is a regular file, replacing it with a directory");
                    std::fs::remove_file(parent)?;
                    std::fs::create_dir_all(parent)?;
                }
                Ok(_) => {}
                Err(_) => {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
    }
    match kind {
        StorageKind::BTree => Ok(Box::new(TreeStore::open(path)?)),
        StorageKind::Lsm => Ok(Box::new(LsmStore::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_factory_replaces_regular_file_parent() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("data");
        std::fs::write(&parent, b"not a directory").unwrap();

        let db_path = parent.join("forward");
        let store = open_kv(StorageKind::BTree, &db_path).unwrap();
        assert!(parent.is_dir());
        store.close().unwrap();
    }

    #[test]
    fn test_factory_creates_missing_parent() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("a/b/forward");
        let store = open_kv(StorageKind::BTree, &db_path).unwrap();
        assert!(tmp.path().join("a/b").is_dir());
        store.close().unwrap();
    }

    // The shared contract, run against both backends.
    fn exercise_contract(store: Box<dyn KvStore>) {
        store.set(b"k1", b"v1").unwrap();
        store.set(b"k2", b"v2").unwrap();
        assert_eq!(store.get(b"k1").unwrap(), b"v1");
        assert!(store.get(b"missing").unwrap_err().is_no_data());
        assert!(store.has(b"k2"));
        assert!(!store.has(b"missing"));

        store
            .batch_set(
                &[b"k3".to_vec(), b"k4".to_vec()],
                &[b"v3".to_vec(), b"v4".to_vec()],
            )
            .unwrap();
        let values = store
            .batch_get(&[b"k3".to_vec(), b"missing".to_vec(), b"k4".to_vec()])
            .unwrap();
        assert_eq!(values[0].as_deref(), Some(b"v3".as_slice()));
        assert!(values[1].is_none());
        assert_eq!(values[2].as_deref(), Some(b"v4".as_slice()));

        let mut count = 0;
        let visited = store
            .iter_entries(&mut |_k, v| {
                assert!(!v.is_empty());
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 4);
        assert_eq!(count, 4);

        store.delete(b"k1").unwrap();
        assert!(!store.has(b"k1"));
        store.batch_delete(&[b"k2".to_vec(), b"k3".to_vec()]).unwrap();

        let mut keys = Vec::new();
        let visited = store
            .iter_keys(&mut |k| {
                keys.push(k.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 1);
        assert_eq!(keys, vec![b"k4".to_vec()]);

        store.close().unwrap();
    }

    #[test]
    fn test_btree_backend_contract() {
        let tmp = TempDir::new().unwrap();
        let store = open_kv(StorageKind::BTree, &tmp.path().join("t/forward")).unwrap();
        exercise_contract(store);
    }

    #[test]
    fn test_lsm_backend_contract() {
        let tmp = TempDir::new().unwrap();
        let store = open_kv(StorageKind::Lsm, &tmp.path().join("l/forward")).unwrap();
        exercise_contract(store);
    }
}
