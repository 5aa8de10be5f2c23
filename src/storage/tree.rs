use std::path::{Path, PathBuf};

use crate::error::{KrillError, Result};

use super::KvStore;

// All entries live in one named tree, standing in for a single bucket.
const TREE_NAME: &str = "krill";

/// sled-backed store: a single-file-style B+tree with one named tree as the
/// logical container.
pub struct TreeStore {
    path: PathBuf,
    db: sled::Db,
    tree: sled::Tree,
}

impl TreeStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::Config::new().path(path).open()?;
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self {
            path: path.to_path_buf(),
            db,
            tree,
        })
    }
}

impl KvStore for TreeStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn batch_set(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (key, value) in keys.iter().zip(values.iter()) {
            batch.insert(key.as_slice(), value.as_slice());
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self.tree.get(key)? {
            Some(value) => Ok(value.to_vec()),
            None => Err(KrillError::NoData),
        }
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.tree.get(key)?.map(|v| v.to_vec()));
        }
        Ok(out)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for key in keys {
            batch.remove(key.as_slice());
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn has(&self, key: &[u8]) -> bool {
        self.tree.contains_key(key).unwrap_or(false)
    }

    fn iter_entries(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<u64> {
        let mut count = 0u64;
        for item in self.tree.iter() {
            let (key, value) = item?;
            f(&key, &value)?;
            count += 1;
        }
        Ok(count)
    }

    fn iter_keys(&self, f: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<u64> {
        let mut count = 0u64;
        for item in self.tree.iter() {
            let (key, _) = item?;
            f(&key)?;
            count += 1;
        }
        Ok(count)
    }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_sees_previous_writes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("forward");
        {
            let store = TreeStore::open(&path).unwrap();
            store.set(b"a", b"1").unwrap();
            store.close().unwrap();
        }
        let store = TreeStore::open(&path).unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
    }

    #[test]
    fn test_callback_error_stops_iteration() {
        let tmp = TempDir::new().unwrap();
        let store = TreeStore::open(&tmp.path().join("forward")).unwrap();
        for i in 0..5u8 {
            store.set(&[i], &[i]).unwrap();
        }
        let mut seen = 0;
        let result = store.iter_keys(&mut |_| {
            seen += 1;
            if seen == 2 {
                return Err(KrillError::InvalidRequest("stop".into()));
            }
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(seen, 2);
    }
}
