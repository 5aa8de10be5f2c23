use std::path::{Path, PathBuf};

use fjall::{Database, Keyspace, KeyspaceCreateOptions};

use crate::error::{KrillError, Result};

use super::KvStore;

const ENTRIES_CF: &str = "entries";

/// fjall-backed store: an LSM tree whose logical container is a single
/// keyspace.
pub struct LsmStore {
    path: PathBuf,
    #[allow(dead_code)]
    db: Database,
    entries: Keyspace,
}

impl LsmStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::builder(path)
            .open()
            .map_err(|e| KrillError::Storage(format!("failed to open lsm store: {}", e)))?;
        let entries = db
            .keyspace(ENTRIES_CF, || KeyspaceCreateOptions::default())
            .map_err(|e| KrillError::Storage(format!("failed to open entries keyspace: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            db,
            entries,
        })
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        for kv in self.entries.iter() {
            let key = kv
                .key()
                .map_err(|e| KrillError::Storage(e.to_string()))?;
            out.push(key.as_ref().to_vec());
        }
        Ok(out)
    }
}

impl KvStore for LsmStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.entries
            .insert(key, value)
            .map_err(|e| KrillError::Storage(e.to_string()))?;
        Ok(())
    }

    fn batch_set(&self, keys: &[Vec<u8>], values: &[Vec<u8>]) -> Result<()> {
        for (key, value) in keys.iter().zip(values.iter()) {
            self.set(key, value)?;
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        match self
            .entries
            .get(key)
            .map_err(|e| KrillError::Storage(e.to_string()))?
        {
            Some(value) => Ok(value.as_ref().to_vec()),
            None => Err(KrillError::NoData),
        }
    }

    fn batch_get(&self, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let value = self
                .entries
                .get(key)
                .map_err(|e| KrillError::Storage(e.to_string()))?;
            out.push(value.map(|v| v.as_ref().to_vec()));
        }
        Ok(out)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.entries
            .remove(key)
            .map_err(|e| KrillError::Storage(e.to_string()))?;
        Ok(())
    }

    fn batch_delete(&self, keys: &[Vec<u8>]) -> Result<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    fn has(&self, key: &[u8]) -> bool {
        self.entries
            .get(key)
            .map(|v| v.is_some())
            .unwrap_or(false)
    }

    fn iter_entries(&self, f: &mut dyn FnMut(&[u8], &[u8]) -> Result<()>) -> Result<u64> {
        let mut count = 0u64;
        for key in self.keys()? {
            if let Some(value) = self
                .entries
                .get(&key)
                .map_err(|e| KrillError::Storage(e.to_string()))?
            {
                f(&key, value.as_ref())?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn iter_keys(&self, f: &mut dyn FnMut(&[u8]) -> Result<()>) -> Result<u64> {
        let mut count = 0u64;
        for key in self.keys()? {
            f(&key)?;
            count += 1;
        }
        Ok(count)
    }

    fn close(&self) -> Result<()> {
        // fjall flushes its journal on drop; nothing to release explicitly.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let tmp = TempDir::new().unwrap();
        let store = LsmStore::open(&tmp.path().join("forward")).unwrap();
        store.set(b"a", b"1").unwrap();
        assert_eq!(store.get(b"a").unwrap(), b"1");
        store.delete(b"a").unwrap();
        assert!(store.get(b"a").unwrap_err().is_no_data());
    }

    #[test]
    fn test_iteration_counts_entries() {
        let tmp = TempDir::new().unwrap();
        let store = LsmStore::open(&tmp.path().join("forward")).unwrap();
        for i in 0..4u8 {
            store.set(&[i], b"v").unwrap();
        }
        let visited = store.iter_entries(&mut |_, _| Ok(())).unwrap();
        assert_eq!(visited, 4);
    }
}
