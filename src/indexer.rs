//! Local document lifecycle controller: composes the persistent forward
//! index with the in-memory inverted index and keeps them coherent.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use tracing::{info, warn};

use crate::error::{KrillError, Result};
use crate::index::SkipListInvertedIndex;
use crate::models::{Document, TermQuery};
use crate::storage::{open_kv, KvStore, StorageKind};

/// Capability shared by the local indexer and the cluster sentinel, so
/// front-ends are agnostic about standalone vs. distributed deployment.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn add_doc(&self, doc: Document) -> Result<u32>;
    async fn delete_doc(&self, doc_id: &str) -> u32;
    async fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<Document>;
    async fn count(&self) -> u32;
    async fn close(&self) -> Result<()>;
}

/// Facade over forward + inverted index for one shard.
///
/// The forward index is the source of truth for document existence; the
/// inverted index is a derived structure rebuilt on restart via
/// `load_from_index`.
pub struct LocalIndexer {
    forward: Box<dyn KvStore>,
    inverted: SkipListInvertedIndex,
    max_int_id: AtomicU64,
}

impl LocalIndexer {
    /// Open the forward-index backend at `data_dir` and a fresh inverted
    /// index sized for `doc_num_estimate` documents.
    pub fn open(doc_num_estimate: usize, kind: StorageKind, data_dir: &Path) -> Result<Self> {
        let forward = open_kv(kind, data_dir)?;
        Ok(Self {
            forward,
            inverted: SkipListInvertedIndex::new(doc_num_estimate),
            max_int_id: AtomicU64::new(0),
        })
    }

    /// Add a document, replacing any prior version with the same business
    /// id. Returns the number of documents written (1).
    pub fn add_doc(&self, mut doc: Document) -> Result<u32> {
        let doc_id = doc.doc_id.trim().to_string();
        if doc_id.is_empty() {
            return Err(KrillError::EmptyDocId);
        }
        doc.doc_id = doc_id;

        // Purge the previous version before inserting; int ids are never
        // reused, so the new version always sorts after the old one did.
        self.delete_doc(&doc.doc_id);

        doc.int_id = self.max_int_id.fetch_add(1, Ordering::SeqCst) + 1;

        let bytes = doc.encode()?;
        self.forward.set(doc.doc_id.as_bytes(), &bytes)?;
        self.inverted.add(&doc);
        Ok(1)
    }

    /// Delete by business id. Returns the number of documents removed.
    pub fn delete_doc(&self, doc_id: &str) -> u32 {
        let doc_id = doc_id.trim();
        if doc_id.is_empty() {
            return 0;
        }
        let bytes = match self.forward.get(doc_id.as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) => {
                if !e.is_no_data() {
                    warn!(doc_id, error = %e, "reading document for delete failed");
                }
                return 0;
            }
        };
        let doc = match Document::decode(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(doc_id, error = %e, "decoding document for delete failed");
                return 0;
            }
        };
        for keyword in &doc.keywords {
            self.inverted.delete(keyword, doc.int_id);
        }
        if let Err(e) = self.forward.delete(doc_id.as_bytes()) {
            warn!(doc_id, error = %e, "deleting forward entry failed");
            return 0;
        }
        1
    }

    /// Evaluate the query against the inverted index and materialize the
    /// surviving documents from the forward index. Records that fail to
    /// decode are skipped.
    pub fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<Document> {
        let doc_ids = self.inverted.search(query, on_flag, off_flag, or_flags);
        if doc_ids.is_empty() {
            return Vec::new();
        }
        let keys: Vec<Vec<u8>> = doc_ids.iter().map(|id| id.as_bytes().to_vec()).collect();
        let values = match self.forward.batch_get(&keys) {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "batch get from forward index failed");
                return Vec::new();
            }
        };
        values
            .into_iter()
            .flatten()
            .filter_map(|bytes| match Document::decode(&bytes) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    warn!(error = %e, "skipping undecodable forward entry");
                    None
                }
            })
            .collect()
    }

    /// Number of live documents, counted from the forward index.
    pub fn count(&self) -> u32 {
        match self.forward.iter_keys(&mut |_| Ok(())) {
            Ok(n) => n as u32,
            Err(e) => {
                warn!(error = %e, "iterating forward keys failed");
                0
            }
        }
    }

    /// Rebuild inverted postings from the forward index after a restart.
    /// Also advances the int-id counter past the maximum loaded id so later
    /// writes cannot collide with restored ordering. Returns the number of
    /// documents loaded.
    pub fn load_from_index(&self) -> u32 {
        let mut loaded = 0u32;
        let mut max_seen = 0u64;
        let result = self.forward.iter_entries(&mut |_key, value| {
            match Document::decode(value) {
                Ok(doc) => {
                    max_seen = max_seen.max(doc.int_id);
                    self.inverted.add(&doc);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(error = %e, "skipping undecodable forward entry");
                }
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(error = %e, "loading from forward index failed");
            return 0;
        }
        self.max_int_id.fetch_max(max_seen, Ordering::SeqCst);
        info!(loaded, "loaded documents from forward index");
        loaded
    }

    /// Close the forward-index backend. The inverted index is in-memory
    /// and needs no explicit shutdown.
    pub fn close(&self) -> Result<()> {
        self.forward.close()
    }
}

#[async_trait]
impl Indexer for LocalIndexer {
    async fn add_doc(&self, doc: Document) -> Result<u32> {
        LocalIndexer::add_doc(self, doc)
    }

    async fn delete_doc(&self, doc_id: &str) -> u32 {
        LocalIndexer::delete_doc(self, doc_id)
    }

    async fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<Document> {
        LocalIndexer::search(self, query, on_flag, off_flag, or_flags)
    }

    async fn count(&self) -> u32 {
        LocalIndexer::count(self)
    }

    async fn close(&self) -> Result<()> {
        LocalIndexer::close(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Keyword;
    use tempfile::TempDir;

    fn open_indexer(tmp: &TempDir) -> LocalIndexer {
        LocalIndexer::open(64, StorageKind::BTree, &tmp.path().join("forward")).unwrap()
    }

    #[test]
    fn test_blank_doc_id_rejected() {
        let tmp = TempDir::new().unwrap();
        let indexer = open_indexer(&tmp);
        let doc = Document {
            doc_id: "   ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            indexer.add_doc(doc),
            Err(KrillError::EmptyDocId)
        ));
        assert_eq!(indexer.count(), 0);
    }

    #[test]
    fn test_doc_id_is_trimmed() {
        let tmp = TempDir::new().unwrap();
        let indexer = open_indexer(&tmp);
        let doc = Document {
            doc_id: " V1 ".to_string(),
            keywords: vec![Keyword::new("content", "go")],
            ..Default::default()
        };
        indexer.add_doc(doc).unwrap();
        assert_eq!(indexer.delete_doc("V1"), 1);
    }

    #[test]
    fn test_delete_missing_returns_zero() {
        let tmp = TempDir::new().unwrap();
        let indexer = open_indexer(&tmp);
        assert_eq!(indexer.delete_doc("nope"), 0);
    }

    #[test]
    fn test_int_ids_are_monotonic() {
        let tmp = TempDir::new().unwrap();
        let indexer = open_indexer(&tmp);
        for i in 0..5 {
            let doc = Document {
                doc_id: format!("V{}", i),
                keywords: vec![Keyword::new("content", "x")],
                ..Default::default()
            };
            indexer.add_doc(doc).unwrap();
        }
        let docs = indexer.search(&TermQuery::from_keyword("content", "x"), 0, 0, &[]);
        let mut ids: Vec<u64> = docs.iter().map(|d| d.int_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
