use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread;

use parking_lot::RwLock;

use super::ops;
use super::sharded_map::ShardedMap;
use super::skiplist::SkipList;
use crate::models::{BitsFilter, Document, Keyword, TermQuery};

// Per-term posting mutation is serialized by a fixed-size lock array; terms
// whose hashes collide mod this size share a lock.
const TERM_LOCK_COUNT: usize = 1000;

/// One entry of a term's posting list: the business-side document id and a
/// snapshot of the document's feature bits at insert time.
#[derive(Clone, Debug)]
pub struct Posting {
    pub doc_id: String,
    pub bits: u64,
}

type PostingList = Arc<RwLock<SkipList<Posting>>>;

/// Inverted index: term -> ordered skiplist of (int id -> posting).
///
/// The term table is a segmented concurrent map; the lock array guards the
/// get-or-create-then-insert window per term. Inserts for different terms of
/// the same document are not atomic as a group.
pub struct SkipListInvertedIndex {
    table: ShardedMap<PostingList>,
    locks: Vec<RwLock<()>>,
}

impl SkipListInvertedIndex {
    /// `doc_num_estimate` sizes the term table.
    pub fn new(doc_num_estimate: usize) -> Self {
        let segments = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        Self {
            table: ShardedMap::new(segments, doc_num_estimate),
            locks: (0..TERM_LOCK_COUNT).map(|_| RwLock::new(())).collect(),
        }
    }

    fn term_lock(&self, term: &str) -> &RwLock<()> {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % self.locks.len()]
    }

    /// Insert one posting per declared keyword of `doc`. An existing entry
    /// for the same int id under a term is overwritten.
    pub fn add(&self, doc: &Document) {
        for keyword in &doc.keywords {
            let term = keyword.to_term();
            if term.is_empty() {
                continue;
            }
            let posting = Posting {
                doc_id: doc.doc_id.clone(),
                bits: doc.bits,
            };
            let _guard = self.term_lock(&term).write();
            if let Some(list) = self.table.get(&term) {
                list.write().insert(doc.int_id, posting);
            } else {
                let mut list = SkipList::new();
                list.insert(doc.int_id, posting);
                self.table.insert(term, Arc::new(RwLock::new(list)));
            }
        }
    }

    /// Remove the posting for `int_id` under `keyword`, if present.
    pub fn delete(&self, keyword: &Keyword, int_id: u64) {
        let term = keyword.to_term();
        if term.is_empty() {
            return;
        }
        let _guard = self.term_lock(&term).write();
        if let Some(list) = self.table.get(&term) {
            list.write().remove(int_id);
        }
    }

    /// Evaluate the boolean tree with the bitmap post-filter and return the
    /// business ids of surviving postings in ascending int-id order.
    pub fn search(
        &self,
        query: &TermQuery,
        on_flag: u64,
        off_flag: u64,
        or_flags: &[u64],
    ) -> Vec<String> {
        let filter = BitsFilter::new(on_flag, off_flag, or_flags);
        let result = self.eval(query, &filter);
        result.iter().map(|(_, p)| p.doc_id.clone()).collect()
    }

    fn eval(&self, query: &TermQuery, filter: &BitsFilter) -> SkipList<Posting> {
        if let Some(keyword) = &query.keyword {
            let mut result = SkipList::new();
            let term = keyword.to_term();
            if let Some(list) = self.table.get(&term) {
                let guard = list.read();
                for (int_id, posting) in guard.iter() {
                    if int_id > 0 && filter.matches(posting.bits) {
                        result.insert(int_id, posting.clone());
                    }
                }
            }
            result
        } else if !query.must.is_empty() {
            ops::intersection_of(query.must.iter().map(|q| self.eval(q, filter)).collect())
        } else if !query.should.is_empty() {
            ops::union_of(query.should.iter().map(|q| self.eval(q, filter)).collect())
        } else {
            SkipList::new()
        }
    }

    /// Number of distinct terms currently indexed.
    pub fn term_count(&self) -> usize {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(doc_id: &str, int_id: u64, bits: u64, words: &[&str]) -> Document {
        Document {
            doc_id: doc_id.to_string(),
            int_id,
            bits,
            keywords: words.iter().map(|w| Keyword::new("content", *w)).collect(),
            payload: Vec::new(),
        }
    }

    fn leaf(word: &str) -> TermQuery {
        TermQuery::from_keyword("content", word)
    }

    #[test]
    fn test_add_and_leaf_search() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["go", "db"]));
        index.add(&doc("V2", 2, 0, &["go"]));
        assert_eq!(index.search(&leaf("db"), 0, 0, &[]), vec!["V1"]);
        assert_eq!(index.search(&leaf("go"), 0, 0, &[]), vec!["V1", "V2"]);
    }

    #[test]
    fn test_must_is_intersection() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["a", "b"]));
        index.add(&doc("V2", 2, 0, &["a"]));
        index.add(&doc("V3", 3, 0, &["b"]));
        let query = leaf("a").and(vec![leaf("b")]);
        assert_eq!(index.search(&query, 0, 0, &[]), vec!["V1"]);
    }

    #[test]
    fn test_should_is_union() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["a"]));
        index.add(&doc("V2", 2, 0, &["b"]));
        index.add(&doc("V3", 3, 0, &["a", "b"]));
        let query = leaf("a").or(vec![leaf("b")]);
        let mut ids = index.search(&query, 0, 0, &[]);
        ids.sort();
        assert_eq!(ids, vec!["V1", "V2", "V3"]);
    }

    #[test]
    fn test_empty_subresult_collapses_and() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["a"]));
        let query = leaf("a").and(vec![leaf("missing")]);
        assert!(index.search(&query, 0, 0, &[]).is_empty());
    }

    #[test]
    fn test_empty_subresult_discarded_in_or() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["a"]));
        let query = leaf("a").or(vec![leaf("missing")]);
        assert_eq!(index.search(&query, 0, 0, &[]), vec!["V1"]);
    }

    #[test]
    fn test_bitmap_post_filter() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0b0011, &["x"]));
        index.add(&doc("V2", 2, 0b0100, &["x"]));
        assert_eq!(index.search(&leaf("x"), 0b0001, 0, &[]), vec!["V1"]);
        assert_eq!(index.search(&leaf("x"), 0, 0b0001, &[]), vec!["V2"]);
        assert_eq!(
            index.search(&leaf("x"), 0, 0, &[0b0110]),
            vec!["V1", "V2"]
        );
    }

    #[test]
    fn test_zero_int_id_is_skipped() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V0", 0, 0, &["x"]));
        index.add(&doc("V1", 1, 0, &["x"]));
        assert_eq!(index.search(&leaf("x"), 0, 0, &[]), vec!["V1"]);
    }

    #[test]
    fn test_delete_posting() {
        let index = SkipListInvertedIndex::new(16);
        let d = doc("V1", 1, 0, &["x", "y"]);
        index.add(&d);
        index.delete(&Keyword::new("content", "x"), 1);
        assert!(index.search(&leaf("x"), 0, 0, &[]).is_empty());
        assert_eq!(index.search(&leaf("y"), 0, 0, &[]), vec!["V1"]);
    }

    #[test]
    fn test_empty_query_matches_nothing() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0, &["x"]));
        assert!(index.search(&TermQuery::default(), 0, 0, &[]).is_empty());
    }

    #[test]
    fn test_reinsert_same_int_id_overwrites_bits() {
        let index = SkipListInvertedIndex::new(16);
        index.add(&doc("V1", 1, 0b01, &["x"]));
        index.add(&doc("V1", 1, 0b10, &["x"]));
        assert!(index.search(&leaf("x"), 0b01, 0, &[]).is_empty());
        assert_eq!(index.search(&leaf("x"), 0b10, 0, &[]), vec!["V1"]);
    }
}
