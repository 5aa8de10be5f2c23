//! In-memory inverted index: a segmented concurrent term table whose values
//! are ordered skiplists of postings, plus the set algebra used by boolean
//! query evaluation.

pub mod inverted;
pub mod ops;
pub mod sharded_map;
pub mod skiplist;

pub use inverted::{Posting, SkipListInvertedIndex};
pub use ops::{intersection_of, union_of};
pub use sharded_map::ShardedMap;
pub use skiplist::SkipList;
