use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

/// String-keyed concurrent map, sharded by key hash across N segments with a
/// read-write lock per segment.
pub struct ShardedMap<V> {
    shards: Vec<RwLock<HashMap<String, V>>>,
}

impl<V: Clone> ShardedMap<V> {
    /// `segments` small maps, pre-sized for `capacity` entries in total.
    pub fn new(segments: usize, capacity: usize) -> Self {
        let segments = segments.max(1);
        let per_shard = capacity / segments;
        let shards = (0..segments)
            .map(|_| RwLock::new(HashMap::with_capacity(per_shard)))
            .collect();
        Self { shards }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    pub fn insert(&self, key: String, value: V) {
        let shard = &self.shards[self.shard_index(&key)];
        shard.write().insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let shard = &self.shards[self.shard_index(key)];
        shard.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let shard = &self.shards[self.shard_index(key)];
        shard.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let shard = &self.shards[self.shard_index(key)];
        shard.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot iterator: fixes the key set per segment up front, then looks
    /// each key up on demand. Entries removed after the snapshot are skipped.
    pub fn iter(&self) -> ShardedMapIter<'_, V> {
        let keys = self
            .shards
            .iter()
            .map(|s| s.read().keys().cloned().collect())
            .collect();
        ShardedMapIter {
            map: self,
            keys,
            row: 0,
            col: 0,
        }
    }
}

pub struct ShardedMapIter<'a, V> {
    map: &'a ShardedMap<V>,
    keys: Vec<Vec<String>>,
    row: usize,
    col: usize,
}

impl<'a, V: Clone> Iterator for ShardedMapIter<'a, V> {
    type Item = (String, V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.row < self.keys.len() {
            let row = &self.keys[self.row];
            if self.col >= row.len() {
                self.row += 1;
                self.col = 0;
                continue;
            }
            let key = row[self.col].clone();
            self.col += 1;
            if let Some(value) = self.map.get(&key) {
                return Some((key, value));
            }
        }
        None
    }
}
