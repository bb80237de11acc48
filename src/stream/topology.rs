//! Shard topology of one stream and key routing.
//!
//! `open_by_start` indexes OPEN shards by the first key of their range. Because
//! OPEN ranges tile the key space, the shard owning a hash key is the entry with
//! the greatest start not above it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::hashing::{HashKey, HashKeyRange};
use crate::shard::{Shard, ShardId};

#[derive(Debug, Default)]
pub(crate) struct Topology {
    shards: BTreeMap<ShardId, Arc<Shard>>,
    open_by_start: BTreeMap<HashKey, ShardId>,
    next_index: u32,
}

impl Topology {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Id the next created shard will receive, `offset` places ahead
    pub(crate) fn peek_id(&self, offset: u32) -> ShardId {
        ShardId::from_index(self.next_index + offset)
    }

    /// Index the next created shard will receive
    pub(crate) fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Never hand out an index below `next_index`, even for retired shards
    pub(crate) fn reserve(&mut self, next_index: u32) {
        self.next_index = self.next_index.max(next_index);
    }

    pub(crate) fn allocate_id(&mut self) -> ShardId {
        let id = ShardId::from_index(self.next_index);
        self.next_index += 1;
        id
    }

    pub(crate) fn insert(&mut self, shard: Shard) {
        let id = shard.id().clone();
        if shard.is_open() {
            self.open_by_start
                .insert(shard.hash_key_range().starting_hash_key, id.clone());
        }
        if id.index() >= self.next_index {
            self.next_index = id.index() + 1;
        }
        self.shards.insert(id, Arc::new(shard));
    }

    /// Drop a shard from the routing index after it was closed
    pub(crate) fn mark_closed(&mut self, id: &ShardId) {
        if let Some(shard) = self.shards.get(id) {
            let start = shard.hash_key_range().starting_hash_key;
            if self.open_by_start.get(&start) == Some(id) {
                self.open_by_start.remove(&start);
            }
        }
    }

    pub(crate) fn get(&self, id: &ShardId) -> Option<&Arc<Shard>> {
        self.shards.get(id)
    }

    pub(crate) fn route(&self, hash: HashKey) -> Option<&Arc<Shard>> {
        let (_, id) = self.open_by_start.range(..=hash).next_back()?;
        self.shards
            .get(id)
            .filter(|shard| shard.hash_key_range().contains(hash))
    }

    pub(crate) fn shards(&self) -> impl Iterator<Item = &Arc<Shard>> {
        self.shards.values()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.open_by_start.len()
    }

    pub(crate) fn open_ranges(&self) -> Vec<HashKeyRange> {
        self.open_by_start
            .values()
            .filter_map(|id| self.shards.get(id))
            .map(|shard| shard.hash_key_range())
            .collect()
    }

    /// Ids of CLOSED shards whose records have all aged out
    pub(crate) fn retired(&self, now: DateTime<Utc>) -> Vec<ShardId> {
        self.shards
            .values()
            .filter(|shard| shard.is_retired(now))
            .map(|shard| shard.id().clone())
            .collect()
    }

    pub(crate) fn remove(&mut self, id: &ShardId) -> Option<Arc<Shard>> {
        self.mark_closed(id);
        self.shards.remove(id)
    }
}
