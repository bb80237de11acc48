//! # Stream
//!
//! A named set of shards whose OPEN hash-key ranges tile `[0, 2^128)`.
//!
//! ## Locking
//!
//! - `topology` guards the shard set and routing index. Writers of records only
//!   hold it for the routing lookup; resharding holds it for writing while it
//!   closes parents and installs children.
//! - Each shard has its own log lock (see `shard`).
//! - `state` guards status flags, encryption and retention.
//!
//! A record routed to a shard that a concurrent split or merge has just closed
//! gets `ShardClosed` from the shard and is routed again against the new
//! topology. Since closing happens under the shard's own lock, every record
//! lands in exactly one shard.

mod description;
mod snapshot;
mod status;
mod topology;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::{StreamError, StreamResult};
use crate::hashing::{hash_partition_key, HashKey, HashKeyRange};
use crate::shard::{Record, Shard, ShardId};

pub use description::{SequenceNumberRange, ShardDescription, StreamDescription};
pub use snapshot::StreamSnapshot;
pub use status::{Encryption, StreamStatus};

use topology::Topology;

/// Upper bound on re-routing a single record across concurrent reshards
const MAX_ROUTE_ATTEMPTS: usize = 16;

/// Where a record went
#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub shard_id: ShardId,
    pub record: Record,
    /// Expired records dropped from the target shard by this append
    pub trimmed: usize,
}

/// What one retention sweep did
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub records_trimmed: usize,
    pub shards_retired: Vec<ShardId>,
}

#[derive(Debug)]
struct StreamState {
    updating: bool,
    deleting: bool,
    encryption: Encryption,
    retention: Duration,
}

/// Clears the UPDATING flag on every exit path of a reshard or settings change
struct UpdateGuard<'a> {
    state: &'a RwLock<StreamState>,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).updating = false;
    }
}

#[derive(Debug)]
pub struct Stream {
    name: String,
    incarnation: Uuid,
    created_at: DateTime<Utc>,
    /// Provisioning is modeled complete at this instant
    ready_at: DateTime<Utc>,
    state: RwLock<StreamState>,
    topology: RwLock<Topology>,
}

impl Stream {
    /// Build a stream with `shard_count` equal-width shards
    pub fn new(
        name: impl Into<String>,
        incarnation: Uuid,
        shard_count: u32,
        encryption: Encryption,
        retention: Duration,
        created_at: DateTime<Utc>,
        ready_at: DateTime<Utc>,
    ) -> StreamResult<Self> {
        let mut topology = Topology::new();
        for range in HashKeyRange::even_partition(shard_count)? {
            let id = topology.allocate_id();
            topology.insert(Shard::new(id, range, None, None, retention, created_at));
        }

        Ok(Self {
            name: name.into(),
            incarnation,
            created_at,
            ready_at,
            state: RwLock::new(StreamState {
                updating: false,
                deleting: false,
                encryption,
                retention,
            }),
            topology: RwLock::new(topology),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StreamState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StreamState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read_topology(&self) -> RwLockReadGuard<'_, Topology> {
        self.topology.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_topology(&self) -> RwLockWriteGuard<'_, Topology> {
        self.topology.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of this particular creation of the name; iterators carry it so
    /// that a deleted-then-recreated stream does not honor old tokens
    pub fn incarnation(&self) -> Uuid {
        self.incarnation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ready_at(&self) -> DateTime<Utc> {
        self.ready_at
    }

    pub fn status(&self, now: DateTime<Utc>) -> StreamStatus {
        let state = self.read_state();
        if state.deleting {
            StreamStatus::Deleting
        } else if now < self.ready_at {
            StreamStatus::Creating
        } else if state.updating {
            StreamStatus::Updating
        } else {
            StreamStatus::Active
        }
    }

    pub fn encryption(&self) -> Encryption {
        self.read_state().encryption.clone()
    }

    pub fn retention(&self) -> Duration {
        self.read_state().retention
    }

    pub fn open_shard_count(&self) -> usize {
        self.read_topology().open_count()
    }

    pub fn open_shard_ranges(&self) -> Vec<HashKeyRange> {
        self.read_topology().open_ranges()
    }

    /// The OPEN ranges tile the key space with no gap or overlap
    pub fn covers_key_space(&self) -> bool {
        HashKeyRange::covers_key_space(&self.open_shard_ranges())
    }

    pub(crate) fn mark_deleting(&self) {
        self.write_state().deleting = true;
    }

    pub(crate) fn is_deleting(&self) -> bool {
        self.read_state().deleting
    }

    /// Flip to UPDATING; only an ACTIVE stream can be restructured
    fn begin_update(&self, now: DateTime<Utc>) -> StreamResult<UpdateGuard<'_>> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.deleting {
            return Err(StreamError::StreamNotFound(self.name.clone()));
        }
        let status = if now < self.ready_at {
            Some(StreamStatus::Creating)
        } else if state.updating {
            Some(StreamStatus::Updating)
        } else {
            None
        };
        if let Some(status) = status {
            return Err(StreamError::StreamNotActive {
                name: self.name.clone(),
                status: status.to_string(),
            });
        }
        state.updating = true;
        Ok(UpdateGuard { state: &self.state })
    }

    pub fn shard(&self, shard_id: &ShardId) -> StreamResult<Arc<Shard>> {
        self.read_topology()
            .get(shard_id)
            .cloned()
            .ok_or_else(|| StreamError::shard_not_found(&self.name, shard_id.as_str()))
    }

    pub fn shard_ids(&self) -> Vec<ShardId> {
        self.read_topology()
            .shards()
            .map(|s| s.id().clone())
            .collect()
    }

    /// Partitioner: the OPEN shard whose range holds the key's hash.
    ///
    /// Pure in (topology, key). `NoOpenShard` means the topology is broken.
    pub fn route(&self, partition_key: &str) -> StreamResult<ShardId> {
        let hash = hash_partition_key(partition_key);
        self.route_hash(hash)
    }

    pub fn route_hash(&self, hash: HashKey) -> StreamResult<ShardId> {
        self.read_topology()
            .route(hash)
            .map(|shard| shard.id().clone())
            .ok_or_else(|| StreamError::NoOpenShard(hash.to_string()))
    }

    /// Append a record to the shard owning `partition_key`.
    ///
    /// `commit` runs under the target shard's lock once the record is built.
    pub fn put_record<F>(
        &self,
        partition_key: &str,
        data: &[u8],
        now: DateTime<Utc>,
        max_data_bytes: usize,
        commit: F,
    ) -> StreamResult<PutOutcome>
    where
        F: Fn(&ShardId, &Record) -> StreamResult<()>,
    {
        let status = self.status(now);
        if status == StreamStatus::Deleting {
            return Err(StreamError::StreamNotFound(self.name.clone()));
        }
        if !status.accepts_writes() {
            return Err(StreamError::StreamNotActive {
                name: self.name.clone(),
                status: status.to_string(),
            });
        }

        let hash = hash_partition_key(partition_key);
        for _ in 0..MAX_ROUTE_ATTEMPTS {
            let shard = self
                .read_topology()
                .route(hash)
                .cloned()
                .ok_or_else(|| StreamError::NoOpenShard(hash.to_string()))?;

            match shard.append(partition_key, data, now, max_data_bytes, |record| {
                commit(shard.id(), record)
            }) {
                Ok((record, trimmed)) => {
                    return Ok(PutOutcome {
                        shard_id: shard.id().clone(),
                        record,
                        trimmed,
                    })
                }
                // Closed by a concurrent reshard; route against the new topology
                Err(StreamError::ShardClosed(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(StreamError::NoOpenShard(hash.to_string()))
    }

    /// Put a journaled record back into its shard during replay
    pub(crate) fn restore_record(&self, shard_id: &ShardId, record: Record) -> StreamResult<()> {
        self.shard(shard_id)?.restore(record)
    }

    /// Close `shard_id` and replace it with two children split at
    /// `new_starting_hash_key`. Returns the (lower, upper) child ids.
    pub fn split_shard<F>(
        &self,
        shard_id: &ShardId,
        new_starting_hash_key: HashKey,
        now: DateTime<Utc>,
        max_open_shards: usize,
        commit: F,
    ) -> StreamResult<(ShardId, ShardId)>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        let _update = self.begin_update(now)?;
        let mut topology = self.write_topology();

        let parent = topology
            .get(shard_id)
            .cloned()
            .ok_or_else(|| StreamError::shard_not_found(&self.name, shard_id.as_str()))?;
        if topology.open_count() + 1 > max_open_shards {
            return Err(StreamError::InvalidArgument(format!(
                "split would exceed {} open shards",
                max_open_shards
            )));
        }

        let lower_id = topology.peek_id(0);
        let upper_id = topology.peek_id(1);
        let (lower, upper) = parent.split(
            new_starting_hash_key,
            lower_id.clone(),
            upper_id.clone(),
            now,
            commit,
        )?;

        topology.mark_closed(shard_id);
        topology.insert(lower);
        topology.insert(upper);
        Ok((lower_id, upper_id))
    }

    /// Close two adjacent shards and replace them with one child
    pub fn merge_shards<F>(
        &self,
        shard_id: &ShardId,
        adjacent_shard_id: &ShardId,
        now: DateTime<Utc>,
        commit: F,
    ) -> StreamResult<ShardId>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        let _update = self.begin_update(now)?;
        let mut topology = self.write_topology();

        let shard = topology
            .get(shard_id)
            .cloned()
            .ok_or_else(|| StreamError::shard_not_found(&self.name, shard_id.as_str()))?;
        let adjacent = topology
            .get(adjacent_shard_id)
            .cloned()
            .ok_or_else(|| StreamError::shard_not_found(&self.name, adjacent_shard_id.as_str()))?;

        let child_id = topology.peek_id(0);
        let child = shard.merge(&adjacent, child_id.clone(), now, commit)?;

        topology.mark_closed(shard_id);
        topology.mark_closed(adjacent_shard_id);
        topology.insert(child);
        Ok(child_id)
    }

    pub fn set_encryption<F>(
        &self,
        encryption: Encryption,
        now: DateTime<Utc>,
        commit: F,
    ) -> StreamResult<()>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        let _update = self.begin_update(now)?;
        commit()?;
        self.write_state().encryption = encryption;
        Ok(())
    }

    /// Change the retention window of the stream and every shard it holds
    pub fn set_retention<F>(&self, retention: Duration, now: DateTime<Utc>, commit: F) -> StreamResult<()>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        let _update = self.begin_update(now)?;
        commit()?;
        self.write_state().retention = retention;
        for shard in self.read_topology().shards() {
            shard.set_retention(retention);
        }
        Ok(())
    }

    /// Drop records past the retention window; shards stay where they are
    pub fn trim_expired(&self, now: DateTime<Utc>) -> usize {
        self.read_topology().shards().map(|s| s.trim(now)).sum()
    }

    /// Trim expired records everywhere and drop CLOSED shards that aged out
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let (records_trimmed, retired) = {
            let topology = self.read_topology();
            let trimmed = topology.shards().map(|s| s.trim(now)).sum();
            (trimmed, topology.retired(now))
        };

        if !retired.is_empty() {
            let mut topology = self.write_topology();
            for id in &retired {
                topology.remove(id);
            }
        }

        SweepReport {
            records_trimmed,
            shards_retired: retired,
        }
    }

    /// Shards created by splitting or merging `parent`
    pub fn child_shards(&self, parent: &ShardId) -> Vec<ShardDescription> {
        self.read_topology()
            .shards()
            .filter(|s| s.parent_shard_id() == Some(parent) || s.adjacent_parent_shard_id() == Some(parent))
            .map(|s| ShardDescription::of(s))
            .collect()
    }

    pub fn describe(&self, now: DateTime<Utc>) -> StreamDescription {
        let (encryption, retention) = {
            let state = self.read_state();
            (state.encryption.clone(), state.retention)
        };
        let shards = self
            .read_topology()
            .shards()
            .map(|s| ShardDescription::of(s))
            .collect();

        StreamDescription {
            stream_name: self.name.clone(),
            stream_status: self.status(now),
            encryption,
            retention_period_hours: retention.num_hours(),
            stream_creation_timestamp: self.created_at,
            shards,
        }
    }
}
