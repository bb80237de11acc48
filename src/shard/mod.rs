//! # Shard
//!
//! An append-only, bounded-retention log of records.
//!
//! ## Concurrency
//!
//! Appends take the shard's write lock, so sequence allocation is linearizable:
//! numbers are strictly increasing with no gaps. Reads take the read lock only
//! long enough to copy out a batch, so a read is a snapshot of the log at the
//! time of the call.
//!
//! ## Retention
//!
//! Records whose arrival time is older than the retention window are logically
//! gone as soon as the window passes; they are physically dropped by the next
//! append or `trim`. Reads evaluate the window themselves and never wait on a
//! trim.
//!
//! ## Commit hooks
//!
//! Mutations take a `commit` callback that runs under the shard lock after
//! validation and before the in-memory state changes. If it fails, nothing
//! changes. The registry uses it to write the durable journal.

mod record;

use std::collections::VecDeque;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{StreamError, StreamResult};
use crate::hashing::{HashKey, HashKeyRange};

pub use record::{base64_data, Record, SequenceNumber, ShardId};

/// First sequence number assigned in every shard
pub const FIRST_SEQUENCE: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardStatus {
    Open,
    Closed,
}

/// Result of one `read_from` call
#[derive(Debug, Clone)]
pub struct ReadBatch {
    pub records: Vec<Record>,
    /// Position to resume from; the sequence after the last returned record
    pub next_position: u64,
    /// How far the batch trails the newest record in the shard
    pub millis_behind_latest: i64,
    /// The shard is CLOSED and every record has been returned
    pub end_of_shard: bool,
}

#[derive(Debug)]
struct ShardLog {
    status: ShardStatus,
    /// Contiguous: `records[i].sequence_number == trim_horizon + i`
    records: VecDeque<Record>,
    next_sequence: u64,
    /// Lowest sequence number still physically held
    trim_horizon: u64,
    retention: Duration,
    closed_at: Option<DateTime<Utc>>,
}

impl ShardLog {
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    /// Lowest sequence number that is still inside the retention window
    fn effective_horizon(&self, now: DateTime<Utc>) -> u64 {
        let cutoff = self.cutoff(now);
        let expired = self
            .records
            .iter()
            .take_while(|r| r.arrival_time < cutoff)
            .count();
        self.trim_horizon + expired as u64
    }

    fn trim(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let mut trimmed = 0;
        while self
            .records
            .front()
            .map_or(false, |r| r.arrival_time < cutoff)
        {
            self.records.pop_front();
            trimmed += 1;
        }
        self.trim_horizon += trimmed as u64;
        trimmed
    }

    fn close(&mut self, now: DateTime<Utc>) {
        self.status = ShardStatus::Closed;
        self.closed_at = Some(now);
    }
}

/// Full state of one shard, as written by journal compaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSnapshot {
    pub shard_id: ShardId,
    pub hash_key_range: HashKeyRange,
    pub parent_shard_id: Option<ShardId>,
    pub adjacent_parent_shard_id: Option<ShardId>,
    pub created_at: DateTime<Utc>,
    pub status: ShardStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub next_sequence: u64,
    pub trim_horizon: u64,
    pub retention_secs: i64,
    /// Retained records, oldest first
    pub records: Vec<Record>,
}

/// One shard of a stream
#[derive(Debug)]
pub struct Shard {
    id: ShardId,
    hash_key_range: HashKeyRange,
    parent_shard_id: Option<ShardId>,
    adjacent_parent_shard_id: Option<ShardId>,
    created_at: DateTime<Utc>,
    log: RwLock<ShardLog>,
}

impl Shard {
    pub fn new(
        id: ShardId,
        hash_key_range: HashKeyRange,
        parent_shard_id: Option<ShardId>,
        adjacent_parent_shard_id: Option<ShardId>,
        retention: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            hash_key_range,
            parent_shard_id,
            adjacent_parent_shard_id,
            created_at,
            log: RwLock::new(ShardLog {
                status: ShardStatus::Open,
                records: VecDeque::new(),
                next_sequence: FIRST_SEQUENCE,
                trim_horizon: FIRST_SEQUENCE,
                retention,
                closed_at: None,
            }),
        }
    }

    /// Rebuild a shard from a snapshot, checking that its records are
    /// contiguous and end just before `next_sequence`
    pub fn from_snapshot(snapshot: ShardSnapshot) -> StreamResult<Self> {
        let ShardSnapshot {
            shard_id,
            hash_key_range,
            parent_shard_id,
            adjacent_parent_shard_id,
            created_at,
            status,
            closed_at,
            next_sequence,
            trim_horizon,
            retention_secs,
            records,
        } = snapshot;

        let contiguous = records
            .iter()
            .enumerate()
            .all(|(i, r)| r.sequence_number.value() == trim_horizon + i as u64);
        if trim_horizon < FIRST_SEQUENCE
            || !contiguous
            || trim_horizon + records.len() as u64 != next_sequence
        {
            return Err(StreamError::JournalCorruption(format!(
                "snapshot of shard {} holds {} records from {} but its tail is {}",
                shard_id,
                records.len(),
                SequenceNumber::new(trim_horizon),
                SequenceNumber::new(next_sequence)
            )));
        }
        if (status == ShardStatus::Closed) != closed_at.is_some() {
            return Err(StreamError::JournalCorruption(format!(
                "snapshot of shard {} has status {:?} with closed_at {:?}",
                shard_id, status, closed_at
            )));
        }

        Ok(Self {
            id: shard_id,
            hash_key_range,
            parent_shard_id,
            adjacent_parent_shard_id,
            created_at,
            log: RwLock::new(ShardLog {
                status,
                records: records.into(),
                next_sequence,
                trim_horizon,
                retention: Duration::seconds(retention_secs),
                closed_at,
            }),
        })
    }

    pub fn snapshot(&self) -> ShardSnapshot {
        let log = self.read_log();
        ShardSnapshot {
            shard_id: self.id.clone(),
            hash_key_range: self.hash_key_range,
            parent_shard_id: self.parent_shard_id.clone(),
            adjacent_parent_shard_id: self.adjacent_parent_shard_id.clone(),
            created_at: self.created_at,
            status: log.status,
            closed_at: log.closed_at,
            next_sequence: log.next_sequence,
            trim_horizon: log.trim_horizon,
            retention_secs: log.retention.num_seconds(),
            records: log.records.iter().cloned().collect(),
        }
    }

    fn read_log(&self) -> RwLockReadGuard<'_, ShardLog> {
        self.log.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_log(&self) -> RwLockWriteGuard<'_, ShardLog> {
        self.log.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn hash_key_range(&self) -> HashKeyRange {
        self.hash_key_range
    }

    pub fn parent_shard_id(&self) -> Option<&ShardId> {
        self.parent_shard_id.as_ref()
    }

    pub fn adjacent_parent_shard_id(&self) -> Option<&ShardId> {
        self.adjacent_parent_shard_id.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> ShardStatus {
        self.read_log().status
    }

    pub fn is_open(&self) -> bool {
        self.status() == ShardStatus::Open
    }

    pub fn retention(&self) -> Duration {
        self.read_log().retention
    }

    pub fn set_retention(&self, retention: Duration) {
        self.write_log().retention = retention;
    }

    /// Next sequence number to be assigned; LATEST resolves here
    pub fn tail(&self) -> u64 {
        self.read_log().next_sequence
    }

    /// Oldest sequence number still readable at `now`; TRIM_HORIZON resolves here
    pub fn trim_horizon(&self, now: DateTime<Utc>) -> u64 {
        self.read_log().effective_horizon(now)
    }

    /// Number of records physically held
    pub fn len(&self) -> usize {
        self.read_log().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the last record ever appended, if any
    pub fn last_sequence(&self) -> Option<SequenceNumber> {
        let log = self.read_log();
        (log.next_sequence > FIRST_SEQUENCE).then(|| SequenceNumber::new(log.next_sequence - 1))
    }

    /// Ending sequence number; only a CLOSED shard that received records has one
    pub fn ending_sequence(&self) -> Option<SequenceNumber> {
        match self.status() {
            ShardStatus::Closed => self.last_sequence(),
            ShardStatus::Open => None,
        }
    }

    /// Append a record.
    ///
    /// Trims expired records first, then assigns the next sequence number.
    /// Returns the stored record and how many records were trimmed.
    pub fn append<F>(
        &self,
        partition_key: &str,
        data: &[u8],
        now: DateTime<Utc>,
        max_data_bytes: usize,
        commit: F,
    ) -> StreamResult<(Record, usize)>
    where
        F: FnOnce(&Record) -> StreamResult<()>,
    {
        if data.len() > max_data_bytes {
            return Err(StreamError::DataTooLarge {
                size: data.len(),
                max: max_data_bytes,
            });
        }

        let mut log = self.write_log();
        if log.status == ShardStatus::Closed {
            return Err(StreamError::ShardClosed(self.id.to_string()));
        }

        let trimmed = log.trim(now);
        let record = Record {
            sequence_number: SequenceNumber::new(log.next_sequence),
            partition_key: partition_key.to_string(),
            data: data.to_vec(),
            arrival_time: now,
        };

        commit(&record)?;

        log.records.push_back(record.clone());
        log.next_sequence += 1;
        Ok((record, trimmed))
    }

    /// Re-insert a journaled record; it must be exactly the next one
    pub fn restore(&self, record: Record) -> StreamResult<()> {
        let mut log = self.write_log();
        if log.status == ShardStatus::Closed {
            return Err(StreamError::JournalCorruption(format!(
                "record {} journaled for closed shard {}",
                record.sequence_number, self.id
            )));
        }
        if record.sequence_number.value() != log.next_sequence {
            return Err(StreamError::JournalCorruption(format!(
                "shard {} expected sequence {} but journal has {}",
                self.id,
                SequenceNumber::new(log.next_sequence),
                record.sequence_number
            )));
        }
        log.records.push_back(record);
        log.next_sequence += 1;
        Ok(())
    }

    /// Read up to `max_records` records starting at sequence `position`.
    ///
    /// An empty batch means nothing new yet. Fails with `IteratorExpired` when
    /// records at or after `position` have aged out of the retention window.
    pub fn read_from(
        &self,
        position: u64,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> StreamResult<ReadBatch> {
        let log = self.read_log();

        let horizon = log.effective_horizon(now);
        if position < horizon {
            return Err(StreamError::IteratorExpired(format!(
                "shard {} position {} is older than trim horizon {}",
                self.id,
                SequenceNumber::new(position),
                SequenceNumber::new(horizon)
            )));
        }
        if position > log.next_sequence {
            return Err(StreamError::InvalidPosition(format!(
                "shard {} position {} is past the tail {}",
                self.id,
                SequenceNumber::new(position),
                SequenceNumber::new(log.next_sequence)
            )));
        }

        let start = (position - log.trim_horizon) as usize;
        let records: Vec<Record> = log
            .records
            .iter()
            .skip(start)
            .take(max_records)
            .cloned()
            .collect();

        let next_position = records
            .last()
            .map_or(position, |r| r.sequence_number.value() + 1);

        let millis_behind_latest = if next_position >= log.next_sequence {
            0
        } else {
            let pending = (next_position - log.trim_horizon) as usize;
            log.records
                .get(pending)
                .map_or(0, |r| (now - r.arrival_time).num_milliseconds().max(0))
        };

        Ok(ReadBatch {
            end_of_shard: log.status == ShardStatus::Closed && next_position >= log.next_sequence,
            records,
            next_position,
            millis_behind_latest,
        })
    }

    /// Drop records older than the retention window
    pub fn trim(&self, now: DateTime<Utc>) -> usize {
        self.write_log().trim(now)
    }

    /// A CLOSED shard is retired once every record it held has aged out and its
    /// own retention window has passed since it closed.
    pub fn is_retired(&self, now: DateTime<Utc>) -> bool {
        let log = self.read_log();
        match (log.status, log.closed_at) {
            (ShardStatus::Closed, Some(closed_at)) => {
                log.effective_horizon(now) >= log.next_sequence && closed_at + log.retention <= now
            }
            _ => false,
        }
    }

    /// Close this shard and produce two children splitting its range at `at`.
    ///
    /// The lower child covers `[start, at - 1]`, the upper `[at, end]`.
    pub fn split<F>(
        &self,
        at: HashKey,
        lower_id: ShardId,
        upper_id: ShardId,
        now: DateTime<Utc>,
        commit: F,
    ) -> StreamResult<(Shard, Shard)>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        let mut log = self.write_log();
        if log.status == ShardStatus::Closed {
            return Err(StreamError::ShardClosed(self.id.to_string()));
        }
        let (lower, upper) = self.hash_key_range.split_at(at)?;

        commit()?;

        log.close(now);
        let retention = log.retention;
        Ok((
            Shard::new(lower_id, lower, Some(self.id.clone()), None, retention, now),
            Shard::new(upper_id, upper, Some(self.id.clone()), None, retention, now),
        ))
    }

    /// Close this shard and its adjacent `sibling`, producing one child that
    /// covers both ranges. `self` becomes the parent, `sibling` the adjacent parent.
    pub fn merge<F>(
        &self,
        sibling: &Shard,
        child_id: ShardId,
        now: DateTime<Utc>,
        commit: F,
    ) -> StreamResult<Shard>
    where
        F: FnOnce() -> StreamResult<()>,
    {
        if self.id == sibling.id {
            return Err(StreamError::InvalidArgument(format!(
                "cannot merge shard {} with itself",
                self.id
            )));
        }

        // Lock in id order so two merges can never wait on each other
        let (mut mine, mut theirs) = if self.id < sibling.id {
            let a = self.write_log();
            let b = sibling.write_log();
            (a, b)
        } else {
            let b = sibling.write_log();
            let a = self.write_log();
            (a, b)
        };

        for (log, id) in [(&*mine, &self.id), (&*theirs, &sibling.id)] {
            if log.status == ShardStatus::Closed {
                return Err(StreamError::ShardClosed(id.to_string()));
            }
        }
        let range = self.hash_key_range.union(&sibling.hash_key_range)?;

        commit()?;

        mine.close(now);
        theirs.close(now);
        let retention = mine.retention.max(theirs.retention);
        Ok(Shard::new(
            child_id,
            range,
            Some(self.id.clone()),
            Some(sibling.id.clone()),
            retention,
            now,
        ))
    }

    /// Close without producing children
    #[cfg(test)]
    pub(crate) fn close(&self, now: DateTime<Utc>) -> StreamResult<()> {
        let mut log = self.write_log();
        if log.status == ShardStatus::Closed {
            return Err(StreamError::ShardClosed(self.id.to_string()));
        }
        log.close(now);
        Ok(())
    }
}
