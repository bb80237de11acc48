//! Engine counters
//!
//! - Counters only, monotonic
//! - Reset only on process start (replay does not count)
//! - Lock-free; relaxed ordering is enough for reporting

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    streams_created: AtomicU64,
    streams_deleted: AtomicU64,
    records_put: AtomicU64,
    bytes_put: AtomicU64,
    records_read: AtomicU64,
    get_records_calls: AtomicU64,
    iterators_issued: AtomicU64,
    iterators_expired: AtomicU64,
    records_trimmed: AtomicU64,
    shards_split: AtomicU64,
    shards_merged: AtomicU64,
    shards_retired: AtomicU64,
    journal_entries: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Streams

    pub fn increment_streams_created(&self) {
        self.streams_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_streams_deleted(&self) {
        self.streams_deleted.fetch_add(1, Ordering::Relaxed);
    }

    // Data plane

    /// Count one accepted record of `bytes` payload bytes
    pub fn record_put(&self, bytes: u64) {
        self.records_put.fetch_add(1, Ordering::Relaxed);
        self.bytes_put.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Count one GetRecords call that returned `records` records
    pub fn record_read(&self, records: u64) {
        self.get_records_calls.fetch_add(1, Ordering::Relaxed);
        self.records_read.fetch_add(records, Ordering::Relaxed);
    }

    pub fn increment_iterators_issued(&self) {
        self.iterators_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_iterators_expired(&self) {
        self.iterators_expired.fetch_add(1, Ordering::Relaxed);
    }

    // Retention and resharding

    pub fn add_records_trimmed(&self, count: u64) {
        self.records_trimmed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_shards_split(&self) {
        self.shards_split.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_shards_merged(&self) {
        self.shards_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_shards_retired(&self, count: u64) {
        self.shards_retired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_journal_entries(&self) {
        self.journal_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values as one JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            streams_created: self.streams_created.load(Ordering::Relaxed),
            streams_deleted: self.streams_deleted.load(Ordering::Relaxed),
            records_put: self.records_put.load(Ordering::Relaxed),
            bytes_put: self.bytes_put.load(Ordering::Relaxed),
            records_read: self.records_read.load(Ordering::Relaxed),
            get_records_calls: self.get_records_calls.load(Ordering::Relaxed),
            iterators_issued: self.iterators_issued.load(Ordering::Relaxed),
            iterators_expired: self.iterators_expired.load(Ordering::Relaxed),
            records_trimmed: self.records_trimmed.load(Ordering::Relaxed),
            shards_split: self.shards_split.load(Ordering::Relaxed),
            shards_merged: self.shards_merged.load(Ordering::Relaxed),
            shards_retired: self.shards_retired.load(Ordering::Relaxed),
            journal_entries: self.journal_entries.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of every counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub streams_created: u64,
    pub streams_deleted: u64,
    pub records_put: u64,
    pub bytes_put: u64,
    pub records_read: u64,
    pub get_records_calls: u64,
    pub iterators_issued: u64,
    pub iterators_expired: u64,
    pub records_trimmed: u64,
    pub shards_split: u64,
    pub shards_merged: u64,
    pub shards_retired: u64,
    pub journal_entries: u64,
}
