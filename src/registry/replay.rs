//! Rebuilding a registry from its journal.

use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use super::Registry;
use crate::errors::{StreamError, StreamResult};
use crate::journal::JournalEntry;
use crate::observability::ObservationScope;
use crate::stream::Stream;

impl Registry {
    /// Apply journal entries in order. Runs before the journal writer is
    /// attached, so nothing here is journaled again or counted in metrics.
    pub(super) fn replay(&self, entries: Vec<JournalEntry>) -> StreamResult<()> {
        let total = entries.len().to_string();
        let scope = ObservationScope::with_fields("JOURNAL_REPLAY", &[("entries", &total)]);

        for (index, entry) in entries.into_iter().enumerate() {
            let kind = entry.kind();
            let stream_name = entry.stream_name().to_string();
            if let Err(e) = self.apply(entry) {
                let reason = format!(
                    "entry {} ({} for stream {}) cannot be applied: {}",
                    index, kind, stream_name, e
                );
                scope.fail_fatal(&reason);
                return Err(StreamError::JournalCorruption(reason));
            }
        }

        // Records that aged out while the process was down
        let now = self.now();
        let trimmed: usize = self
            .read_streams()
            .values()
            .map(|stream| stream.trim_expired(now))
            .sum();

        let streams = self.read_streams().len().to_string();
        scope.complete_with_fields(&[("streams", &streams), ("records_trimmed", &trimmed.to_string())]);
        Ok(())
    }

    /// One snapshot entry per live stream, in name order
    pub(super) fn snapshot_entries(&self) -> Vec<JournalEntry> {
        self.read_streams()
            .values()
            .map(|stream| JournalEntry::StreamSnapshot {
                snapshot: stream.snapshot(),
            })
            .collect()
    }

    fn apply(&self, entry: JournalEntry) -> StreamResult<()> {
        match entry {
            JournalEntry::StreamCreated {
                name,
                incarnation,
                shard_count,
                encryption,
                retention_secs,
                created_at,
                ready_at,
            } => {
                let mut streams = self.write_streams();
                if streams.contains_key(&name) {
                    return Err(StreamError::AlreadyExists(name));
                }
                let stream = Stream::new(
                    name.clone(),
                    incarnation,
                    shard_count,
                    encryption,
                    Duration::seconds(retention_secs),
                    created_at,
                    ready_at,
                )?;
                streams.insert(name, Arc::new(stream));
                Ok(())
            }
            JournalEntry::StreamDeleted { name, incarnation } => {
                self.live_stream(&name, incarnation)?.mark_deleting();
                self.write_streams().remove(&name);
                Ok(())
            }
            JournalEntry::RecordAppended {
                stream,
                incarnation,
                shard_id,
                record,
            } => self
                .live_stream(&stream, incarnation)?
                .restore_record(&shard_id, record),
            JournalEntry::ShardSplit {
                stream,
                incarnation,
                shard_id,
                new_starting_hash_key,
                at,
            } => self
                .live_stream(&stream, incarnation)?
                .split_shard(&shard_id, new_starting_hash_key, at, usize::MAX, || Ok(()))
                .map(|_| ()),
            JournalEntry::ShardsMerged {
                stream,
                incarnation,
                shard_id,
                adjacent_shard_id,
                at,
            } => self
                .live_stream(&stream, incarnation)?
                .merge_shards(&shard_id, &adjacent_shard_id, at, || Ok(()))
                .map(|_| ()),
            JournalEntry::EncryptionChanged {
                stream,
                incarnation,
                encryption,
                at,
            } => self
                .live_stream(&stream, incarnation)?
                .set_encryption(encryption, at, || Ok(())),
            JournalEntry::RetentionChanged {
                stream,
                incarnation,
                retention_secs,
                at,
            } => self.live_stream(&stream, incarnation)?.set_retention(
                Duration::seconds(retention_secs),
                at,
                || Ok(()),
            ),
            JournalEntry::StreamSnapshot { snapshot } => {
                let mut streams = self.write_streams();
                if streams.contains_key(&snapshot.name) {
                    return Err(StreamError::AlreadyExists(snapshot.name));
                }
                let stream = Stream::from_snapshot(snapshot)?;
                streams.insert(stream.name().to_string(), Arc::new(stream));
                Ok(())
            }
        }
    }

    /// The stream currently registered under `name`, if it is the same creation
    fn live_stream(&self, name: &str, incarnation: Uuid) -> StreamResult<Arc<Stream>> {
        self.stream(name)
            .ok()
            .filter(|s| s.incarnation() == incarnation)
            .ok_or_else(|| StreamError::StreamNotFound(format!("{} ({})", name, incarnation)))
    }
}
