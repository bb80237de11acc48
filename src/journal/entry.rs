//! Journal entries and their on-disk framing.
//!
//! Frame layout (little-endian):
//!
//! ```text
//! | len: u32 | crc32(body): u32 | body: JSON, len bytes |
//! ```

use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{JournalError, JournalResult};
use crate::hashing::{hash_key_string, HashKey};
use crate::shard::{Record, ShardId};
use crate::stream::{Encryption, StreamSnapshot};

/// Bytes before the body of every frame
pub const FRAME_HEADER_LEN: usize = 8;

/// One durable mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEntry {
    StreamCreated {
        name: String,
        incarnation: Uuid,
        shard_count: u32,
        encryption: Encryption,
        retention_secs: i64,
        created_at: DateTime<Utc>,
        ready_at: DateTime<Utc>,
    },
    StreamDeleted {
        name: String,
        incarnation: Uuid,
    },
    RecordAppended {
        stream: String,
        incarnation: Uuid,
        shard_id: ShardId,
        record: Record,
    },
    ShardSplit {
        stream: String,
        incarnation: Uuid,
        shard_id: ShardId,
        #[serde(with = "hash_key_string")]
        new_starting_hash_key: HashKey,
        at: DateTime<Utc>,
    },
    ShardsMerged {
        stream: String,
        incarnation: Uuid,
        shard_id: ShardId,
        adjacent_shard_id: ShardId,
        at: DateTime<Utc>,
    },
    EncryptionChanged {
        stream: String,
        incarnation: Uuid,
        encryption: Encryption,
        at: DateTime<Utc>,
    },
    RetentionChanged {
        stream: String,
        incarnation: Uuid,
        retention_secs: i64,
        at: DateTime<Utc>,
    },
    /// A whole live stream, written by compaction in place of its history
    StreamSnapshot { snapshot: StreamSnapshot },
}

impl JournalEntry {
    /// Name of the stream this entry mutates
    pub fn stream_name(&self) -> &str {
        match self {
            JournalEntry::StreamCreated { name, .. } | JournalEntry::StreamDeleted { name, .. } => {
                name
            }
            JournalEntry::RecordAppended { stream, .. }
            | JournalEntry::ShardSplit { stream, .. }
            | JournalEntry::ShardsMerged { stream, .. }
            | JournalEntry::EncryptionChanged { stream, .. }
            | JournalEntry::RetentionChanged { stream, .. } => stream,
            JournalEntry::StreamSnapshot { snapshot } => &snapshot.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JournalEntry::StreamCreated { .. } => "stream_created",
            JournalEntry::StreamDeleted { .. } => "stream_deleted",
            JournalEntry::RecordAppended { .. } => "record_appended",
            JournalEntry::ShardSplit { .. } => "shard_split",
            JournalEntry::ShardsMerged { .. } => "shards_merged",
            JournalEntry::EncryptionChanged { .. } => "encryption_changed",
            JournalEntry::RetentionChanged { .. } => "retention_changed",
            JournalEntry::StreamSnapshot { .. } => "stream_snapshot",
        }
    }

    /// Serialize into one frame
    pub fn encode_frame(&self) -> JournalResult<Vec<u8>> {
        let body = serde_json::to_vec(self)
            .map_err(|e| JournalError::encode_failed(format!("cannot encode {}: {}", self.kind(), e)))?;
        let len = u32::try_from(body.len()).map_err(|_| {
            JournalError::encode_failed(format!("{} entry of {} bytes is too large", self.kind(), body.len()))
        })?;

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&checksum(&body).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

pub fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
