//! Serializable stream and shard descriptions returned by DescribeStream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{Encryption, StreamStatus};
use crate::hashing::HashKeyRange;
use crate::shard::{SequenceNumber, Shard, ShardId, ShardStatus, FIRST_SEQUENCE};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceNumberRange {
    pub starting_sequence_number: SequenceNumber,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_sequence_number: Option<SequenceNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescription {
    pub shard_id: ShardId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_shard_id: Option<ShardId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjacent_parent_shard_id: Option<ShardId>,
    pub hash_key_range: HashKeyRange,
    pub sequence_number_range: SequenceNumberRange,
    pub status: ShardStatus,
}

impl ShardDescription {
    pub fn of(shard: &Shard) -> Self {
        Self {
            shard_id: shard.id().clone(),
            parent_shard_id: shard.parent_shard_id().cloned(),
            adjacent_parent_shard_id: shard.adjacent_parent_shard_id().cloned(),
            hash_key_range: shard.hash_key_range(),
            sequence_number_range: SequenceNumberRange {
                starting_sequence_number: SequenceNumber::new(FIRST_SEQUENCE),
                ending_sequence_number: shard.ending_sequence(),
            },
            status: shard.status(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ShardStatus::Open
    }
}

/// Full topology of a stream at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescription {
    pub stream_name: String,
    pub stream_status: StreamStatus,
    pub encryption: Encryption,
    pub retention_period_hours: i64,
    pub stream_creation_timestamp: DateTime<Utc>,
    /// Every shard still held, OPEN and CLOSED, in shard id order
    pub shards: Vec<ShardDescription>,
}

impl StreamDescription {
    pub fn open_shards(&self) -> impl Iterator<Item = &ShardDescription> {
        self.shards.iter().filter(|s| s.is_open())
    }

    pub fn shard(&self, shard_id: &str) -> Option<&ShardDescription> {
        self.shards.iter().find(|s| s.shard_id.as_str() == shard_id)
    }
}
