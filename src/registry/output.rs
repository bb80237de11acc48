//! Results of registry operations

use serde::{Deserialize, Serialize};

use crate::shard::{Record, SequenceNumber, ShardId};
use crate::stream::ShardDescription;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListStreamsOutput {
    pub stream_names: Vec<String>,
    pub has_more_streams: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRecordOutput {
    pub shard_id: ShardId,
    pub sequence_number: SequenceNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRecordsOutput {
    pub records: Vec<Record>,
    /// `None` once a CLOSED shard has been read to its end
    pub next_shard_iterator: Option<String>,
    pub millis_behind_latest: i64,
    /// Where to continue after a CLOSED shard is exhausted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_shards: Vec<ShardDescription>,
    /// Set when an expired iterator was replaced instead of failing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitShardOutput {
    pub parent_shard_id: ShardId,
    pub child_shard_ids: [ShardId; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeShardsOutput {
    pub parent_shard_ids: [ShardId; 2],
    pub child_shard_id: ShardId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetiredShard {
    pub stream_name: String,
    pub shard_id: ShardId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOutput {
    pub records_trimmed: usize,
    pub shards_retired: Vec<RetiredShard>,
}
