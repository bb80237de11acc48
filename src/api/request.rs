//! API request types
//!
//! One JSON object per request, dispatched on its `op` field.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::{ApiError, ApiResult};
use crate::hashing::{parse_hash_key, HashKey};
use crate::errors::StreamError;
use crate::iterator::{ShardIteratorType, StartingPosition};
use crate::shard::{SequenceNumber, ShardId};
use crate::stream::Encryption;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStreamRequest {
    pub stream_name: String,
    pub shard_count: u32,
    pub encryption: Encryption,
    /// Fail with ALREADY_EXISTS instead of returning the existing stream
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListStreamsRequest {
    pub limit: Option<usize>,
    pub exclusive_start_stream_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecordRequest {
    pub stream_name: String,
    pub partition_key: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetShardIteratorRequest {
    pub stream_name: String,
    pub shard_id: ShardId,
    pub position: StartingPosition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRecordsRequest {
    pub shard_iterator: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitShardRequest {
    pub stream_name: String,
    pub shard_id: ShardId,
    pub new_starting_hash_key: HashKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeShardsRequest {
    pub stream_name: String,
    pub shard_id: ShardId,
    pub adjacent_shard_id: ShardId,
}

/// Unified request envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    CreateStream(CreateStreamRequest),
    DeleteStream { stream_name: String },
    ListStreams(ListStreamsRequest),
    DescribeStream { stream_name: String },
    StreamStatus { stream_name: String },
    PutRecord(PutRecordRequest),
    GetShardIterator(GetShardIteratorRequest),
    GetRecords(GetRecordsRequest),
    SplitShard(SplitShardRequest),
    MergeShards(MergeShardsRequest),
    StartStreamEncryption { stream_name: String, key_id: Option<String> },
    StopStreamEncryption { stream_name: String },
    SetRetentionPeriod { stream_name: String, retention_period_hours: i64 },
    Sweep,
    Metrics,
}

/// Raw request for parsing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawRequest {
    op: String,
    #[serde(default)]
    stream_name: Option<String>,
    #[serde(default)]
    shard_count: Option<u32>,
    #[serde(default)]
    encrypted: Option<bool>,
    #[serde(default)]
    key_id: Option<String>,
    #[serde(default)]
    exclusive: Option<bool>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    exclusive_start_stream_name: Option<String>,
    #[serde(default)]
    partition_key: Option<String>,
    /// Base64 payload
    #[serde(default)]
    data: Option<String>,
    /// UTF-8 payload, used as-is
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    shard_id: Option<String>,
    #[serde(default)]
    adjacent_shard_id: Option<String>,
    #[serde(default)]
    shard_iterator_type: Option<String>,
    #[serde(default)]
    starting_sequence_number: Option<String>,
    #[serde(default)]
    shard_iterator: Option<String>,
    #[serde(default)]
    new_starting_hash_key: Option<String>,
    #[serde(default)]
    retention_period_hours: Option<i64>,
}

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::invalid_request(format!("Missing {}", field)))
}

/// A shard id that does not follow the `shardId-<12 digits>` format can
/// never name a shard, so it is reported as not found
fn parse_shard_id(value: Option<String>, field: &str, stream_name: &str) -> ApiResult<ShardId> {
    let raw = required(value, field)?;
    match ShardId::parse(&raw) {
        Some(shard_id) => Ok(shard_id),
        None => Err(StreamError::ShardNotFound {
            stream: stream_name.to_string(),
            shard_id: raw,
        }
        .into()),
    }
}

impl RawRequest {
    fn stream_name(&mut self) -> ApiResult<String> {
        required(self.stream_name.take(), "stream_name")
    }

    fn payload(&mut self) -> ApiResult<Vec<u8>> {
        match (self.data.take(), self.text.take()) {
            (Some(_), Some(_)) => Err(ApiError::invalid_request(
                "Give either data or text, not both",
            )),
            (Some(data), None) => STANDARD
                .decode(data.as_bytes())
                .map_err(|e| ApiError::invalid_request(format!("data is not base64: {}", e))),
            (None, Some(text)) => Ok(text.into_bytes()),
            (None, None) => Err(ApiError::invalid_request("Missing data")),
        }
    }

    fn starting_position(&mut self) -> ApiResult<StartingPosition> {
        let iterator_type: ShardIteratorType = required(self.shard_iterator_type.take(), "shard_iterator_type")?
            .parse()
            .map_err(ApiError::from)?;

        let sequence_number = match self.starting_sequence_number.take() {
            Some(raw) => Some(raw.parse::<SequenceNumber>().map_err(|_| {
                ApiError::from(StreamError::InvalidPosition(format!(
                    "invalid starting_sequence_number: {}",
                    raw
                )))
            })?),
            None => None,
        };
        if iterator_type.needs_sequence_number() && sequence_number.is_none() {
            return Err(StreamError::InvalidPosition(format!(
                "missing starting_sequence_number for {}",
                iterator_type
            ))
            .into());
        }

        Ok(StartingPosition {
            iterator_type,
            sequence_number: sequence_number.filter(|_| iterator_type.needs_sequence_number()),
        })
    }
}

impl Request {
    /// Parse a request from a JSON string
    pub fn parse(json: &str) -> ApiResult<Self> {
        let mut raw: RawRequest = serde_json::from_str(json)
            .map_err(|e| ApiError::invalid_request(format!("Invalid JSON: {}", e)))?;

        let op = std::mem::take(&mut raw.op);
        match op.as_str() {
            "create_stream" => {
                let stream_name = raw.stream_name()?;
                let shard_count = required(raw.shard_count, "shard_count")?;
                let encryption = match (raw.encrypted.unwrap_or(false), raw.key_id.take()) {
                    (false, Some(_)) => {
                        return Err(ApiError::invalid_request("key_id requires encrypted: true"))
                    }
                    (false, None) => Encryption::None,
                    (true, Some(key_id)) => Encryption::kms(key_id),
                    (true, None) => Encryption::default_kms(),
                };
                Ok(Request::CreateStream(CreateStreamRequest {
                    stream_name,
                    shard_count,
                    encryption,
                    exclusive: raw.exclusive.unwrap_or(false),
                }))
            }
            "delete_stream" => Ok(Request::DeleteStream {
                stream_name: raw.stream_name()?,
            }),
            "list_streams" => Ok(Request::ListStreams(ListStreamsRequest {
                limit: raw.limit,
                exclusive_start_stream_name: raw.exclusive_start_stream_name.take(),
            })),
            "describe_stream" => Ok(Request::DescribeStream {
                stream_name: raw.stream_name()?,
            }),
            "stream_status" => Ok(Request::StreamStatus {
                stream_name: raw.stream_name()?,
            }),
            "put_record" => {
                let stream_name = raw.stream_name()?;
                let partition_key = required(raw.partition_key.take(), "partition_key")?;
                let data = raw.payload()?;
                Ok(Request::PutRecord(PutRecordRequest {
                    stream_name,
                    partition_key,
                    data,
                }))
            }
            "get_shard_iterator" => {
                let stream_name = raw.stream_name()?;
                let shard_id = parse_shard_id(raw.shard_id.take(), "shard_id", &stream_name)?;
                let position = raw.starting_position()?;
                Ok(Request::GetShardIterator(GetShardIteratorRequest {
                    stream_name,
                    shard_id,
                    position,
                }))
            }
            "get_records" => Ok(Request::GetRecords(GetRecordsRequest {
                shard_iterator: required(raw.shard_iterator.take(), "shard_iterator")?,
                limit: raw.limit,
            })),
            "split_shard" => {
                let stream_name = raw.stream_name()?;
                let shard_id = parse_shard_id(raw.shard_id.take(), "shard_id", &stream_name)?;
                let key = required(raw.new_starting_hash_key.take(), "new_starting_hash_key")?;
                let new_starting_hash_key = parse_hash_key(&key).ok_or_else(|| {
                    ApiError::invalid_request(format!("Invalid new_starting_hash_key: {}", key))
                })?;
                Ok(Request::SplitShard(SplitShardRequest {
                    stream_name,
                    shard_id,
                    new_starting_hash_key,
                }))
            }
            "merge_shards" => {
                let stream_name = raw.stream_name()?;
                let shard_id = parse_shard_id(raw.shard_id.take(), "shard_id", &stream_name)?;
                let adjacent_shard_id =
                    parse_shard_id(raw.adjacent_shard_id.take(), "adjacent_shard_id", &stream_name)?;
                Ok(Request::MergeShards(MergeShardsRequest {
                    stream_name,
                    shard_id,
                    adjacent_shard_id,
                }))
            }
            "start_stream_encryption" => Ok(Request::StartStreamEncryption {
                stream_name: raw.stream_name()?,
                key_id: raw.key_id.take(),
            }),
            "stop_stream_encryption" => Ok(Request::StopStreamEncryption {
                stream_name: raw.stream_name()?,
            }),
            "set_retention_period" => Ok(Request::SetRetentionPeriod {
                stream_name: raw.stream_name()?,
                retention_period_hours: required(
                    raw.retention_period_hours,
                    "retention_period_hours",
                )?,
            }),
            "sweep" => Ok(Request::Sweep),
            "metrics" => Ok(Request::Metrics),
            other => Err(ApiError::unknown_operation(other)),
        }
    }

    /// Operation name as it appears in the `op` field
    pub fn op(&self) -> &'static str {
        match self {
            Request::CreateStream(_) => "create_stream",
            Request::DeleteStream { .. } => "delete_stream",
            Request::ListStreams(_) => "list_streams",
            Request::DescribeStream { .. } => "describe_stream",
            Request::StreamStatus { .. } => "stream_status",
            Request::PutRecord(_) => "put_record",
            Request::GetShardIterator(_) => "get_shard_iterator",
            Request::GetRecords(_) => "get_records",
            Request::SplitShard(_) => "split_shard",
            Request::MergeShards(_) => "merge_shards",
            Request::StartStreamEncryption { .. } => "start_stream_encryption",
            Request::StopStreamEncryption { .. } => "stop_stream_encryption",
            Request::SetRetentionPeriod { .. } => "set_retention_period",
            Request::Sweep => "sweep",
            Request::Metrics => "metrics",
        }
    }
}
