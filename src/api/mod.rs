//! API Layer for shardlog
//!
//! Line-oriented JSON requests over a `Registry`. Each request is an object
//! with an `op` field; each response is `{"status":"ok","data":...}` or
//! `{"status":"error","code":...}`. Engine error codes pass through
//! unchanged.
//!
//! # Supported Operations
//!
//! - create_stream, delete_stream, list_streams, describe_stream, stream_status
//! - put_record, get_shard_iterator, get_records
//! - split_shard, merge_shards
//! - start_stream_encryption, stop_stream_encryption, set_retention_period
//! - sweep, metrics

mod errors;
mod handler;
mod request;
mod response;

pub use errors::{ApiError, ApiErrorCode, ApiResult, Severity};
pub use handler::ApiHandler;
pub use request::{
    CreateStreamRequest, GetRecordsRequest, GetShardIteratorRequest, ListStreamsRequest,
    MergeShardsRequest, PutRecordRequest, Request, SplitShardRequest,
};
pub use response::{ErrorResponse, Response, SuccessResponse};
