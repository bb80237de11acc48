//! # Stream Errors
//!
//! Error taxonomy for every engine operation.
//!
//! Codes are stable strings and are what the request/response binding reports.
//! `NotFound` covers both streams and shards; the variant keeps the detail.

use thiserror::Error;

/// Result type for engine operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    // ==================
    // Lookup Errors
    // ==================
    /// Stream absent, deleted, or recreated since the caller last saw it
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Shard absent from the stream (never existed or already retired)
    #[error("Shard not found: {shard_id} in stream {stream}")]
    ShardNotFound { stream: String, shard_id: String },

    /// Stream name already registered
    #[error("Stream already exists: {0}")]
    AlreadyExists(String),

    // ==================
    // Write Errors
    // ==================
    /// Record payload exceeds the configured bound
    #[error("Record data too large: {size} bytes (max: {max})")]
    DataTooLarge { size: usize, max: usize },

    /// Stream cannot accept the operation in its current status
    #[error("Stream {name} is {status}")]
    StreamNotActive { name: String, status: String },

    /// Shard no longer accepts appends or resharding
    #[error("Shard is closed: {0}")]
    ShardClosed(String),

    // ==================
    // Read Errors
    // ==================
    /// Iterator outlived its TTL or points at trimmed records
    #[error("Iterator expired: {0}")]
    IteratorExpired(String),

    /// Malformed token or out-of-range seek
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Request parameter outside its allowed range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ==================
    // Internal Errors
    // ==================
    /// No OPEN shard covers a hash key; the topology is broken
    #[error("No open shard covers hash key {0}")]
    NoOpenShard(String),

    /// Durable write path failed; the mutation was not applied
    #[error("Journal error: {0}")]
    Journal(String),

    /// Journal replay refused
    #[error("Journal corruption: {0}")]
    JournalCorruption(String),
}

impl StreamError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StreamError::StreamNotFound(_) | StreamError::ShardNotFound { .. } => "NOT_FOUND",
            StreamError::AlreadyExists(_) => "ALREADY_EXISTS",
            StreamError::DataTooLarge { .. } => "DATA_TOO_LARGE",
            StreamError::StreamNotActive { .. } => "STREAM_NOT_ACTIVE",
            StreamError::ShardClosed(_) => "SHARD_CLOSED",
            StreamError::IteratorExpired(_) => "ITERATOR_EXPIRED",
            StreamError::InvalidPosition(_) => "INVALID_POSITION",
            StreamError::InvalidArgument(_) => "INVALID_ARGUMENT",
            StreamError::NoOpenShard(_) => "NO_OPEN_SHARD",
            StreamError::Journal(_) => "JOURNAL_FAILED",
            StreamError::JournalCorruption(_) => "JOURNAL_CORRUPTION",
        }
    }

    /// Fatal errors indicate an engine bug or unusable durable state
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamError::NoOpenShard(_) | StreamError::JournalCorruption(_)
        )
    }

    /// Whether repeating the identical request later can succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StreamError::StreamNotActive { .. } | StreamError::Journal(_)
        )
    }

    /// Whether this is one of the not-found variants
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StreamError::StreamNotFound(_) | StreamError::ShardNotFound { .. }
        )
    }

    /// How a caller gets going again after this error, if there is a way
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            StreamError::IteratorExpired(_) => Some(
                "request a new iterator with AT_SEQUENCE_NUMBER/AFTER_SEQUENCE_NUMBER from the last processed record, or LATEST/TRIM_HORIZON",
            ),
            StreamError::DataTooLarge { .. } => Some("split the payload into smaller records"),
            StreamError::StreamNotActive { .. } => Some("wait until the stream is ACTIVE"),
            _ => None,
        }
    }

    pub(crate) fn shard_not_found(stream: &str, shard_id: impl Into<String>) -> Self {
        StreamError::ShardNotFound {
            stream: stream.to_string(),
            shard_id: shard_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_shares_code() {
        let stream = StreamError::StreamNotFound("orders".into());
        let shard = StreamError::shard_not_found("orders", "shardId-000000000007");
        assert_eq!(stream.code(), "NOT_FOUND");
        assert_eq!(shard.code(), "NOT_FOUND");
        assert!(stream.is_not_found());
        assert!(shard.is_not_found());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StreamError::NoOpenShard("0".into()).is_fatal());
        assert!(StreamError::JournalCorruption("bad crc".into()).is_fatal());
        assert!(!StreamError::IteratorExpired("ttl".into()).is_fatal());
        assert!(!StreamError::DataTooLarge { size: 2, max: 1 }.is_fatal());
    }

    #[test]
    fn test_recovery_hint_only_where_meaningful() {
        assert!(StreamError::IteratorExpired("ttl".into()).recovery_hint().is_some());
        assert!(StreamError::AlreadyExists("x".into()).recovery_hint().is_none());
    }

    #[test]
    fn test_display() {
        let err = StreamError::DataTooLarge { size: 2_000_000, max: 1_048_576 };
        assert_eq!(err.to_string(), "Record data too large: 2000000 bytes (max: 1048576)");
    }
}
