//! Lifecycle events
//!
//! Every log line the engine emits names one of these events.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Registry lifecycle
    /// Registry constructed and ready
    RegistryOpen,
    /// Torn trailing journal frame dropped
    JournalTailTruncated,
    /// Journal corruption detected (FATAL)
    JournalCorruption,
    /// Journal rewritten as one snapshot per live stream
    JournalCompacted,
    /// Compaction abandoned; the uncompacted journal stays in use
    JournalCompactionFailed,
    /// A failed append could not be rolled back; durable writes stop
    JournalPoisoned,

    // Streams
    /// Stream registered
    StreamCreated,
    /// CreateStream for an existing name returned the existing stream
    StreamCreateIgnored,
    /// Stream removed with all its shards
    StreamDeleted,
    /// Server-side encryption enabled
    EncryptionStarted,
    /// Server-side encryption disabled
    EncryptionStopped,
    /// Retention window changed
    RetentionChanged,

    // Shards
    /// Shard split into two children
    ShardSplit,
    /// Two shards merged into one child
    ShardsMerged,
    /// Expired records removed
    RecordsTrimmed,
    /// Closed shard dropped after its records aged out
    ShardRetired,

    // Iterators
    /// Iterator presented after expiry
    IteratorExpired,
    /// Expired iterator replaced by a LATEST iterator
    IteratorRecovered,

    // Request loop
    /// Ready for requests
    Serving,
    /// Request rejected
    RequestFailed,
    /// Shutdown complete
    ShutdownComplete,
}

impl Event {
    /// Returns the event name as it appears in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::RegistryOpen => "REGISTRY_OPEN",
            Event::JournalTailTruncated => "JOURNAL_TAIL_TRUNCATED",
            Event::JournalCorruption => "JOURNAL_CORRUPTION",
            Event::JournalCompacted => "JOURNAL_COMPACTED",
            Event::JournalCompactionFailed => "JOURNAL_COMPACTION_FAILED",
            Event::JournalPoisoned => "JOURNAL_POISONED",
            Event::StreamCreated => "STREAM_CREATED",
            Event::StreamCreateIgnored => "STREAM_CREATE_IGNORED",
            Event::StreamDeleted => "STREAM_DELETED",
            Event::EncryptionStarted => "ENCRYPTION_STARTED",
            Event::EncryptionStopped => "ENCRYPTION_STOPPED",
            Event::RetentionChanged => "RETENTION_CHANGED",
            Event::ShardSplit => "SHARD_SPLIT",
            Event::ShardsMerged => "SHARDS_MERGED",
            Event::RecordsTrimmed => "RECORDS_TRIMMED",
            Event::ShardRetired => "SHARD_RETIRED",
            Event::IteratorExpired => "ITERATOR_EXPIRED",
            Event::IteratorRecovered => "ITERATOR_RECOVERED",
            Event::Serving => "SERVING",
            Event::RequestFailed => "REQUEST_FAILED",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::JournalCorruption | Event::JournalPoisoned)
    }

    /// Returns true for events that report a problem short of fatal
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Event::JournalTailTruncated
                | Event::JournalCompactionFailed
                | Event::IteratorExpired
                | Event::RequestFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        for event in [
            Event::RegistryOpen,
            Event::StreamCreateIgnored,
            Event::ShardsMerged,
            Event::IteratorRecovered,
        ] {
            let name = event.as_str();
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{}", name);
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::JournalCorruption.is_fatal());
        assert!(!Event::StreamDeleted.is_fatal());
        assert!(Event::JournalPoisoned.is_fatal());
        assert!(Event::IteratorExpired.is_warning());
        assert!(Event::JournalCompactionFailed.is_warning());
    }
}
