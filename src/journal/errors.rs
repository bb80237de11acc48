//! Journal error types
//!
//! Error codes:
//! - SHARDLOG_JOURNAL_OPEN_FAILED (FATAL severity)
//! - SHARDLOG_JOURNAL_APPEND_FAILED (ERROR severity, mutation rolled back)
//! - SHARDLOG_JOURNAL_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

use crate::errors::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, registry continues
    Error,
    /// Registry must not be served
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalErrorCode {
    /// Journal directory or file could not be opened
    OpenFailed,
    /// Write or sync of a frame failed; the file was cut back
    AppendFailed,
    /// A failed append could not be cut back; the writer refuses further appends
    Poisoned,
    /// Rewriting the journal failed; the previous journal is still intact
    CompactionFailed,
    /// A complete frame failed its checksum or did not decode
    Corruption,
}

impl JournalErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            JournalErrorCode::OpenFailed => "SHARDLOG_JOURNAL_OPEN_FAILED",
            JournalErrorCode::AppendFailed => "SHARDLOG_JOURNAL_APPEND_FAILED",
            JournalErrorCode::Poisoned => "SHARDLOG_JOURNAL_POISONED",
            JournalErrorCode::CompactionFailed => "SHARDLOG_JOURNAL_COMPACTION_FAILED",
            JournalErrorCode::Corruption => "SHARDLOG_JOURNAL_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            JournalErrorCode::OpenFailed => Severity::Fatal,
            JournalErrorCode::AppendFailed => Severity::Error,
            JournalErrorCode::Poisoned => Severity::Fatal,
            JournalErrorCode::CompactionFailed => Severity::Error,
            JournalErrorCode::Corruption => Severity::Fatal,
        }
    }
}

impl fmt::Display for JournalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Journal error with code, message and optional context
#[derive(Debug)]
pub struct JournalError {
    code: JournalErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl JournalError {
    pub fn open_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::OpenFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    pub fn append_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::AppendFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Encoding an entry failed before anything was written
    pub fn encode_failed(message: impl Into<String>) -> Self {
        Self {
            code: JournalErrorCode::AppendFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    pub fn compaction_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::CompactionFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// The cut-back after a failed append failed too
    pub fn rollback_failed(durable_len: u64, source: io::Error) -> Self {
        Self {
            code: JournalErrorCode::Poisoned,
            message: "Failed to cut journal back after a failed append".to_string(),
            details: Some(format!("durable_len: {}", durable_len)),
            source: Some(source),
        }
    }

    /// Append refused because an earlier rollback failed
    pub fn poisoned(durable_len: u64) -> Self {
        Self {
            code: JournalErrorCode::Poisoned,
            message: "Journal holds bytes past its durable prefix; reopen to recover".to_string(),
            details: Some(format!("durable_len: {}", durable_len)),
            source: None,
        }
    }

    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: JournalErrorCode::Corruption,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    pub fn code(&self) -> JournalErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for JournalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<JournalError> for StreamError {
    fn from(err: JournalError) -> Self {
        match err.code {
            JournalErrorCode::Corruption => StreamError::JournalCorruption(err.to_string()),
            _ => StreamError::Journal(err.to_string()),
        }
    }
}

pub type JournalResult<T> = Result<T, JournalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JournalErrorCode::OpenFailed.code(), "SHARDLOG_JOURNAL_OPEN_FAILED");
        assert_eq!(JournalErrorCode::AppendFailed.code(), "SHARDLOG_JOURNAL_APPEND_FAILED");
        assert_eq!(JournalErrorCode::Corruption.code(), "SHARDLOG_JOURNAL_CORRUPTION");
        assert_eq!(JournalErrorCode::Poisoned.code(), "SHARDLOG_JOURNAL_POISONED");
    }

    #[test]
    fn test_poisoned_maps_to_journal_failed() {
        let err = JournalError::poisoned(128);
        assert!(err.is_fatal());
        assert_eq!(err.details(), Some("durable_len: 128"));

        let stream_err: StreamError = err.into();
        assert_eq!(stream_err.code(), "JOURNAL_FAILED");
    }

    #[test]
    fn test_severity() {
        assert!(!JournalError::encode_failed("x").is_fatal());
        assert!(JournalError::corruption_at_offset(8, "bad crc").is_fatal());
    }

    #[test]
    fn test_display_includes_offset() {
        let err = JournalError::corruption_at_offset(42, "checksum mismatch");
        let display = err.to_string();
        assert!(display.contains("FATAL"));
        assert!(display.contains("SHARDLOG_JOURNAL_CORRUPTION"));
        assert!(display.contains("byte_offset: 42"));
    }

    #[test]
    fn test_into_stream_error() {
        let corrupt: StreamError = JournalError::corruption_at_offset(0, "bad").into();
        assert_eq!(corrupt.code(), "JOURNAL_CORRUPTION");

        let io = io::Error::new(io::ErrorKind::Other, "disk full");
        let failed: StreamError = JournalError::append_failed("write", io).into();
        assert_eq!(failed.code(), "JOURNAL_FAILED");
        assert!(failed.is_retriable());
    }
}
