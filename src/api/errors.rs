//! API errors
//!
//! Request-shape problems get their own codes; engine errors pass through with
//! their code unchanged.

use std::fmt;

use crate::errors::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Request fails, service continues
    Error,
    /// Service must stop
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
pub enum ApiErrorCode {
    /// Malformed JSON or missing/invalid field
    InvalidRequest,
    /// `op` names no operation
    UnknownOperation,
}

impl ApiErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "INVALID_REQUEST",
            ApiErrorCode::UnknownOperation => "UNKNOWN_OPERATION",
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// API error carrying the code reported to the caller
#[derive(Debug, Clone)]
pub struct ApiError {
    code: String,
    message: String,
    severity: Severity,
    retriable: bool,
    hint: Option<String>,
}

impl ApiError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::InvalidRequest.code().to_string(),
            message: reason.into(),
            severity: Severity::Error,
            retriable: false,
            hint: None,
        }
    }

    pub fn unknown_operation(op: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::UnknownOperation.code().to_string(),
            message: format!("Unknown operation: {}", op.into()),
            severity: Severity::Error,
            retriable: false,
            hint: None,
        }
    }

    /// Pass an engine error through
    pub fn from_stream_error(err: StreamError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            severity: if err.is_fatal() {
                Severity::Fatal
            } else {
                Severity::Error
            },
            retriable: err.is_retriable(),
            hint: err.recovery_hint().map(str::to_string),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_retriable(&self) -> bool {
        self.retriable
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.severity, Severity::Fatal)
    }
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        Self::from_stream_error(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_error() {
        let err = ApiError::invalid_request("missing field");
        assert_eq!(err.code(), "INVALID_REQUEST");
        assert!(!err.is_fatal());
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_unknown_operation_error() {
        let err = ApiError::unknown_operation("foo");
        assert_eq!(err.code(), "UNKNOWN_OPERATION");
        assert!(err.message().contains("foo"));
    }

    #[test]
    fn test_stream_error_passes_through() {
        let err: ApiError = StreamError::IteratorExpired("old".to_string()).into();
        assert_eq!(err.code(), "ITERATOR_EXPIRED");
        assert!(err.hint().is_some());

        let err: ApiError = StreamError::NoOpenShard("7".to_string()).into();
        assert!(err.is_fatal());

        let err: ApiError = StreamError::Journal("disk".to_string()).into();
        assert!(err.is_retriable());
    }
}
