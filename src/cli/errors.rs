//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status.

use std::fmt;
use std::io;

use crate::errors::StreamError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Registry could not be opened
    OpenFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SHARDLOG_CLI_CONFIG_ERROR",
            Self::IoError => "SHARDLOG_CLI_IO_ERROR",
            Self::OpenFailed => "SHARDLOG_CLI_OPEN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn open_failed(err: StreamError) -> Self {
        Self::new(CliErrorCode::OpenFailed, format!("{}: {}", err.code(), err))
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CliError::config_error("bad").code_str(),
            "SHARDLOG_CLI_CONFIG_ERROR"
        );
        let err = CliError::open_failed(StreamError::JournalCorruption("frame 3".to_string()));
        assert_eq!(err.code(), &CliErrorCode::OpenFailed);
        assert!(err.message().contains("JOURNAL_CORRUPTION"));
        assert!(err.to_string().starts_with("SHARDLOG_CLI_OPEN_FAILED"));
    }

    #[test]
    fn test_from_io_error() {
        let err: CliError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert_eq!(err.code(), &CliErrorCode::IoError);
    }
}
