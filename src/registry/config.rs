//! Registry configuration

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::StreamError;

pub const DEFAULT_RETENTION_HOURS: i64 = 24;
pub const MIN_RETENTION_HOURS: i64 = 1;
pub const MAX_RETENTION_HOURS: i64 = 8760;
pub const DEFAULT_ITERATOR_TTL_SECS: i64 = 300;
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_PARTITION_KEY_LEN: usize = 256;
pub const DEFAULT_MAX_SHARDS_PER_STREAM: u32 = 500;
pub const DEFAULT_MAX_GET_RECORDS: usize = 10_000;
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const DEFAULT_JOURNAL_COMPACTION_THRESHOLD: u64 = 10_000;

/// What GetRecords does with an iterator past its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredIteratorPolicy {
    /// Fail with `IteratorExpired`; the caller re-derives a cursor
    #[default]
    Fail,
    /// Return an empty batch, a fresh LATEST iterator and a notice
    RecoverToLatest,
}

impl ExpiredIteratorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiredIteratorPolicy::Fail => "fail",
            ExpiredIteratorPolicy::RecoverToLatest => "recover_to_latest",
        }
    }
}

impl fmt::Display for ExpiredIteratorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpiredIteratorPolicy {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(ExpiredIteratorPolicy::Fail),
            "recover_to_latest" => Ok(ExpiredIteratorPolicy::RecoverToLatest),
            other => Err(StreamError::InvalidArgument(format!(
                "unknown expired iterator policy: {}",
                other
            ))),
        }
    }
}

/// Limits and defaults for one registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Enables the durable journal under this directory
    pub data_dir: Option<PathBuf>,
    /// Retention window given to new streams
    pub retention: Duration,
    /// Lifetime of an iterator token from issuance
    pub iterator_ttl: Duration,
    pub max_record_bytes: usize,
    pub max_partition_key_len: usize,
    pub max_shards_per_stream: u32,
    pub max_get_records: usize,
    pub default_list_limit: usize,
    /// How long a new stream reports CREATING
    pub provisioning_delay: Duration,
    pub expired_iterator_policy: ExpiredIteratorPolicy,
    /// Compact on open once replay applied at least this many entries; 0 never
    pub journal_compaction_threshold: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
            iterator_ttl: Duration::seconds(DEFAULT_ITERATOR_TTL_SECS),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            max_partition_key_len: DEFAULT_MAX_PARTITION_KEY_LEN,
            max_shards_per_stream: DEFAULT_MAX_SHARDS_PER_STREAM,
            max_get_records: DEFAULT_MAX_GET_RECORDS,
            default_list_limit: DEFAULT_LIST_LIMIT,
            provisioning_delay: Duration::zero(),
            expired_iterator_policy: ExpiredIteratorPolicy::Fail,
            journal_compaction_threshold: DEFAULT_JOURNAL_COMPACTION_THRESHOLD,
        }
    }
}

impl RegistryConfig {
    /// In-memory registry with default limits
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Journaled registry rooted at `data_dir`
    pub fn durable(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    pub fn with_expired_iterator_policy(mut self, policy: ExpiredIteratorPolicy) -> Self {
        self.expired_iterator_policy = policy;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_journal_compaction_threshold(mut self, entries: u64) -> Self {
        self.journal_compaction_threshold = entries;
        self
    }

    pub fn with_provisioning_delay(mut self, delay: Duration) -> Self {
        self.provisioning_delay = delay;
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let hours = self.retention.num_hours();
        if self.retention != Duration::hours(hours) || !(MIN_RETENTION_HOURS..=MAX_RETENTION_HOURS).contains(&hours) {
            return Err(StreamError::InvalidArgument(format!(
                "retention must be a whole number of hours in {}..={}",
                MIN_RETENTION_HOURS, MAX_RETENTION_HOURS
            )));
        }
        if self.iterator_ttl <= Duration::zero() {
            return Err(StreamError::InvalidArgument(
                "iterator ttl must be positive".to_string(),
            ));
        }
        if self.provisioning_delay < Duration::zero() {
            return Err(StreamError::InvalidArgument(
                "provisioning delay cannot be negative".to_string(),
            ));
        }
        for (name, value) in [
            ("max_record_bytes", self.max_record_bytes),
            ("max_partition_key_len", self.max_partition_key_len),
            ("max_shards_per_stream", self.max_shards_per_stream as usize),
            ("max_get_records", self.max_get_records),
            ("default_list_limit", self.default_list_limit),
        ] {
            if value == 0 {
                return Err(StreamError::InvalidArgument(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = RegistryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention, Duration::hours(24));
        assert_eq!(config.iterator_ttl, Duration::minutes(5));
        assert_eq!(config.expired_iterator_policy, ExpiredIteratorPolicy::Fail);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_retention_bounds() {
        assert!(RegistryConfig::default().with_retention(Duration::hours(8760)).validate().is_ok());
        assert!(RegistryConfig::default().with_retention(Duration::hours(8761)).validate().is_err());
        assert!(RegistryConfig::default().with_retention(Duration::minutes(30)).validate().is_err());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = RegistryConfig {
            max_get_records: 0,
            ..RegistryConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_get_records"));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "recover_to_latest".parse::<ExpiredIteratorPolicy>().unwrap(),
            ExpiredIteratorPolicy::RecoverToLatest
        );
        assert!("retry".parse::<ExpiredIteratorPolicy>().is_err());
        let json = serde_json::to_string(&ExpiredIteratorPolicy::RecoverToLatest).unwrap();
        assert_eq!(json, "\"recover_to_latest\"");
    }
}
