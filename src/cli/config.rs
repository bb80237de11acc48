//! Configuration file
//!
//! A JSON object; every field is optional and falls back to the registry
//! defaults.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::observability::Severity;
use crate::registry::{
    ExpiredIteratorPolicy, RegistryConfig, DEFAULT_ITERATOR_TTL_SECS,
    DEFAULT_JOURNAL_COMPACTION_THRESHOLD, DEFAULT_LIST_LIMIT,
    DEFAULT_MAX_GET_RECORDS, DEFAULT_MAX_PARTITION_KEY_LEN, DEFAULT_MAX_RECORD_BYTES,
    DEFAULT_MAX_SHARDS_PER_STREAM, DEFAULT_RETENTION_HOURS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Enables the durable journal when set
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,

    #[serde(default = "default_iterator_ttl_secs")]
    pub iterator_ttl_secs: i64,

    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    #[serde(default = "default_max_partition_key_len")]
    pub max_partition_key_len: usize,

    #[serde(default = "default_max_shards_per_stream")]
    pub max_shards_per_stream: u32,

    #[serde(default = "default_max_get_records")]
    pub max_get_records: usize,

    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,

    /// How long new streams report CREATING
    #[serde(default)]
    pub provisioning_delay_ms: i64,

    #[serde(default)]
    pub expired_iterator_policy: ExpiredIteratorPolicy,

    /// Replayed entries that trigger compaction on open; 0 disables
    #[serde(default = "default_journal_compaction_threshold")]
    pub journal_compaction_threshold: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_retention_hours() -> i64 {
    DEFAULT_RETENTION_HOURS
}
fn default_iterator_ttl_secs() -> i64 {
    DEFAULT_ITERATOR_TTL_SECS
}
fn default_max_record_bytes() -> usize {
    DEFAULT_MAX_RECORD_BYTES
}
fn default_max_partition_key_len() -> usize {
    DEFAULT_MAX_PARTITION_KEY_LEN
}
fn default_max_shards_per_stream() -> u32 {
    DEFAULT_MAX_SHARDS_PER_STREAM
}
fn default_max_get_records() -> usize {
    DEFAULT_MAX_GET_RECORDS
}
fn default_list_limit() -> usize {
    DEFAULT_LIST_LIMIT
}
fn default_journal_compaction_threshold() -> u64 {
    DEFAULT_JOURNAL_COMPACTION_THRESHOLD
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention_hours: default_retention_hours(),
            iterator_ttl_secs: default_iterator_ttl_secs(),
            max_record_bytes: default_max_record_bytes(),
            max_partition_key_len: default_max_partition_key_len(),
            max_shards_per_stream: default_max_shards_per_stream(),
            max_get_records: default_max_get_records(),
            default_list_limit: default_list_limit(),
            provisioning_delay_ms: 0,
            expired_iterator_policy: ExpiredIteratorPolicy::default(),
            journal_compaction_threshold: default_journal_compaction_threshold(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The file at `path`, or defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        self.log_severity()?;
        self.registry_config()
            .validate()
            .map_err(|e| CliError::config_error(e.to_string()))
    }

    pub fn log_severity(&self) -> CliResult<Severity> {
        self.log_level
            .parse()
            .map_err(|e: String| CliError::config_error(format!("Invalid log_level: {}", e)))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            data_dir: self.data_dir.clone(),
            retention: Duration::hours(self.retention_hours),
            iterator_ttl: Duration::seconds(self.iterator_ttl_secs),
            max_record_bytes: self.max_record_bytes,
            max_partition_key_len: self.max_partition_key_len,
            max_shards_per_stream: self.max_shards_per_stream,
            max_get_records: self.max_get_records,
            default_list_limit: self.default_list_limit,
            provisioning_delay: Duration::milliseconds(self.provisioning_delay_ms),
            expired_iterator_policy: self.expired_iterator_policy,
            journal_compaction_threshold: self.journal_compaction_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.registry_config(), RegistryConfig::default());
    }

    #[test]
    fn test_fields_map_to_registry_config() {
        let config = Config::parse(
            r#"{"data_dir": "/var/lib/shardlog", "retention_hours": 48,
                "expired_iterator_policy": "recover_to_latest", "log_level": "warn"}"#,
        )
        .unwrap();
        let registry = config.registry_config();
        assert_eq!(registry.data_dir, Some(PathBuf::from("/var/lib/shardlog")));
        assert_eq!(registry.retention, Duration::hours(48));
        assert_eq!(
            registry.expired_iterator_policy,
            ExpiredIteratorPolicy::RecoverToLatest
        );
        assert_eq!(config.log_severity().unwrap(), Severity::Warn);

        let never = Config::parse(r#"{"journal_compaction_threshold": 0}"#).unwrap();
        assert_eq!(never.registry_config().journal_compaction_threshold, 0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::parse(r#"{"retention_hours": 0}"#).is_err());
        assert!(Config::parse(r#"{"max_get_records": 0}"#).is_err());
        assert!(Config::parse(r#"{"log_level": "chatty"}"#).is_err());
        assert!(Config::parse(r#"{"expired_iterator_policy": "ignore"}"#).is_err());
        assert!(Config::parse(r#"{"unknown_field": 1}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shardlog.json");
        fs::write(&path, r#"{"iterator_ttl_secs": 60}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry_config().iterator_ttl, Duration::seconds(60));

        let missing = Config::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(missing.message().contains("Failed to read config"));
    }
}
