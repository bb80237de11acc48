//! Stream status and encryption settings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stream lifecycle: CREATING → ACTIVE ⇄ UPDATING → DELETING → gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Creating,
    Active,
    Updating,
    Deleting,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamStatus::Creating => "CREATING",
            StreamStatus::Active => "ACTIVE",
            StreamStatus::Updating => "UPDATING",
            StreamStatus::Deleting => "DELETING",
        }
    }

    /// Records may be written while ACTIVE or UPDATING
    pub fn accepts_writes(&self) -> bool {
        matches!(self, StreamStatus::Active | StreamStatus::Updating)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server-side encryption setting.
///
/// Recorded and reported only; payload bytes are stored as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encryption_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Encryption {
    #[default]
    None,
    Kms { key_id: String },
}

impl Encryption {
    /// Key id used when a caller asks for encryption without naming a key
    pub const DEFAULT_KEY_ID: &'static str = "alias/shardlog";

    pub fn kms(key_id: impl Into<String>) -> Self {
        Encryption::Kms {
            key_id: key_id.into(),
        }
    }

    pub fn default_kms() -> Self {
        Self::kms(Self::DEFAULT_KEY_ID)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Encryption::Kms { .. })
    }

    pub fn type_str(&self) -> &'static str {
        match self {
            Encryption::None => "NONE",
            Encryption::Kms { .. } => "KMS",
        }
    }
}
