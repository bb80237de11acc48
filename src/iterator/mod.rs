//! # Shard Iterators
//!
//! An iterator is resolved to a concrete sequence position when it is issued:
//!
//! - `LATEST`: the shard's tail at issuance. Records appended afterwards are
//!   all seen; records appended before are not.
//! - `TRIM_HORIZON`: the oldest record still inside the retention window.
//! - `AT_SEQUENCE_NUMBER` / `AFTER_SEQUENCE_NUMBER`: the given record, or the
//!   one after it. The sequence number must have been assigned by the shard and
//!   still be retained.
//!
//! Each read hands back a new token positioned after the last returned record.
//! Tokens only move forward.

mod token;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{StreamError, StreamResult};
use crate::shard::{SequenceNumber, Shard, FIRST_SEQUENCE};

pub use token::IteratorToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardIteratorType {
    Latest,
    TrimHorizon,
    AtSequenceNumber,
    AfterSequenceNumber,
}

impl ShardIteratorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShardIteratorType::Latest => "LATEST",
            ShardIteratorType::TrimHorizon => "TRIM_HORIZON",
            ShardIteratorType::AtSequenceNumber => "AT_SEQUENCE_NUMBER",
            ShardIteratorType::AfterSequenceNumber => "AFTER_SEQUENCE_NUMBER",
        }
    }

    pub fn needs_sequence_number(&self) -> bool {
        matches!(
            self,
            ShardIteratorType::AtSequenceNumber | ShardIteratorType::AfterSequenceNumber
        )
    }
}

impl fmt::Display for ShardIteratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShardIteratorType {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LATEST" => Ok(ShardIteratorType::Latest),
            "TRIM_HORIZON" => Ok(ShardIteratorType::TrimHorizon),
            "AT_SEQUENCE_NUMBER" => Ok(ShardIteratorType::AtSequenceNumber),
            "AFTER_SEQUENCE_NUMBER" => Ok(ShardIteratorType::AfterSequenceNumber),
            other => Err(StreamError::InvalidPosition(format!(
                "unknown shard iterator type: {}",
                other
            ))),
        }
    }
}

/// Where a new iterator starts: the iterator type plus, for the AT/AFTER
/// types, the sequence number it is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingPosition {
    #[serde(rename = "type")]
    pub iterator_type: ShardIteratorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<SequenceNumber>,
}

impl StartingPosition {
    pub fn latest() -> Self {
        Self {
            iterator_type: ShardIteratorType::Latest,
            sequence_number: None,
        }
    }

    pub fn trim_horizon() -> Self {
        Self {
            iterator_type: ShardIteratorType::TrimHorizon,
            sequence_number: None,
        }
    }

    pub fn at(sequence_number: SequenceNumber) -> Self {
        Self {
            iterator_type: ShardIteratorType::AtSequenceNumber,
            sequence_number: Some(sequence_number),
        }
    }

    pub fn after(sequence_number: SequenceNumber) -> Self {
        Self {
            iterator_type: ShardIteratorType::AfterSequenceNumber,
            sequence_number: Some(sequence_number),
        }
    }

    pub fn resolve(&self, shard: &Shard, now: DateTime<Utc>) -> StreamResult<u64> {
        resolve_position(shard, self.iterator_type, self.sequence_number, now)
    }
}

/// Resolve an iterator request against `shard` to the sequence position of the
/// first record it will return.
pub fn resolve_position(
    shard: &Shard,
    iterator_type: ShardIteratorType,
    sequence_number: Option<SequenceNumber>,
    now: DateTime<Utc>,
) -> StreamResult<u64> {
    match iterator_type {
        ShardIteratorType::Latest => Ok(shard.tail()),
        ShardIteratorType::TrimHorizon => Ok(shard.trim_horizon(now)),
        ShardIteratorType::AtSequenceNumber | ShardIteratorType::AfterSequenceNumber => {
            let seq = sequence_number.ok_or_else(|| {
                StreamError::InvalidPosition(format!(
                    "{} requires a starting sequence number",
                    iterator_type
                ))
            })?;

            let value = seq.value();
            if value < FIRST_SEQUENCE || value >= shard.tail() {
                return Err(StreamError::InvalidPosition(format!(
                    "sequence number {} was not assigned by shard {}",
                    seq,
                    shard.id()
                )));
            }
            if value < shard.trim_horizon(now) {
                return Err(StreamError::InvalidPosition(format!(
                    "sequence number {} in shard {} is past the retention window",
                    seq,
                    shard.id()
                )));
            }

            Ok(match iterator_type {
                ShardIteratorType::AfterSequenceNumber => value + 1,
                _ => value,
            })
        }
    }
}
