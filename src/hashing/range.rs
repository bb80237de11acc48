//! Hash-key ranges.
//!
//! A range is stored as `[starting_hash_key, ending_hash_key]` with an inclusive
//! end so the full space fits in a `u128`. The half-open form is
//! `[starting_hash_key, ending_hash_key + 1)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{hash_key_string, HashKey, MAX_HASH_KEY};
use crate::errors::{StreamError, StreamResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashKeyRange {
    #[serde(with = "hash_key_string")]
    pub starting_hash_key: HashKey,
    #[serde(with = "hash_key_string")]
    pub ending_hash_key: HashKey,
}

impl HashKeyRange {
    /// Create a range; `start` must not exceed `end`
    pub fn new(start: HashKey, end: HashKey) -> StreamResult<Self> {
        if start > end {
            return Err(StreamError::InvalidArgument(format!(
                "hash key range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self {
            starting_hash_key: start,
            ending_hash_key: end,
        })
    }

    /// The entire key space
    pub fn full() -> Self {
        Self {
            starting_hash_key: 0,
            ending_hash_key: MAX_HASH_KEY,
        }
    }

    pub fn contains(&self, key: HashKey) -> bool {
        self.starting_hash_key <= key && key <= self.ending_hash_key
    }

    /// Whether the range holds a single key and so cannot be split
    pub fn is_single_key(&self) -> bool {
        self.starting_hash_key == self.ending_hash_key
    }

    /// True when `other` begins right after `self` ends, or the reverse
    pub fn is_adjacent_to(&self, other: &HashKeyRange) -> bool {
        let follows = |a: &HashKeyRange, b: &HashKeyRange| {
            a.ending_hash_key.checked_add(1) == Some(b.starting_hash_key)
        };
        follows(self, other) || follows(other, self)
    }

    pub fn overlaps(&self, other: &HashKeyRange) -> bool {
        self.starting_hash_key <= other.ending_hash_key
            && other.starting_hash_key <= self.ending_hash_key
    }

    /// First key of the upper half when splitting evenly
    pub fn midpoint(&self) -> StreamResult<HashKey> {
        if self.is_single_key() {
            return Err(StreamError::InvalidArgument(format!(
                "hash key range {} holds a single key",
                self
            )));
        }
        Ok(self.starting_hash_key + (self.ending_hash_key - self.starting_hash_key) / 2 + 1)
    }

    /// Split into `[start, at - 1]` and `[at, end]`.
    ///
    /// `at` must leave both halves non-empty: `start < at <= end`.
    pub fn split_at(&self, at: HashKey) -> StreamResult<(HashKeyRange, HashKeyRange)> {
        if at <= self.starting_hash_key || at > self.ending_hash_key {
            return Err(StreamError::InvalidArgument(format!(
                "new starting hash key {} must fall strictly inside {}",
                at, self
            )));
        }
        Ok((
            HashKeyRange {
                starting_hash_key: self.starting_hash_key,
                ending_hash_key: at - 1,
            },
            HashKeyRange {
                starting_hash_key: at,
                ending_hash_key: self.ending_hash_key,
            },
        ))
    }

    /// Union of two adjacent ranges
    pub fn union(&self, other: &HashKeyRange) -> StreamResult<HashKeyRange> {
        if !self.is_adjacent_to(other) {
            return Err(StreamError::InvalidArgument(format!(
                "hash key ranges {} and {} are not adjacent",
                self, other
            )));
        }
        Ok(HashKeyRange {
            starting_hash_key: self.starting_hash_key.min(other.starting_hash_key),
            ending_hash_key: self.ending_hash_key.max(other.ending_hash_key),
        })
    }

    /// Partition the full space into `count` contiguous ranges of equal width
    /// (`floor(2^128 / count)`); the last range absorbs the remainder.
    pub fn even_partition(count: u32) -> StreamResult<Vec<HashKeyRange>> {
        if count == 0 {
            return Err(StreamError::InvalidArgument(
                "shard count must be at least 1".to_string(),
            ));
        }
        if count == 1 {
            return Ok(vec![HashKeyRange::full()]);
        }

        let n = count as u128;
        // floor((MAX + 1) / n) without overflowing
        let width = MAX_HASH_KEY / n + (MAX_HASH_KEY % n + 1) / n;

        let ranges = (0..n)
            .map(|i| {
                let start = width * i;
                let end = if i == n - 1 {
                    MAX_HASH_KEY
                } else {
                    width * (i + 1) - 1
                };
                HashKeyRange {
                    starting_hash_key: start,
                    ending_hash_key: end,
                }
            })
            .collect();
        Ok(ranges)
    }

    /// Check that `ranges` exactly tile the key space: sorted by start they must
    /// begin at 0, end at MAX, and each must start right after its predecessor.
    pub fn covers_key_space(ranges: &[HashKeyRange]) -> bool {
        let mut sorted: Vec<&HashKeyRange> = ranges.iter().collect();
        sorted.sort_by_key(|r| r.starting_hash_key);

        let (first, last) = match (sorted.first(), sorted.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return false,
        };
        if first.starting_hash_key != 0 || last.ending_hash_key != MAX_HASH_KEY {
            return false;
        }
        sorted
            .windows(2)
            .all(|w| w[0].ending_hash_key.checked_add(1) == Some(w[1].starting_hash_key))
    }
}

impl fmt::Display for HashKeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.starting_hash_key, self.ending_hash_key)
    }
}
