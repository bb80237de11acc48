//! Opaque shard iterator tokens.
//!
//! A token is URL-safe base64 over a small JSON document. It names the stream
//! incarnation, shard and resolved sequence position, plus the issuance time
//! that bounds its lifetime. Nothing about outstanding tokens is tracked
//! server-side; expiry is checked when a token is presented.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{StreamError, StreamResult};
use crate::shard::ShardId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IteratorToken {
    pub stream_name: String,
    pub incarnation: Uuid,
    pub shard_id: ShardId,
    /// Sequence number of the next record to return
    pub position: u64,
    pub issued_at: DateTime<Utc>,
}

impl IteratorToken {
    pub fn new(
        stream_name: impl Into<String>,
        incarnation: Uuid,
        shard_id: ShardId,
        position: u64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_name: stream_name.into(),
            incarnation,
            shard_id,
            position,
            issued_at,
        }
    }

    /// Same cursor moved to `position`, reissued at `now`
    pub fn advance(&self, position: u64, now: DateTime<Utc>) -> Self {
        Self {
            position,
            issued_at: now,
            ..self.clone()
        }
    }

    pub fn encode(&self) -> String {
        // A struct of strings and integers always serializes
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(token: &str) -> StreamResult<Self> {
        let malformed = || StreamError::InvalidPosition("malformed shard iterator".to_string());
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim().as_bytes())
            .map_err(|_| malformed())?;
        serde_json::from_slice(&bytes).map_err(|_| malformed())
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.issued_at >= ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(now: DateTime<Utc>) -> IteratorToken {
        IteratorToken::new("orders", Uuid::new_v4(), ShardId::from_index(1), 42, now)
    }

    #[test]
    fn test_encode_decode() {
        let t = token(Utc::now());
        let encoded = t.encode();
        assert!(!encoded.contains('='));
        assert_eq!(IteratorToken::decode(&encoded).unwrap(), t);
    }

    #[test]
    fn test_garbage_is_invalid_position() {
        let err = IteratorToken::decode("not a token!").unwrap_err();
        assert_eq!(err.code(), "INVALID_POSITION");

        let not_json = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert_eq!(IteratorToken::decode(&not_json).unwrap_err().code(), "INVALID_POSITION");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let t = token(now);
        let ttl = Duration::minutes(5);
        assert!(!t.is_expired(now + Duration::minutes(4), ttl));
        assert!(t.is_expired(now + Duration::minutes(5), ttl));
    }

    #[test]
    fn test_advance_refreshes_issue_time() {
        let now = Utc::now();
        let t = token(now);
        let later = now + Duration::minutes(3);
        let next = t.advance(50, later);
        assert_eq!(next.position, 50);
        assert_eq!(next.issued_at, later);
        assert_eq!(next.incarnation, t.incarnation);
    }
}
