//! shardlog - sharded, append-only record streams
//!
//! A registry holds named streams. Each stream splits a 128-bit hash-key
//! space across shards; a record is routed by hashing its partition key and
//! gets a strictly increasing sequence number within its shard. Readers
//! consume a shard through iterator tokens. Shards can be split and merged
//! while producers keep writing, and records age out after the stream's
//! retention period.
//!
//! With a data directory configured, every mutation is journaled before it
//! is applied and the registry is rebuilt from the journal on open.

pub mod api;
pub mod cli;
pub mod clock;
pub mod errors;
pub mod hashing;
pub mod iterator;
pub mod journal;
pub mod observability;
pub mod registry;
pub mod shard;
pub mod stream;

pub use errors::{StreamError, StreamResult};
pub use registry::{Registry, RegistryConfig};
