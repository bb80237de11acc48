//! Journal recovery tests
//!
//! A durable registry reopened from its data directory must reproduce the
//! same streams, shard lineage, sequence numbers and arrival times. A torn
//! final frame is dropped; a damaged complete frame stops the open.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use shardlog::clock::MockClock;
use shardlog::hashing::HashKeyRange;
use shardlog::iterator::StartingPosition;
use shardlog::journal::{journal_path, read_journal, JournalEntry, FRAME_HEADER_LEN};
use shardlog::registry::{Registry, RegistryConfig};
use shardlog::shard::{Record, ShardId};
use shardlog::stream::Encryption;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn open(dir: &Path, clock: &Arc<MockClock>) -> Registry {
    Registry::open_with_clock(RegistryConfig::durable(dir), clock.clone())
        .expect("Failed to open durable registry")
}

fn open_compacting(dir: &Path, clock: &Arc<MockClock>, threshold: u64) -> Registry {
    let config = RegistryConfig::durable(dir).with_journal_compaction_threshold(threshold);
    Registry::open_with_clock(config, clock.clone()).expect("Failed to open durable registry")
}

fn journal_len(dir: &Path) -> u64 {
    fs::metadata(journal_path(dir)).unwrap().len()
}

fn all_records(registry: &Registry, name: &str) -> Vec<(ShardId, Record)> {
    let mut out = Vec::new();
    for shard in registry.describe_stream(name).unwrap().shards {
        let token = registry
            .get_shard_iterator(name, &shard.shard_id, &StartingPosition::trim_horizon())
            .unwrap();
        let batch = registry.get_records(&token, None).unwrap();
        out.extend(batch.records.into_iter().map(|r| (shard.shard_id.clone(), r)));
    }
    out
}

/// A stream that has been through every journaled mutation
fn populate(registry: &Registry, clock: &MockClock) {
    registry.create_stream("orders", 2, Encryption::None).unwrap();
    for i in 0..20 {
        registry
            .put_record("orders", &format!("customer-{}", i), format!("order {}", i).as_bytes())
            .unwrap();
        clock.advance(Duration::milliseconds(250));
    }

    let at = HashKeyRange::full().midpoint().unwrap() / 2;
    let split = registry.split_shard("orders", &ShardId::from_index(0), at).unwrap();
    for i in 20..30 {
        registry
            .put_record("orders", &format!("customer-{}", i), b"after split")
            .unwrap();
    }
    let [lower, upper] = split.child_shard_ids;
    registry.merge_shards("orders", &lower, &upper).unwrap();
    registry.put_record("orders", "customer-0", b"after merge").unwrap();

    registry.start_stream_encryption("orders", Some("alias/orders")).unwrap();
    registry.set_retention_period("orders", 72).unwrap();

    registry.create_stream("scratch", 1, Encryption::None).unwrap();
    registry.put_record("scratch", "k", b"doomed").unwrap();
    registry.delete_stream("scratch").unwrap();
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_reopen_reproduces_state() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());

    let (description, records) = {
        let registry = open(temp_dir.path(), &clock);
        assert!(registry.is_durable());
        populate(&registry, &clock);
        (
            registry.describe_stream("orders").unwrap(),
            all_records(&registry, "orders"),
        )
    };
    // Registry dropped, simulating process exit

    let registry = open(temp_dir.path(), &clock);
    assert_eq!(registry.describe_stream("orders").unwrap(), description);
    assert_eq!(all_records(&registry, "orders"), records);
    assert_eq!(registry.list_all_stream_names(10).unwrap(), vec!["orders"]);
    assert_eq!(description.retention_period_hours, 72);
    assert_eq!(description.encryption, Encryption::kms("alias/orders"));

    // Replay is not new traffic
    assert_eq!(registry.metrics().records_put, 0);
    assert!(registry.replayed_entries() > 30);
}

#[test]
fn test_writes_continue_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());

    let first = {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"one").unwrap()
    };

    let registry = open(temp_dir.path(), &clock);
    let second = registry.put_record("s", "k", b"two").unwrap();
    assert_eq!(second.shard_id, first.shard_id);
    assert_eq!(second.sequence_number.value(), first.sequence_number.value() + 1);

    // Ids keep growing past what the journal already used
    let at = HashKeyRange::full().midpoint().unwrap();
    let split = registry.split_shard("s", &first.shard_id, at).unwrap();
    drop(registry);

    let registry = open(temp_dir.path(), &clock);
    let ids = registry.describe_stream("s").unwrap().shards;
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[1].shard_id, split.child_shard_ids[0]);
    assert_eq!(ids[2].shard_id, split.child_shard_ids[1]);
}

#[test]
fn test_iterator_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());

    let token = {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"before").unwrap();
        registry
            .get_shard_iterator("s", &ShardId::from_index(0), &StartingPosition::latest())
            .unwrap()
    };

    let registry = open(temp_dir.path(), &clock);
    registry.put_record("s", "k", b"after").unwrap();
    let batch = registry.get_records(&token, None).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].data, b"after");
}

#[test]
fn test_deleted_stream_stays_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"old life").unwrap();
        registry.delete_stream("s").unwrap();
        registry.create_stream("s", 2, Encryption::None).unwrap();
    }

    let registry = open(temp_dir.path(), &clock);
    let description = registry.describe_stream("s").unwrap();
    assert_eq!(description.shards.len(), 2);
    assert!(all_records(&registry, "s").is_empty());
}

#[test]
fn test_failed_mutations_are_not_journaled() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    let len_after_create = {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        let len = fs::metadata(journal_path(temp_dir.path())).unwrap().len();

        let oversized = vec![0u8; registry.config().max_record_bytes + 1];
        assert!(registry.put_record("s", "k", &oversized).is_err());
        assert!(registry.split_shard("s", &ShardId::from_index(0), 0).is_err());
        assert!(registry.set_retention_period("s", 0).is_err());
        len
    };

    assert_eq!(fs::metadata(journal_path(temp_dir.path())).unwrap().len(), len_after_create);
    assert_eq!(read_journal(&journal_path(temp_dir.path())).unwrap().entries.len(), 1);
}

// =============================================================================
// Compaction
// =============================================================================

#[test]
fn test_compaction_reproduces_state() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());

    let (description, records, tokens) = {
        let registry = open_compacting(temp_dir.path(), &clock, 10);
        populate(&registry, &clock);
        let description = registry.describe_stream("orders").unwrap();
        let tokens: Vec<(ShardId, String)> = description
            .open_shards()
            .map(|s| {
                let token = registry
                    .get_shard_iterator("orders", &s.shard_id, &StartingPosition::latest())
                    .unwrap();
                (s.shard_id.clone(), token)
            })
            .collect();
        (description, all_records(&registry, "orders"), tokens)
    };
    let len_before = journal_len(temp_dir.path());

    let registry = open_compacting(temp_dir.path(), &clock, 10);
    assert_eq!(registry.describe_stream("orders").unwrap(), description);
    assert_eq!(all_records(&registry, "orders"), records);
    assert_eq!(registry.list_all_stream_names(10).unwrap(), vec!["orders"]);

    // One snapshot for the live stream; the deleted one is gone from the file
    let entries = read_journal(&journal_path(temp_dir.path())).unwrap().entries;
    assert_eq!(entries.len(), 1);
    assert!(matches!(&entries[0], JournalEntry::StreamSnapshot { snapshot } if snapshot.name == "orders"));
    assert!(journal_len(temp_dir.path()) < len_before);

    // Tokens and numbering carry across the rewrite
    let put = registry.put_record("orders", "customer-0", b"after compaction").unwrap();
    let (_, token) = tokens.iter().find(|(id, _)| *id == put.shard_id).unwrap();
    let batch = registry.get_records(token, None).unwrap();
    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].sequence_number, put.sequence_number);

    // Shards 0 through 4 exist or existed; the next split continues at 5
    let open_shard = description.open_shards().next().unwrap();
    let at = open_shard.hash_key_range.midpoint().unwrap();
    let split = registry.split_shard("orders", &open_shard.shard_id, at).unwrap();
    assert_eq!(split.child_shard_ids, [ShardId::from_index(5), ShardId::from_index(6)]);
    let description = registry.describe_stream("orders").unwrap();
    let records = all_records(&registry, "orders");
    drop(registry);

    // Snapshot followed by ordinary entries replays too
    let registry = open_compacting(temp_dir.path(), &clock, 10);
    assert_eq!(registry.describe_stream("orders").unwrap(), description);
    assert_eq!(all_records(&registry, "orders"), records);
}

#[test]
fn test_compaction_drops_expired_records() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    {
        let registry = open_compacting(temp_dir.path(), &clock, 1);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        for _ in 0..50 {
            registry.put_record("s", "k", &[7u8; 1024]).unwrap();
        }
    }
    let len_before = journal_len(temp_dir.path());

    clock.advance(Duration::hours(25));
    let registry = open_compacting(temp_dir.path(), &clock, 1);
    assert!(journal_len(temp_dir.path()) * 10 < len_before);
    assert!(all_records(&registry, "s").is_empty());
    // Trimming on open is not new traffic
    assert_eq!(registry.metrics().records_trimmed, 0);

    let put = registry.put_record("s", "k", b"fresh").unwrap();
    assert_eq!(put.sequence_number.value(), 51);
    let err = registry
        .get_shard_iterator("s", &ShardId::from_index(0), &StartingPosition::at(shardlog::shard::SequenceNumber::new(50)))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_POSITION");
}

#[test]
fn test_short_journal_is_left_alone() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"one").unwrap();
    }

    let registry = open(temp_dir.path(), &clock);
    assert_eq!(registry.replayed_entries(), 2);
    let entries = read_journal(&journal_path(temp_dir.path())).unwrap().entries;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].kind(), "stream_created");
}

// =============================================================================
// Damage
// =============================================================================

#[test]
fn test_torn_tail_is_dropped() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"durable").unwrap();
    }

    let path = journal_path(temp_dir.path());
    let intact_len = fs::metadata(&path).unwrap().len();
    {
        // Half a header and a few body bytes, as a crash mid-append leaves
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x40, 0x00, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD, b'{', b'"']).unwrap();
    }

    let registry = open(temp_dir.path(), &clock);
    assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
    assert_eq!(all_records(&registry, "s").len(), 1);

    registry.put_record("s", "k", b"next").unwrap();
    drop(registry);
    let registry = open(temp_dir.path(), &clock);
    assert_eq!(all_records(&registry, "s").len(), 2);
}

#[test]
fn test_checksum_mismatch_halts_open() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(MockClock::new());
    {
        let registry = open(temp_dir.path(), &clock);
        registry.create_stream("s", 1, Encryption::None).unwrap();
        registry.put_record("s", "k", b"payload").unwrap();
    }

    let path = journal_path(temp_dir.path());
    let mut bytes = fs::read(&path).unwrap();
    let target = FRAME_HEADER_LEN + 4;
    bytes[target] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let err = Registry::open_with_clock(RegistryConfig::durable(temp_dir.path()), clock.clone())
        .err()
        .expect("open should refuse a damaged journal");
    assert_eq!(err.code(), "JOURNAL_CORRUPTION");
    assert!(err.is_fatal());

    // Nothing was cut off the damaged file
    assert_eq!(fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_in_memory_registry_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let registry = Registry::open(RegistryConfig::in_memory()).unwrap();
    assert!(!registry.is_durable());
    registry.create_stream("s", 1, Encryption::None).unwrap();
    assert!(fs::read_dir(temp_dir.path()).unwrap().next().is_none());
}
