//! Concurrency tests
//!
//! Producers share one registry across threads. Per-shard sequence numbers
//! stay gap-free and unique, and a split racing with producers neither loses
//! nor duplicates a record.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use shardlog::hashing::HashKeyRange;
use shardlog::iterator::StartingPosition;
use shardlog::registry::Registry;
use shardlog::shard::ShardId;
use shardlog::stream::Encryption;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 250;

/// Every record in the stream, by shard, read from TRIM_HORIZON
fn drain(registry: &Registry, name: &str) -> BTreeMap<ShardId, Vec<(u64, Vec<u8>)>> {
    let mut out = BTreeMap::new();
    for shard in registry.describe_stream(name).unwrap().shards {
        let mut token = registry
            .get_shard_iterator(name, &shard.shard_id, &StartingPosition::trim_horizon())
            .unwrap();
        let mut records = Vec::new();
        loop {
            let batch = registry.get_records(&token, Some(500)).unwrap();
            let empty = batch.records.is_empty();
            records.extend(
                batch
                    .records
                    .into_iter()
                    .map(|r| (r.sequence_number.value(), r.data)),
            );
            match batch.next_shard_iterator {
                Some(next) if !empty => token = next,
                _ => break,
            }
        }
        out.insert(shard.shard_id, records);
    }
    out
}

fn produce(registry: &Registry, producer: usize) {
    for i in 0..PER_PRODUCER {
        let key = format!("p{}-{}", producer, i % 17);
        let payload = format!("{}:{}", producer, i);
        registry.put_record("load", &key, payload.as_bytes()).unwrap();
    }
}

fn assert_gap_free(records: &BTreeMap<ShardId, Vec<(u64, Vec<u8>)>>) {
    for (shard_id, shard_records) in records {
        for (i, (sequence, _)) in shard_records.iter().enumerate() {
            assert_eq!(*sequence, i as u64 + 1, "gap in {}", shard_id);
        }
    }
}

fn payload_set(records: &BTreeMap<ShardId, Vec<(u64, Vec<u8>)>>) -> (usize, BTreeSet<Vec<u8>>) {
    let all: Vec<Vec<u8>> = records
        .values()
        .flat_map(|r| r.iter().map(|(_, data)| data.clone()))
        .collect();
    let total = all.len();
    (total, all.into_iter().collect())
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_concurrent_producers_one_shard() {
    let registry = Registry::new();
    registry.create_stream("load", 1, Encryption::None).unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let registry = &registry;
            scope.spawn(move || produce(registry, producer));
        }
    });

    let records = drain(&registry, "load");
    assert_gap_free(&records);
    let (total, unique) = payload_set(&records);
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
    assert_eq!(unique.len(), total);
}

#[test]
fn test_producers_and_readers_together() {
    let registry = Registry::new();
    registry.create_stream("load", 4, Encryption::None).unwrap();
    let done = AtomicBool::new(false);

    thread::scope(|scope| {
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let registry = &registry;
                scope.spawn(move || produce(registry, producer))
            })
            .collect();

        // A reader tails one shard while writes land
        let reader = scope.spawn(|| {
            let shard_id = ShardId::from_index(0);
            let mut token = registry
                .get_shard_iterator("load", &shard_id, &StartingPosition::trim_horizon())
                .unwrap();
            let mut last = 0u64;
            loop {
                let finished = done.load(Ordering::SeqCst);
                let batch = registry.get_records(&token, Some(100)).unwrap();
                for record in &batch.records {
                    assert_eq!(record.sequence_number.value(), last + 1);
                    last += 1;
                }
                token = batch.next_shard_iterator.unwrap();
                if finished && batch.records.is_empty() {
                    return last;
                }
            }
        });

        for producer in producers {
            producer.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);
        let read = reader.join().unwrap();
        assert_eq!(read as usize, drain(&registry, "load")[&ShardId::from_index(0)].len());
    });
}

#[test]
fn test_split_during_writes_loses_nothing() {
    let registry = Registry::new();
    registry.create_stream("load", 1, Encryption::None).unwrap();

    thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let registry = &registry;
            scope.spawn(move || produce(registry, producer));
        }
        scope.spawn(|| {
            let at = HashKeyRange::full().midpoint().unwrap();
            registry.split_shard("load", &ShardId::from_index(0), at).unwrap();
        });
    });

    let description = registry.describe_stream("load").unwrap();
    assert_eq!(description.shards.len(), 3);
    let ranges: Vec<HashKeyRange> = description
        .shards
        .iter()
        .filter(|s| s.is_open())
        .map(|s| s.hash_key_range)
        .collect();
    assert!(HashKeyRange::covers_key_space(&ranges));

    let records = drain(&registry, "load");
    assert_gap_free(&records);
    let (total, unique) = payload_set(&records);
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
    assert_eq!(unique.len(), total);
}

#[test]
fn test_concurrent_durable_writes_replay_identically() {
    let temp_dir = TempDir::new().unwrap();
    let before = {
        let registry = Registry::open(shardlog::RegistryConfig::durable(temp_dir.path())).unwrap();
        registry.create_stream("load", 3, Encryption::None).unwrap();
        thread::scope(|scope| {
            for producer in 0..4 {
                let registry = &registry;
                scope.spawn(move || produce(registry, producer));
            }
        });
        drain(&registry, "load")
    };

    let registry = Registry::open(shardlog::RegistryConfig::durable(temp_dir.path())).unwrap();
    assert_eq!(drain(&registry, "load"), before);
}

#[test]
fn test_concurrent_creates_of_one_name() {
    let registry = Registry::new();
    let descriptions: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|_| scope.spawn(|| registry.create_stream("shared", 2, Encryption::None).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first = &descriptions[0];
    assert!(descriptions.iter().all(|d| d.shards == first.shards));
    assert_eq!(registry.metrics().streams_created, 1);
}
