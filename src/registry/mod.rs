//! # Stream Registry
//!
//! The process-wide table of streams and the request/response API over it.
//!
//! A `Registry` is an explicit value: construct it, call operations on it, drop
//! it. Nothing is global. Time comes from an injected `Clock`, so provisioning
//! delay, retention and iterator expiry are all evaluated on demand without a
//! background thread.
//!
//! ## Durability
//!
//! With a `data_dir`, every mutation is journaled under the lock that makes it
//! visible, after validation and before the in-memory change. A failed journal
//! write leaves the registry exactly as it was.
//!
//! Lock order: stream table, then stream topology, then shard log, then
//! journal. Stream state flags are only ever taken innermost.

mod config;
mod output;
mod replay;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::errors::{StreamError, StreamResult};
use crate::hashing::HashKey;
use crate::iterator::{IteratorToken, StartingPosition};
use crate::journal::{compact_journal, open_journal, JournalEntry, JournalWriter};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, MetricsSnapshot};
use crate::shard::ShardId;
use crate::stream::{Encryption, Stream, StreamDescription, StreamStatus};

pub use config::{
    ExpiredIteratorPolicy, RegistryConfig, DEFAULT_ITERATOR_TTL_SECS,
    DEFAULT_JOURNAL_COMPACTION_THRESHOLD, DEFAULT_LIST_LIMIT, DEFAULT_MAX_GET_RECORDS,
    DEFAULT_MAX_PARTITION_KEY_LEN, DEFAULT_MAX_RECORD_BYTES, DEFAULT_MAX_SHARDS_PER_STREAM,
    DEFAULT_RETENTION_HOURS, MAX_RETENTION_HOURS, MIN_RETENTION_HOURS,
};
pub use output::{
    GetRecordsOutput, ListStreamsOutput, MergeShardsOutput, PutRecordOutput, RetiredShard,
    SplitShardOutput, SweepOutput,
};

const STREAM_NAME_PATTERN: &str = r"^[a-zA-Z0-9_.\-]{1,128}$";

static STREAM_NAME_REGEX: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn validate_stream_name(name: &str) -> StreamResult<()> {
    let pattern = STREAM_NAME_REGEX
        .get_or_init(|| Regex::new(STREAM_NAME_PATTERN))
        .as_ref()
        .map_err(|e| StreamError::InvalidArgument(e.to_string()))?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(StreamError::InvalidArgument(format!(
            "stream name {:?} must be 1-128 characters of [a-zA-Z0-9_.-]",
            name
        )))
    }
}

pub struct Registry {
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    streams: RwLock<BTreeMap<String, Arc<Stream>>>,
    journal: Option<Mutex<JournalWriter>>,
    /// Entries applied from the journal at open
    replayed_entries: u64,
    metrics: MetricsRegistry,
}

impl Registry {
    /// In-memory registry with default limits and wall-clock time
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// In-memory registry with default limits
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::bare(RegistryConfig::default(), clock)
    }

    fn bare(config: RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            streams: RwLock::new(BTreeMap::new()),
            journal: None,
            replayed_entries: 0,
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn open(config: RegistryConfig) -> StreamResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Validate `config` and, if it names a data directory, replay the journal
    /// there before accepting requests.
    pub fn open_with_clock(config: RegistryConfig, clock: Arc<dyn Clock>) -> StreamResult<Self> {
        config.validate()?;
        let data_dir = config.data_dir.clone();
        let mut registry = Self::bare(config, clock);

        if let Some(dir) = data_dir {
            let (writer, entries) = open_journal(&dir)?;
            registry.replayed_entries = entries.len() as u64;
            registry.replay(entries)?;

            let threshold = registry.config.journal_compaction_threshold;
            let writer = if threshold > 0 && registry.replayed_entries >= threshold {
                registry.compact(&dir, writer)?
            } else {
                writer
            };
            registry.journal = Some(Mutex::new(writer));
        }

        log_event_with_fields(
            Event::RegistryOpen,
            &[
                ("durable", if registry.is_durable() { "true" } else { "false" }),
                ("streams", &registry.read_streams().len().to_string()),
            ],
        );
        Ok(registry)
    }

    /// Rewrite the journal from the replayed state. Runs before the registry
    /// is shared, so the snapshot cannot miss a concurrent mutation.
    fn compact(&self, dir: &Path, writer: JournalWriter) -> StreamResult<JournalWriter> {
        let bytes_before = writer.len();
        drop(writer);

        let entries = self.snapshot_entries();
        match compact_journal(dir, &entries) {
            Ok(writer) => {
                log_event_with_fields(
                    Event::JournalCompacted,
                    &[
                        ("bytes_after", &writer.len().to_string()),
                        ("bytes_before", &bytes_before.to_string()),
                        ("entries_after", &entries.len().to_string()),
                        ("entries_before", &self.replayed_entries.to_string()),
                    ],
                );
                Ok(writer)
            }
            Err(e) => {
                log_event_with_fields(Event::JournalCompactionFailed, &[("reason", &e.to_string())]);
                // Whichever file now sits at the journal path replays to this state
                Ok(JournalWriter::open(dir)?)
            }
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    pub fn replayed_entries(&self) -> u64 {
        self.replayed_entries
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn read_streams(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<Stream>>> {
        self.streams.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_streams(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<Stream>>> {
        self.streams.write().unwrap_or_else(|e| e.into_inner())
    }

    fn stream(&self, name: &str) -> StreamResult<Arc<Stream>> {
        self.read_streams()
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::StreamNotFound(name.to_string()))
    }

    /// Journal `entry` if durability is on.
    ///
    /// With `live` set, the write is refused once that stream is being deleted;
    /// deletion marks the stream under the same journal lock, so nothing for a
    /// stream is ever journaled after its deletion.
    fn journal<F>(&self, live: Option<&Stream>, entry: F) -> StreamResult<()>
    where
        F: FnOnce() -> JournalEntry,
    {
        let Some(journal) = &self.journal else {
            return Ok(());
        };
        let mut writer = journal.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stream) = live {
            if stream.is_deleting() {
                return Err(StreamError::StreamNotFound(stream.name().to_string()));
            }
        }
        self.append_entry(&mut writer, &entry())
    }

    fn append_entry(&self, writer: &mut JournalWriter, entry: &JournalEntry) -> StreamResult<()> {
        let was_poisoned = writer.is_poisoned();
        if let Err(e) = writer.append(entry) {
            if !was_poisoned && writer.is_poisoned() {
                log_event_with_fields(
                    Event::JournalPoisoned,
                    &[("path", &writer.path().display().to_string()), ("reason", &e.to_string())],
                );
            }
            return Err(e.into());
        }
        self.metrics.increment_journal_entries();
        Ok(())
    }

    // ==================
    // Stream lifecycle
    // ==================

    /// Create a stream, or return the existing one of the same name.
    ///
    /// A repeated create is a no-op even if its parameters differ; the
    /// mismatch is logged.
    pub fn create_stream(
        &self,
        name: &str,
        shard_count: u32,
        encryption: Encryption,
    ) -> StreamResult<StreamDescription> {
        self.create(name, shard_count, encryption, false)
    }

    /// Like `create_stream` but fails with `AlreadyExists` on a taken name
    pub fn try_create_stream(
        &self,
        name: &str,
        shard_count: u32,
        encryption: Encryption,
    ) -> StreamResult<StreamDescription> {
        self.create(name, shard_count, encryption, true)
    }

    fn create(
        &self,
        name: &str,
        shard_count: u32,
        encryption: Encryption,
        exclusive: bool,
    ) -> StreamResult<StreamDescription> {
        validate_stream_name(name)?;
        if shard_count == 0 || shard_count > self.config.max_shards_per_stream {
            return Err(StreamError::InvalidArgument(format!(
                "shard count must be in 1..={}, got {}",
                self.config.max_shards_per_stream, shard_count
            )));
        }
        if let Encryption::Kms { key_id } = &encryption {
            if key_id.is_empty() {
                return Err(StreamError::InvalidArgument("key id cannot be empty".to_string()));
            }
        }

        let now = self.now();
        let mut streams = self.write_streams();

        if let Some(existing) = streams.get(name) {
            if exclusive {
                return Err(StreamError::AlreadyExists(name.to_string()));
            }
            let matches = existing.open_shard_count() == shard_count as usize
                && existing.encryption() == encryption;
            log_event_with_fields(
                Event::StreamCreateIgnored,
                &[
                    ("stream", name),
                    ("parameters_match", if matches { "true" } else { "false" }),
                ],
            );
            return Ok(existing.describe(now));
        }

        let incarnation = Uuid::new_v4();
        let retention = self.config.retention;
        let ready_at = now + self.config.provisioning_delay;
        let stream = Stream::new(
            name,
            incarnation,
            shard_count,
            encryption.clone(),
            retention,
            now,
            ready_at,
        )?;

        self.journal(None, || JournalEntry::StreamCreated {
            name: name.to_string(),
            incarnation,
            shard_count,
            encryption: encryption.clone(),
            retention_secs: retention.num_seconds(),
            created_at: now,
            ready_at,
        })?;

        let description = stream.describe(now);
        streams.insert(name.to_string(), Arc::new(stream));
        self.metrics.increment_streams_created();

        log_event_with_fields(
            Event::StreamCreated,
            &[
                ("encryption", encryption.type_str()),
                ("shards", &shard_count.to_string()),
                ("status", description.stream_status.as_str()),
                ("stream", name),
            ],
        );
        Ok(description)
    }

    /// Remove a stream and all its shards. Outstanding iterators for it are
    /// permanently invalid, even if the name is created again.
    pub fn delete_stream(&self, name: &str) -> StreamResult<()> {
        let mut streams = self.write_streams();
        let stream = streams
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::StreamNotFound(name.to_string()))?;

        match &self.journal {
            Some(journal) => {
                let mut writer = journal.lock().unwrap_or_else(|e| e.into_inner());
                self.append_entry(
                    &mut writer,
                    &JournalEntry::StreamDeleted {
                        name: name.to_string(),
                        incarnation: stream.incarnation(),
                    },
                )?;
                stream.mark_deleting();
            }
            None => stream.mark_deleting(),
        }

        streams.remove(name);
        self.metrics.increment_streams_deleted();

        log_event_with_fields(
            Event::StreamDeleted,
            &[
                ("shards", &stream.shard_ids().len().to_string()),
                ("stream", name),
            ],
        );
        Ok(())
    }

    /// One page of stream names in lexicographic order, strictly after
    /// `exclusive_start`.
    pub fn list_streams(
        &self,
        limit: Option<usize>,
        exclusive_start: Option<&str>,
    ) -> StreamResult<ListStreamsOutput> {
        let limit = limit.unwrap_or(self.config.default_list_limit);
        if limit == 0 {
            return Err(StreamError::InvalidArgument(
                "list limit must be positive".to_string(),
            ));
        }

        let streams = self.read_streams();
        let lower = match exclusive_start {
            Some(start) => Bound::Excluded(start),
            None => Bound::Unbounded,
        };
        let mut names = streams.range::<str, _>((lower, Bound::Unbounded)).map(|(k, _)| k);

        let stream_names: Vec<String> = names.by_ref().take(limit).cloned().collect();
        let has_more_streams = names.next().is_some();

        Ok(ListStreamsOutput {
            stream_names,
            has_more_streams,
        })
    }

    /// Every stream name, fetched page by page
    pub fn list_all_stream_names(&self, page_size: usize) -> StreamResult<Vec<String>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.list_streams(Some(page_size), cursor.as_deref())?;
            cursor = page.stream_names.last().cloned();
            all.extend(page.stream_names);
            if !page.has_more_streams || cursor.is_none() {
                return Ok(all);
            }
        }
    }

    pub fn describe_stream(&self, name: &str) -> StreamResult<StreamDescription> {
        Ok(self.stream(name)?.describe(self.now()))
    }

    pub fn stream_status(&self, name: &str) -> StreamResult<StreamStatus> {
        Ok(self.stream(name)?.status(self.now()))
    }

    // ==================
    // Data plane
    // ==================

    /// The OPEN shard that `partition_key` currently routes to
    pub fn route(&self, name: &str, partition_key: &str) -> StreamResult<ShardId> {
        self.stream(name)?.route(partition_key)
    }

    pub fn put_record(
        &self,
        name: &str,
        partition_key: &str,
        data: &[u8],
    ) -> StreamResult<PutRecordOutput> {
        let key_len = partition_key.chars().count();
        if key_len == 0 || key_len > self.config.max_partition_key_len {
            return Err(StreamError::InvalidArgument(format!(
                "partition key must be 1-{} characters",
                self.config.max_partition_key_len
            )));
        }

        let stream = self.stream(name)?;
        let now = self.now();
        let outcome = stream.put_record(
            partition_key,
            data,
            now,
            self.config.max_record_bytes,
            |shard_id, record| {
                self.journal(Some(&*stream), || JournalEntry::RecordAppended {
                    stream: name.to_string(),
                    incarnation: stream.incarnation(),
                    shard_id: shard_id.clone(),
                    record: record.clone(),
                })
            },
        )?;

        self.metrics.record_put(data.len() as u64);
        if outcome.trimmed > 0 {
            self.metrics.add_records_trimmed(outcome.trimmed as u64);
            log_event_with_fields(
                Event::RecordsTrimmed,
                &[
                    ("records", &outcome.trimmed.to_string()),
                    ("shard_id", outcome.shard_id.as_str()),
                    ("stream", name),
                ],
            );
        }

        Ok(PutRecordOutput {
            shard_id: outcome.shard_id,
            sequence_number: outcome.record.sequence_number,
        })
    }

    /// Issue an iterator token for `shard_id`, resolved to a concrete
    /// position now.
    pub fn get_shard_iterator(
        &self,
        name: &str,
        shard_id: &ShardId,
        position: &StartingPosition,
    ) -> StreamResult<String> {
        let stream = self.stream(name)?;
        let shard = stream.shard(shard_id)?;
        let now = self.now();
        let resolved = position.resolve(&shard, now)?;

        self.metrics.increment_iterators_issued();
        Ok(IteratorToken::new(name, stream.incarnation(), shard_id.clone(), resolved, now).encode())
    }

    /// Read the next batch for an iterator.
    ///
    /// An empty batch means nothing new yet. An iterator past its lifetime, or
    /// one pointing at records retention has removed, is handled by the
    /// configured `ExpiredIteratorPolicy`.
    pub fn get_records(
        &self,
        shard_iterator: &str,
        max_records: Option<usize>,
    ) -> StreamResult<GetRecordsOutput> {
        let max_records = max_records.unwrap_or(self.config.max_get_records);
        if max_records == 0 || max_records > self.config.max_get_records {
            return Err(StreamError::InvalidArgument(format!(
                "max records must be in 1..={}",
                self.config.max_get_records
            )));
        }

        let token = IteratorToken::decode(shard_iterator)?;
        let stream = self
            .stream(&token.stream_name)
            .ok()
            .filter(|s| s.incarnation() == token.incarnation)
            .ok_or_else(|| StreamError::StreamNotFound(token.stream_name.clone()))?;
        let shard = stream.shard(&token.shard_id)?;
        let now = self.now();

        let read = if token.is_expired(now, self.config.iterator_ttl) {
            Err(StreamError::IteratorExpired(format!(
                "iterator for shard {} was issued at {} and is past its {}s lifetime",
                token.shard_id,
                token.issued_at.to_rfc3339(),
                self.config.iterator_ttl.num_seconds()
            )))
        } else {
            shard.read_from(token.position, max_records, now)
        };

        let batch = match read {
            Ok(batch) => batch,
            Err(StreamError::IteratorExpired(reason)) => {
                return self.expired_iterator(&token, &reason, shard.tail(), now);
            }
            Err(e) => return Err(e),
        };

        self.metrics.record_read(batch.records.len() as u64);

        let (next_shard_iterator, child_shards) = if batch.end_of_shard {
            (None, stream.child_shards(&token.shard_id))
        } else {
            (Some(token.advance(batch.next_position, now).encode()), Vec::new())
        };

        Ok(GetRecordsOutput {
            records: batch.records,
            next_shard_iterator,
            millis_behind_latest: batch.millis_behind_latest,
            child_shards,
            notice: None,
        })
    }

    fn expired_iterator(
        &self,
        token: &IteratorToken,
        reason: &str,
        tail: u64,
        now: DateTime<Utc>,
    ) -> StreamResult<GetRecordsOutput> {
        self.metrics.increment_iterators_expired();
        log_event_with_fields(
            Event::IteratorExpired,
            &[
                ("policy", self.config.expired_iterator_policy.as_str()),
                ("shard_id", token.shard_id.as_str()),
                ("stream", &token.stream_name),
            ],
        );

        match self.config.expired_iterator_policy {
            ExpiredIteratorPolicy::Fail => Err(StreamError::IteratorExpired(reason.to_string())),
            ExpiredIteratorPolicy::RecoverToLatest => {
                let latest = token.advance(tail, now);
                self.metrics.increment_iterators_issued();
                log_event_with_fields(
                    Event::IteratorRecovered,
                    &[
                        ("position", &tail.to_string()),
                        ("shard_id", token.shard_id.as_str()),
                        ("stream", &token.stream_name),
                    ],
                );
                Ok(GetRecordsOutput {
                    records: Vec::new(),
                    next_shard_iterator: Some(latest.encode()),
                    millis_behind_latest: 0,
                    child_shards: Vec::new(),
                    notice: Some(format!(
                        "shard iterator expired ({}); continuing from LATEST, records in between were skipped",
                        reason
                    )),
                })
            }
        }
    }

    // ==================
    // Resharding
    // ==================

    pub fn split_shard(
        &self,
        name: &str,
        shard_id: &ShardId,
        new_starting_hash_key: HashKey,
    ) -> StreamResult<SplitShardOutput> {
        let stream = self.stream(name)?;
        let now = self.now();
        let (lower, upper) = stream.split_shard(
            shard_id,
            new_starting_hash_key,
            now,
            self.config.max_shards_per_stream as usize,
            || {
                self.journal(Some(&*stream), || JournalEntry::ShardSplit {
                    stream: name.to_string(),
                    incarnation: stream.incarnation(),
                    shard_id: shard_id.clone(),
                    new_starting_hash_key,
                    at: now,
                })
            },
        )?;

        self.metrics.increment_shards_split();
        log_event_with_fields(
            Event::ShardSplit,
            &[
                ("children", &format!("{},{}", lower, upper)),
                ("new_starting_hash_key", &new_starting_hash_key.to_string()),
                ("shard_id", shard_id.as_str()),
                ("stream", name),
            ],
        );

        Ok(SplitShardOutput {
            parent_shard_id: shard_id.clone(),
            child_shard_ids: [lower, upper],
        })
    }

    pub fn merge_shards(
        &self,
        name: &str,
        shard_id: &ShardId,
        adjacent_shard_id: &ShardId,
    ) -> StreamResult<MergeShardsOutput> {
        let stream = self.stream(name)?;
        let now = self.now();
        let child = stream.merge_shards(shard_id, adjacent_shard_id, now, || {
            self.journal(Some(&*stream), || JournalEntry::ShardsMerged {
                stream: name.to_string(),
                incarnation: stream.incarnation(),
                shard_id: shard_id.clone(),
                adjacent_shard_id: adjacent_shard_id.clone(),
                at: now,
            })
        })?;

        self.metrics.increment_shards_merged();
        log_event_with_fields(
            Event::ShardsMerged,
            &[
                ("adjacent_shard_id", adjacent_shard_id.as_str()),
                ("child", child.as_str()),
                ("shard_id", shard_id.as_str()),
                ("stream", name),
            ],
        );

        Ok(MergeShardsOutput {
            parent_shard_ids: [shard_id.clone(), adjacent_shard_id.clone()],
            child_shard_id: child,
        })
    }

    // ==================
    // Stream settings
    // ==================

    /// Record KMS-style encryption for the stream. The key id is reported,
    /// never used.
    pub fn start_stream_encryption(&self, name: &str, key_id: Option<&str>) -> StreamResult<()> {
        let encryption = match key_id {
            Some("") => {
                return Err(StreamError::InvalidArgument("key id cannot be empty".to_string()))
            }
            Some(key_id) => Encryption::kms(key_id),
            None => Encryption::default_kms(),
        };
        self.change_encryption(name, encryption, Event::EncryptionStarted)
    }

    pub fn stop_stream_encryption(&self, name: &str) -> StreamResult<()> {
        self.change_encryption(name, Encryption::None, Event::EncryptionStopped)
    }

    fn change_encryption(&self, name: &str, encryption: Encryption, event: Event) -> StreamResult<()> {
        let stream = self.stream(name)?;
        let now = self.now();
        let journaled = encryption.clone();
        stream.set_encryption(encryption.clone(), now, || {
            self.journal(Some(&*stream), || JournalEntry::EncryptionChanged {
                stream: name.to_string(),
                incarnation: stream.incarnation(),
                encryption: journaled,
                at: now,
            })
        })?;

        let key_id = match &encryption {
            Encryption::Kms { key_id } => key_id.as_str(),
            Encryption::None => "",
        };
        log_event_with_fields(event, &[("key_id", key_id), ("stream", name)]);
        Ok(())
    }

    pub fn set_retention_period(&self, name: &str, hours: i64) -> StreamResult<()> {
        if !(MIN_RETENTION_HOURS..=MAX_RETENTION_HOURS).contains(&hours) {
            return Err(StreamError::InvalidArgument(format!(
                "retention period must be {}..={} hours, got {}",
                MIN_RETENTION_HOURS, MAX_RETENTION_HOURS, hours
            )));
        }

        let stream = self.stream(name)?;
        let now = self.now();
        let retention = Duration::hours(hours);
        stream.set_retention(retention, now, || {
            self.journal(Some(&*stream), || JournalEntry::RetentionChanged {
                stream: name.to_string(),
                incarnation: stream.incarnation(),
                retention_secs: retention.num_seconds(),
                at: now,
            })
        })?;

        log_event_with_fields(
            Event::RetentionChanged,
            &[("hours", &hours.to_string()), ("stream", name)],
        );
        Ok(())
    }

    // ==================
    // Retention
    // ==================

    /// Trim expired records in every stream and retire CLOSED shards that
    /// have fully aged out.
    pub fn sweep(&self) -> SweepOutput {
        let now = self.now();
        let streams: Vec<Arc<Stream>> = self.read_streams().values().cloned().collect();

        let mut output = SweepOutput::default();
        for stream in streams {
            let report = stream.sweep(now);

            if report.records_trimmed > 0 {
                log_event_with_fields(
                    Event::RecordsTrimmed,
                    &[
                        ("records", &report.records_trimmed.to_string()),
                        ("stream", stream.name()),
                    ],
                );
            }
            for shard_id in &report.shards_retired {
                log_event_with_fields(
                    Event::ShardRetired,
                    &[("shard_id", shard_id.as_str()), ("stream", stream.name())],
                );
            }

            output.records_trimmed += report.records_trimmed;
            output.shards_retired.extend(report.shards_retired.into_iter().map(|shard_id| {
                RetiredShard {
                    stream_name: stream.name().to_string(),
                    shard_id,
                }
            }));
        }

        self.metrics.add_records_trimmed(output.records_trimmed as u64);
        self.metrics.add_shards_retired(output.shards_retired.len() as u64);
        output
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
