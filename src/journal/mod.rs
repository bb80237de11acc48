//! # Journal
//!
//! Optional durable record of every registry mutation. Each entry is written
//! and synced before the mutation it describes takes effect in memory, and a
//! failed write is cut back off the file. Replay on open rebuilds the same
//! streams, shard ids, sequence numbers and arrival times.
//!
//! Retention trimming and shard retirement are not journaled; both are
//! functions of time and are recomputed after replay. Compaction rewrites a
//! long journal as one snapshot per live stream, which drops trimmed records
//! and deleted streams from the file.

mod compact;
mod entry;
mod errors;
mod reader;
mod writer;

use std::fs::OpenOptions;
use std::path::Path;

pub use compact::{compact_journal, compaction_path};
pub use entry::{JournalEntry, FRAME_HEADER_LEN};
pub use errors::{JournalError, JournalErrorCode, JournalResult, Severity};
pub use reader::{decode_frames, read_journal, JournalContents};
pub use writer::{journal_path, JournalWriter};

use crate::observability::{log_event_with_fields, Event};

/// Read the journal under `data_dir`, drop a torn tail, and open a writer
/// positioned after the last complete entry.
pub fn open_journal(data_dir: &Path) -> JournalResult<(JournalWriter, Vec<JournalEntry>)> {
    let path = journal_path(data_dir);
    let contents = read_journal(&path).inspect_err(|e| {
        if e.code() == JournalErrorCode::Corruption {
            log_event_with_fields(
                Event::JournalCorruption,
                &[("path", &path.display().to_string()), ("reason", e.message())],
            );
        }
    })?;

    if contents.has_torn_tail() {
        let file = OpenOptions::new().write(true).open(&path).map_err(|e| {
            JournalError::open_failed(format!("Failed to open journal: {}", path.display()), e)
        })?;
        file.set_len(contents.valid_len)
            .and_then(|_| file.sync_data())
            .map_err(|e| JournalError::open_failed("Failed to truncate torn journal tail", e))?;

        log_event_with_fields(
            Event::JournalTailTruncated,
            &[
                ("dropped_bytes", &contents.torn_bytes.to_string()),
                ("valid_len", &contents.valid_len.to_string()),
            ],
        );
    }

    let writer = JournalWriter::open(data_dir)?;
    Ok((writer, contents.entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn deleted(name: &str) -> JournalEntry {
        JournalEntry::StreamDeleted {
            name: name.to_string(),
            incarnation: Uuid::nil(),
        }
    }

    #[test]
    fn test_open_empty_dir() {
        let temp_dir = TempDir::new().unwrap();
        let (writer, entries) = open_journal(temp_dir.path()).unwrap();
        assert!(entries.is_empty());
        assert!(writer.is_empty());
    }

    #[test]
    fn test_open_truncates_torn_tail() {
        let temp_dir = TempDir::new().unwrap();
        let intact = {
            let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
            writer.append(&deleted("a")).unwrap();
            let intact = writer.len();
            writer.append(&deleted("b")).unwrap();
            intact
        };

        let path = journal_path(temp_dir.path());
        let full = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(full - 2)
            .unwrap();

        let (mut writer, entries) = open_journal(temp_dir.path()).unwrap();
        assert_eq!(entries, vec![deleted("a")]);
        assert_eq!(writer.len(), intact);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        // New appends land directly after the intact prefix
        writer.append(&deleted("c")).unwrap();
        let (_, entries) = open_journal(temp_dir.path()).unwrap();
        assert_eq!(entries, vec![deleted("a"), deleted("c")]);
    }
}
