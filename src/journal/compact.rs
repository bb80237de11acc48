//! Journal compaction
//!
//! Replaces the journal with a shorter one that replays to the same state:
//!
//! 1. Write every entry to `<journal>.compact` and fsync it
//! 2. Rename it over the journal
//! 3. fsync the journal directory
//!
//! A crash before step 2 leaves the old journal in place; the stale
//! `.compact` file is overwritten by the next attempt.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::entry::JournalEntry;
use super::errors::{JournalError, JournalResult};
use super::writer::{journal_path, JournalWriter};

/// Scratch file compaction writes before renaming it into place
pub fn compaction_path(data_dir: &Path) -> PathBuf {
    let mut path = journal_path(data_dir).into_os_string();
    path.push(".compact");
    PathBuf::from(path)
}

/// Rewrite the journal under `data_dir` as `entries` and open a writer after
/// them. Any writer on the old file must be dropped first.
pub fn compact_journal(data_dir: &Path, entries: &[JournalEntry]) -> JournalResult<JournalWriter> {
    let target = journal_path(data_dir);
    let scratch = compaction_path(data_dir);

    let file = File::create(&scratch).map_err(|e| {
        JournalError::compaction_failed(format!("Failed to create {}", scratch.display()), e)
    })?;
    let mut out = BufWriter::new(file);
    for entry in entries {
        out.write_all(&entry.encode_frame()?).map_err(|e| {
            JournalError::compaction_failed(format!("Failed to write {}", scratch.display()), e)
        })?;
    }
    let file = out.into_inner().map_err(|e| {
        JournalError::compaction_failed(format!("Failed to flush {}", scratch.display()), e.into_error())
    })?;
    file.sync_all().map_err(|e| {
        JournalError::compaction_failed(format!("Failed to fsync {}", scratch.display()), e)
    })?;
    drop(file);

    fs::rename(&scratch, &target).map_err(|e| {
        JournalError::compaction_failed(
            format!("Failed to move {} over {}", scratch.display(), target.display()),
            e,
        )
    })?;

    if let Some(dir) = target.parent() {
        OpenOptions::new()
            .read(true)
            .open(dir)
            .and_then(|d| d.sync_all())
            .map_err(|e| {
                JournalError::compaction_failed(
                    format!("Failed to fsync journal directory: {}", dir.display()),
                    e,
                )
            })?;
    }

    JournalWriter::open(data_dir)
}
