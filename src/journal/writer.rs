//! Journal writer
//!
//! - Every append is written and `sync_data`'d before it returns
//! - A failed append cuts the file back to its previous length, so a
//!   mutation is either fully journaled or not journaled at all
//! - If the cut-back fails too the writer is poisoned: every later append
//!   fails until the journal is reopened and replay drops the torn tail
//! - One writer per journal file; the registry serializes access

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::entry::JournalEntry;
use super::errors::{JournalError, JournalResult};

pub const JOURNAL_DIR: &str = "journal";
pub const JOURNAL_FILE: &str = "shardlog.journal";

/// `<data_dir>/journal/shardlog.journal`
pub fn journal_path(data_dir: &Path) -> PathBuf {
    data_dir.join(JOURNAL_DIR).join(JOURNAL_FILE)
}

#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    file: File,
    /// Length of the durable prefix
    len: u64,
    entries_written: u64,
    /// Set when bytes past `len` could not be removed
    poisoned: bool,
}

impl JournalWriter {
    /// Open or create the journal under `data_dir`, positioned at its end.
    ///
    /// Replay must have run first: whatever is on disk is taken as valid.
    pub fn open(data_dir: &Path) -> JournalResult<Self> {
        let path = journal_path(data_dir);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                JournalError::open_failed(
                    format!("Failed to create journal directory: {}", dir.display()),
                    e,
                )
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                JournalError::open_failed(format!("Failed to open journal: {}", path.display()), e)
            })?;
        let len = file
            .metadata()
            .map_err(|e| JournalError::open_failed("Failed to read journal metadata", e))?
            .len();

        Ok(Self {
            path,
            file,
            len,
            entries_written: 0,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entries appended through this writer since it was opened
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Append one entry durably. Returns the frame size in bytes.
    pub fn append(&mut self, entry: &JournalEntry) -> JournalResult<u64> {
        if self.poisoned {
            return Err(JournalError::poisoned(self.len));
        }
        let frame = entry.encode_frame()?;

        let written = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            self.rollback()?;
            return Err(JournalError::append_failed(
                format!("Failed to journal {} for stream {}", entry.kind(), entry.stream_name()),
                e,
            ));
        }

        self.len += frame.len() as u64;
        self.entries_written += 1;
        Ok(frame.len() as u64)
    }

    /// Drop any partially written frame
    fn rollback(&mut self) -> JournalResult<()> {
        let cut = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.sync_data());
        if let Err(e) = cut {
            // Later frames would land behind the leftover bytes
            self.poisoned = true;
            return Err(JournalError::rollback_failed(self.len, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::JournalErrorCode;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn deleted(name: &str) -> JournalEntry {
        JournalEntry::StreamDeleted {
            name: name.to_string(),
            incarnation: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_open_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let writer = JournalWriter::open(temp_dir.path()).unwrap();
        assert!(writer.path().exists());
        assert!(writer.is_empty());
        assert_eq!(writer.path(), journal_path(temp_dir.path()));
    }

    #[test]
    fn test_append_grows_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(temp_dir.path()).unwrap();

        let first = writer.append(&deleted("a")).unwrap();
        let second = writer.append(&deleted("b")).unwrap();

        assert_eq!(writer.len(), first + second);
        assert_eq!(writer.entries_written(), 2);
        assert_eq!(fs::metadata(writer.path()).unwrap().len(), writer.len());
    }

    #[test]
    fn test_failed_rollback_poisons_writer() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
        writer.append(&deleted("a")).unwrap();
        let durable_len = writer.len();

        // A read-only handle fails both the write and the cut-back
        writer.file = File::open(writer.path()).unwrap();
        let err = writer.append(&deleted("b")).unwrap_err();
        assert_eq!(err.code(), JournalErrorCode::Poisoned);
        assert!(writer.is_poisoned());

        // Even with a usable handle again, nothing more is accepted
        writer.file = OpenOptions::new().append(true).open(writer.path()).unwrap();
        let err = writer.append(&deleted("c")).unwrap_err();
        assert_eq!(err.code(), JournalErrorCode::Poisoned);
        assert_eq!(writer.len(), durable_len);
        assert_eq!(writer.entries_written(), 1);
        assert_eq!(fs::metadata(writer.path()).unwrap().len(), durable_len);

        // Reopening starts clean
        let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
        assert!(!writer.is_poisoned());
        writer.append(&deleted("d")).unwrap();
    }

    #[test]
    fn test_rollback_after_failed_write_keeps_writer_usable() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
        writer.append(&deleted("a")).unwrap();
        let durable_len = writer.len();

        // Stray bytes past the durable prefix, as a partial write leaves
        OpenOptions::new()
            .append(true)
            .open(writer.path())
            .unwrap()
            .write_all(&[0xAB; 7])
            .unwrap();
        writer.rollback().unwrap();
        assert!(!writer.is_poisoned());
        assert_eq!(fs::metadata(writer.path()).unwrap().len(), durable_len);

        writer.append(&deleted("b")).unwrap();
        assert_eq!(fs::metadata(writer.path()).unwrap().len(), writer.len());
    }

    #[test]
    fn test_reopen_positions_at_end() {
        let temp_dir = TempDir::new().unwrap();
        let len = {
            let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
            writer.append(&deleted("a")).unwrap();
            writer.len()
        };

        let mut writer = JournalWriter::open(temp_dir.path()).unwrap();
        assert_eq!(writer.len(), len);
        writer.append(&deleted("b")).unwrap();
        assert!(writer.len() > len);
    }
}
