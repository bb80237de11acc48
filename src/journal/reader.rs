//! Journal reader
//!
//! Reads every frame in order. A frame cut short at the end of the file is a
//! torn write from a crash and is reported, not returned. A complete frame
//! whose checksum or body is wrong is corruption and stops the read.

use std::fs;
use std::io;
use std::path::Path;

use super::entry::{checksum, JournalEntry, FRAME_HEADER_LEN};
use super::errors::{JournalError, JournalResult};

/// Everything a journal file holds
#[derive(Debug, Default)]
pub struct JournalContents {
    pub entries: Vec<JournalEntry>,
    /// Length of the prefix made of complete, valid frames
    pub valid_len: u64,
    /// Bytes after `valid_len` that do not form a complete frame
    pub torn_bytes: u64,
}

impl JournalContents {
    pub fn has_torn_tail(&self) -> bool {
        self.torn_bytes > 0
    }
}

/// Read the journal at `path`. A missing file is an empty journal.
pub fn read_journal(path: &Path) -> JournalResult<JournalContents> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(JournalContents::default()),
        Err(e) => {
            return Err(JournalError::open_failed(
                format!("Failed to read journal: {}", path.display()),
                e,
            ))
        }
    };
    decode_frames(&bytes)
}

pub fn decode_frames(bytes: &[u8]) -> JournalResult<JournalContents> {
    let mut contents = JournalContents::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let remaining = bytes.len() - offset;
        if remaining < FRAME_HEADER_LEN {
            break;
        }

        let header = &bytes[offset..offset + FRAME_HEADER_LEN];
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if remaining - FRAME_HEADER_LEN < len {
            break;
        }

        let body = &bytes[offset + FRAME_HEADER_LEN..offset + FRAME_HEADER_LEN + len];
        let actual = checksum(body);
        if actual != expected {
            return Err(JournalError::corruption_at_offset(
                offset as u64,
                format!("Checksum mismatch: expected {:08x}, got {:08x}", expected, actual),
            ));
        }

        let entry: JournalEntry = serde_json::from_slice(body).map_err(|e| {
            JournalError::corruption_at_offset(offset as u64, format!("Undecodable entry: {}", e))
        })?;

        contents.entries.push(entry);
        offset += FRAME_HEADER_LEN + len;
    }

    contents.valid_len = offset as u64;
    contents.torn_bytes = (bytes.len() - offset) as u64;
    Ok(contents)
}
