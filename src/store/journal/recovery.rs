//! Journal Recovery
//!
//! Rebuilds table contents after a restart by replaying the journal.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::{Frame, JournalReader};
use super::JournalEntry;

/// Replays journals after a restart
pub struct JournalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether a torn tail was cut off
    pub was_truncated: bool,
}

impl JournalRecovery {
    /// Recover entries from a journal file
    ///
    /// Valid entries are returned in order, entries failing their checksum are
    /// skipped, and a partially written tail is truncated away.
    pub fn recover(path: &Path) -> Result<(Vec<JournalEntry>, RecoveryResult)> {
        let (entries, mut result, valid_len) = Self::scan(path)?;

        let file_len = std::fs::metadata(path)?.len();
        if valid_len < file_len {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            result.was_truncated = true;
            tracing::warn!(
                "Truncated {} torn bytes from journal {}",
                file_len - valid_len,
                path.display()
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a journal file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, mut result, valid_len) = Self::scan(path)?;
        result.was_truncated = valid_len < std::fs::metadata(path)?.len();
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<JournalEntry>, RecoveryResult, u64)> {
        let mut reader = JournalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = result.last_lsn.max(entry.lsn);
                    entries.push(entry);
                }
                Frame::Corrupt { lsn, reason } => {
                    tracing::warn!("Skipping corrupt journal entry: {}", reason);
                    result.entries_corrupted += 1;
                    result.last_lsn = result.last_lsn.max(lsn);
                }
                Frame::Partial | Frame::End => break,
            }
        }

        Ok((entries, result, reader.position()))
    }
}
