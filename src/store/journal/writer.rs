//! Journal Writer
//!
//! Handles appending entries to a table journal.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::JournalSyncStrategy;
use crate::error::Result;

use super::{JournalEntry, JournalRecovery, Operation};

/// Appends entries to a journal file
pub struct JournalWriter {
    /// Buffered handle, opened in append mode
    file: BufWriter<File>,

    /// Path, for logging
    path: PathBuf,

    /// LSN assigned to the next append
    next_lsn: u64,

    sync_strategy: JournalSyncStrategy,

    /// Entries written since the last fsync
    unsynced: usize,
}

impl JournalWriter {
    /// Open or create a journal, continuing after its last valid LSN.
    ///
    /// A torn tail is cut off first so new entries land on a frame boundary.
    pub fn open(path: &Path, sync_strategy: JournalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            JournalRecovery::recover(path)?.1.last_lsn + 1
        } else {
            1
        };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            next_lsn,
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Create an empty journal, discarding any existing contents
    pub fn create(path: &Path, sync_strategy: JournalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        drop(file);
        Self::open(path, sync_strategy)
    }

    /// Append an operation, returning its LSN
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = JournalEntry::new(lsn, operation).serialize()?;
        self.file.write_all(&bytes)?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            JournalSyncStrategy::EveryWrite => true,
            JournalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        } else {
            self.file.flush()?;
        }
        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all entries. LSNs keep increasing.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().set_len(0)?;
        self.file.get_ref().sync_all()?;
        self.unsynced = 0;
        tracing::debug!("Truncated journal {}", self.path.display());
        Ok(())
    }

    /// LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }
}
