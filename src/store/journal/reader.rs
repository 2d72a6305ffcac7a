//! Journal Reader
//!
//! Handles reading entries from a journal file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, SwitchboardError};

use super::entry::{parse_header, HEADER_SIZE};
use super::JournalEntry;

/// What the reader found at the current position
#[derive(Debug)]
pub(crate) enum Frame {
    Entry(JournalEntry),
    /// Complete frame whose checksum or body did not verify
    Corrupt { lsn: u64, reason: String },
    /// File ends in the middle of a frame
    Partial,
    End,
}

/// Reads entries from a journal file
pub struct JournalReader {
    reader: BufReader<File>,

    /// Byte offset just past the last complete frame
    position: u64,
}

impl JournalReader {
    /// Open a journal file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry, failing on corruption or a torn tail
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::Corrupt { reason, .. } => Err(SwitchboardError::JournalCorruption(reason)),
            Frame::Partial => Err(SwitchboardError::JournalCorruption(
                "partial entry at end of journal".to_string(),
            )),
            Frame::End => Ok(None),
        }
    }

    /// Iterate over all entries
    pub fn entries(self) -> JournalIterator {
        JournalIterator {
            reader: self,
            done: false,
        }
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_fully(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(Frame::End);
        }
        if read < HEADER_SIZE {
            return Ok(Frame::Partial);
        }

        let header = match parse_header(&header) {
            Ok(h) => h,
            // An absurd length means we cannot find the next frame boundary
            Err(_) => return Ok(Frame::Partial),
        };

        let mut data = vec![0u8; header.len];
        if read_fully(&mut self.reader, &mut data)? < header.len {
            return Ok(Frame::Partial);
        }
        self.position += (HEADER_SIZE + header.len) as u64;

        match JournalEntry::from_data(&header, &data) {
            Ok(entry) => Ok(Frame::Entry(entry)),
            Err(e) => Ok(Frame::Corrupt {
                lsn: header.lsn,
                reason: e.to_string(),
            }),
        }
    }
}

/// Like `read_exact`, but reports how much was read before EOF
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over journal entries
pub struct JournalIterator {
    reader: JournalReader,
    done: bool,
}

impl Iterator for JournalIterator {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
