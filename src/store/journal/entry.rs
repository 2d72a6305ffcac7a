//! Journal Entry definitions
//!
//! Defines the structure of individual journal entries and their on-disk
//! framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwitchboardError};
use crate::store::Record;

/// Header size: LSN (8) + CRC (4) + data length (4)
pub const HEADER_SIZE: usize = 16;

/// Maximum serialized entry size (1 MB)
pub const MAX_ENTRY_SIZE: usize = 1024 * 1024;

/// A single entry in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The mutation to replay
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Table mutations that can be journaled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert or replace a row
    Set { key: String, record: Record },

    /// Remove a row
    Delete { key: String },

    /// Drop every row
    Clear,
}

impl JournalEntry {
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to `LSN | CRC | LEN | data`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() > MAX_ENTRY_SIZE {
            return Err(SwitchboardError::JournalWrite(format!(
                "entry too large: {} bytes (max {})",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let crc = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_be_bytes());
        bytes.extend_from_slice(&crc.to_be_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Deserialize a complete framed entry, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = parse_header(bytes)?;
        let end = HEADER_SIZE + header.len;
        if bytes.len() < end {
            return Err(SwitchboardError::JournalCorruption(format!(
                "incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }
        Self::from_data(&header, &bytes[HEADER_SIZE..end])
    }

    pub(crate) fn from_data(header: &FrameHeader, data: &[u8]) -> Result<Self> {
        if crc32fast::hash(data) != header.crc {
            return Err(SwitchboardError::JournalCorruption(format!(
                "crc mismatch at lsn {}",
                header.lsn
            )));
        }
        let entry: JournalEntry = bincode::deserialize(data)?;
        if entry.lsn != header.lsn {
            return Err(SwitchboardError::JournalCorruption(format!(
                "lsn mismatch: header {} body {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

/// Decoded frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: usize,
}

pub(crate) fn parse_header(bytes: &[u8]) -> Result<FrameHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(SwitchboardError::JournalCorruption(format!(
            "incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&bytes[0..8]);
    let crc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let len = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    if len > MAX_ENTRY_SIZE {
        return Err(SwitchboardError::JournalCorruption(format!(
            "entry length {} exceeds max {}",
            len, MAX_ENTRY_SIZE
        )));
    }
    Ok(FrameHeader {
        lsn: u64::from_be_bytes(lsn),
        crc,
        len,
    })
}
