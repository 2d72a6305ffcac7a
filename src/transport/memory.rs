//! In-process transport
//!
//! Keeps the connection set in memory and records every pushed frame.
//! Backs the CLI driver and the test suites.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use crate::error::{Result, SwitchboardError};
use crate::protocol::{decode_message, OutboundMessage};

use super::{Fd, Transport};

/// Transport with an in-memory connection table
#[derive(Default)]
pub struct MemoryTransport {
    /// Established connections
    open: RwLock<BTreeSet<Fd>>,

    /// Frames pushed, per connection, in push order
    sent: RwLock<BTreeMap<Fd, Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection as established
    pub fn open(&self, fd: Fd) {
        self.open.write().insert(fd);
    }

    /// Mark a connection as gone
    pub fn close(&self, fd: Fd) {
        self.open.write().remove(&fd);
    }

    /// Raw frames pushed to `fd`
    pub fn sent_to(&self, fd: Fd) -> Vec<String> {
        self.sent.read().get(&fd).cloned().unwrap_or_default()
    }

    /// Decoded frames pushed to `fd`; undecodable frames are skipped
    pub fn messages_to(&self, fd: Fd) -> Vec<OutboundMessage> {
        self.sent_to(fd)
            .iter()
            .filter_map(|raw| decode_message(raw).ok())
            .collect()
    }

    /// Drain every recorded frame as `(fd, frame)` pairs
    pub fn take_sent(&self) -> Vec<(Fd, String)> {
        let mut sent = self.sent.write();
        let drained = std::mem::take(&mut *sent);
        drained
            .into_iter()
            .flat_map(|(fd, frames)| frames.into_iter().map(move |f| (fd, f)))
            .collect()
    }

    /// Total frames pushed so far
    pub fn sent_count(&self) -> usize {
        self.sent.read().values().map(Vec::len).sum()
    }

    pub fn clear_sent(&self) {
        self.sent.write().clear();
    }
}

impl Transport for MemoryTransport {
    fn push(&self, fd: Fd, frame: &str) -> Result<()> {
        if !self.is_established(fd) {
            return Err(SwitchboardError::Transport(format!(
                "connection {} is not established",
                fd
            )));
        }
        self.sent
            .write()
            .entry(fd)
            .or_default()
            .push(frame.to_string());
        Ok(())
    }

    fn is_established(&self, fd: Fd) -> bool {
        self.open.read().contains(&fd)
    }

    fn connections(&self) -> Vec<Fd> {
        self.open.read().iter().copied().collect()
    }
}
