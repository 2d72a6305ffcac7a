//! Channel membership table

use std::collections::HashMap;
use std::path::Path;

use crate::config::JournalSyncStrategy;
use crate::error::Result;
use crate::store::{record, Column, KeyedStore, Schema, Value};
use crate::transport::Fd;

use super::{open_table, parse_fd, ChannelPersistence};

const TABLE: &str = "channels";
const CHANNEL: &str = "channel";

/// `fd → channel`, one row per fd
pub struct ChannelTable {
    store: KeyedStore,
}

impl ChannelTable {
    fn schema() -> Schema {
        Schema::new(vec![Column::text(CHANNEL)])
    }

    pub fn new(capacity: usize) -> Self {
        Self {
            store: KeyedStore::new(TABLE, Self::schema(), capacity),
        }
    }

    /// Journaled table under `dir`
    pub fn open(dir: &Path, capacity: usize, sync: JournalSyncStrategy) -> Result<Self> {
        Ok(Self {
            store: open_table(TABLE, Self::schema(), capacity, Some((dir, sync)))?,
        })
    }
}

impl ChannelPersistence for ChannelTable {
    fn refresh(&self, fresh: bool) {
        if fresh {
            self.store.recreate();
        }
    }

    fn connect(&self, fd: Fd, channel: &str) -> Result<()> {
        self.store.set(&fd.to_string(), record([(CHANNEL, channel)]))
    }

    fn disconnect(&self, fd: Fd) {
        self.store.delete(&fd.to_string());
    }

    fn get_all_connections(&self) -> HashMap<Fd, String> {
        self.store
            .iter()
            .into_iter()
            .filter_map(|(key, row)| {
                let fd = parse_fd(&key)?;
                let channel = row.get(CHANNEL).and_then(Value::as_str)?.to_string();
                Some((fd, channel))
            })
            .collect()
    }

    fn get_channel(&self, fd: Fd) -> Option<String> {
        self.store
            .get_field(&fd.to_string(), CHANNEL)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|c| !c.is_empty())
    }
}
