//! Auth token table

use std::path::Path;

use crate::config::JournalSyncStrategy;
use crate::error::Result;
use crate::store::{record, Column, KeyedStore, Schema};

use super::{open_table, TokenPersistence};

const TABLE: &str = "tokens";
const CHANNEL: &str = "channel";

/// `token → channel`
pub struct TokenTable {
    store: KeyedStore,
}

impl TokenTable {
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

impl TokenPersistence for TokenTable {
    fn refresh(&self, fresh: bool) {
        if fresh {
            self.store.recreate();
        }
    }

    fn store_token(&self, token: &str, channel: &str) -> Result<()> {
        self.store.set(token, record([(CHANNEL, channel)]))
    }

    fn by_token(&self, token: &str) -> Option<String> {
        self.store
            .get_field(token, CHANNEL)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn consume(&self, token: &str) {
        self.store.delete(token);
    }
}
