//! Listener subscription table
//!
//! Subscriptions are stored as a JSON array in a single string column.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::config::JournalSyncStrategy;
use crate::error::Result;
use crate::store::{record, Column, KeyedStore, Record, Schema, Updated, Value};
use crate::transport::Fd;

use super::{open_table, parse_fd, ListenerPersistence};

const TABLE: &str = "listeners";
const LISTENING: &str = "listening";

/// `fd → set of action names`
pub struct ListenerTable {
    store: KeyedStore,
}

fn decode(row: &Record) -> BTreeSet<String> {
    row.get(LISTENING)
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

fn encode(actions: &BTreeSet<String>) -> String {
    serde_json::to_string(actions).unwrap_or_else(|_| "[]".to_string())
}

impl ListenerTable {
    fn schema() -> Schema {
        Schema::new(vec![Column::text(LISTENING)])
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

impl ListenerPersistence for ListenerTable {
    fn refresh(&self, fresh: bool) {
        if fresh {
            self.store.recreate();
        }
    }

    fn listen(&self, fd: Fd, action: &str) -> Result<()> {
        let key = fd.to_string();
        let updated = self.store.update(&key, |row| {
            let mut actions = decode(row);
            actions.insert(action.to_string());
            row.insert(LISTENING.to_string(), Value::Str(encode(&actions)));
            true
        });
        if updated == Updated::Missing {
            let actions = BTreeSet::from([action.to_string()]);
            self.store.set(&key, record([(LISTENING, encode(&actions))]))?;
        }
        Ok(())
    }

    fn get_listener(&self, fd: Fd) -> Option<BTreeSet<String>> {
        self.store.get(&fd.to_string()).map(|row| decode(&row))
    }

    fn get_all_listeners(&self) -> HashMap<Fd, BTreeSet<String>> {
        self.store
            .iter()
            .into_iter()
            .filter_map(|(key, row)| Some((parse_fd(&key)?, decode(&row))))
            .collect()
    }

    fn stop_listener(&self, fd: Fd, action: &str) -> bool {
        let mut removed = false;
        self.store.update(&fd.to_string(), |row| {
            let mut actions = decode(row);
            removed = actions.remove(action);
            row.insert(LISTENING.to_string(), Value::Str(encode(&actions)));
            !actions.is_empty()
        });
        removed
    }

    fn stop_listeners_for_fd(&self, fd: Fd) -> bool {
        self.store.delete(&fd.to_string())
    }
}
