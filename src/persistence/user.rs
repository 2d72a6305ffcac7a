//! User association table

use std::collections::HashMap;
use std::path::Path;

use crate::config::JournalSyncStrategy;
use crate::error::Result;
use crate::store::{record, Column, KeyedStore, Schema, Value};
use crate::transport::Fd;

use super::{open_table, parse_fd, UserPersistence};

const TABLE: &str = "users";
const USER_ID: &str = "user_id";

/// `fd → user id`
pub struct UserTable {
    store: KeyedStore,
}

impl UserTable {
    fn schema() -> Schema {
        Schema::new(vec![Column::int(USER_ID)])
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

impl UserPersistence for UserTable {
    fn refresh(&self, fresh: bool) {
        if fresh {
            self.store.recreate();
        }
    }

    fn assoc(&self, fd: Fd, user_id: i64) -> Result<()> {
        self.disassoc(user_id);
        self.store.set(&fd.to_string(), record([(USER_ID, user_id)]))
    }

    fn disassoc(&self, user_id: i64) {
        for (key, row) in self.store.iter() {
            if row.get(USER_ID).and_then(Value::as_int) == Some(user_id) {
                self.store.delete(&key);
            }
        }
    }

    fn disassoc_fd(&self, fd: Fd) {
        self.store.delete(&fd.to_string());
    }

    fn get_assoc(&self, fd: Fd) -> Option<i64> {
        self.store
            .get_field(&fd.to_string(), USER_ID)
            .and_then(|v| v.as_int())
    }

    fn get_all_assocs(&self) -> HashMap<Fd, i64> {
        self.store
            .iter()
            .into_iter()
            .filter_map(|(key, row)| {
                let user_id = row.get(USER_ID).and_then(Value::as_int)?;
                Some((parse_fd(&key)?, user_id))
            })
            .collect()
    }
}
