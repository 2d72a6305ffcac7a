//! Message acknowledgment table

use std::path::Path;

use crate::config::JournalSyncStrategy;
use crate::error::Result;
use crate::store::{record, Column, KeyedStore, Record, Schema, Updated, Value};

use super::{open_table, AckPersistence};

const TABLE: &str = "acknowledgments";
const COUNT: &str = "count";

/// `hash → remaining attempts`
pub struct AckTable {
    store: KeyedStore,
}

impl AckTable {
    fn schema() -> Schema {
        Schema::new(vec![Column::int(COUNT)])
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

/// Keep the row only while attempts remain
fn count_down(row: &mut Record) -> bool {
    let next = row.get(COUNT).and_then(Value::as_int).unwrap_or(0) - 1;
    row.insert(COUNT.to_string(), Value::Int(next));
    next >= 1
}

impl AckPersistence for AckTable {
    fn refresh(&self, fresh: bool) {
        if fresh {
            self.store.recreate();
        }
    }

    fn register(&self, hash: &str, count: u32) -> Result<()> {
        self.store.set(hash, record([(COUNT, i64::from(count))]))
    }

    fn subtract(&self, hash: &str) {
        self.take_attempt(hash);
    }

    fn take_attempt(&self, hash: &str) -> bool {
        !matches!(self.store.update(hash, count_down), Updated::Missing)
    }

    fn has(&self, hash: &str) -> bool {
        self.store.exists(hash)
    }

    fn remaining(&self, hash: &str) -> Option<u32> {
        self.store
            .get_field(hash, COUNT)
            .and_then(|v| v.as_int())
            .map(|n| n.max(0) as u32)
    }

    fn acknowledge(&self, hash: &str) {
        self.store.delete(hash);
    }
}
