//! KeyedStore implementation
//!
//! Sharded hash map with a fixed row budget. Each shard has its own
//! RwLock, so single-key operations on different shards never contend and
//! no caller needs to take a lock of its own.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::config::JournalSyncStrategy;
use crate::error::{Result, SwitchboardError};

use super::journal::{JournalRecovery, JournalWriter, Operation};
use super::{Record, Schema, Value};

/// Number of lock shards per table
const SHARD_COUNT: usize = 16;

/// Outcome of [`KeyedStore::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum Updated {
    /// No row under that key
    Missing,

    /// Row updated and kept
    Kept(Record),

    /// Row removed by the update
    Removed,
}

/// Concurrency-safe, fixed-capacity table keyed by string
///
/// ## Concurrency:
/// - `shards`: one RwLock per shard; a key always maps to the same shard
/// - `len`: atomic row count, reserved under the shard's write lock so the
///   capacity bound holds across shards
/// - `journal`: taken after the shard lock, never before
pub struct KeyedStore {
    name: String,
    schema: Schema,
    capacity: usize,
    shards: Vec<RwLock<HashMap<String, Record>>>,
    len: AtomicUsize,
    journal: Option<Mutex<JournalWriter>>,
}

impl KeyedStore {
    /// Create an in-memory table
    pub fn new(name: impl Into<String>, schema: Schema, capacity: usize) -> Self {
        Self {
            name: name.into(),
            schema,
            capacity,
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            len: AtomicUsize::new(0),
            journal: None,
        }
    }

    /// Open a journaled table, replaying whatever the journal holds.
    ///
    /// On open:
    /// 1. Recover valid entries (torn tail is cut off)
    /// 2. Replay them into memory
    /// 3. Rewrite the journal as one `Set` per live row
    pub fn open_journaled(
        name: impl Into<String>,
        schema: Schema,
        capacity: usize,
        path: &Path,
        sync: JournalSyncStrategy,
    ) -> Result<Self> {
        let mut store = Self::new(name, schema, capacity);

        if path.exists() {
            let (entries, result) = JournalRecovery::recover(path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    "[{}] journal recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    store.name,
                    result.entries_recovered,
                    result.entries_corrupted,
                    result.last_lsn
                );
            }
            for entry in entries {
                store.replay(entry.operation);
            }
        }

        let mut writer = JournalWriter::create(path, sync)?;
        for (key, record) in store.iter() {
            writer.append(Operation::Set { key, record })?;
        }
        writer.sync()?;

        store.journal = Some(Mutex::new(writer));
        Ok(store)
    }

    /// Apply a recovered operation, ignoring the capacity bound
    fn replay(&self, operation: Operation) {
        match operation {
            Operation::Set { key, record } => {
                let mut shard = self.shard(&key).write();
                if shard.insert(key, record).is_none() {
                    self.len.fetch_add(1, Ordering::AcqRel);
                }
            }
            Operation::Delete { key } => {
                if self.shard(&key).write().remove(&key).is_some() {
                    self.len.fetch_sub(1, Ordering::AcqRel);
                }
            }
            Operation::Clear => self.clear_rows(),
        }
    }

    fn shard(&self, key: &str) -> &RwLock<HashMap<String, Record>> {
        let idx = crc32fast::hash(key.as_bytes()) as usize % SHARD_COUNT;
        &self.shards[idx]
    }

    /// Best-effort journal append; memory stays authoritative
    fn log(&self, operation: Operation) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.lock().append(operation) {
                tracing::warn!("[{}] journal append failed: {}", self.name, e);
            }
        }
    }

    // =========================================================================
    // Single-key operations
    // =========================================================================

    /// Insert or replace a row
    pub fn set(&self, key: &str, record: Record) -> Result<()> {
        let record = self.schema.normalize(record).map_err(|column| {
            SwitchboardError::UnknownColumn {
                table: self.name.clone(),
                column,
            }
        })?;

        let mut shard = self.shard(key).write();
        if !shard.contains_key(key) {
            self.len
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < self.capacity).then_some(n + 1)
                })
                .map_err(|_| SwitchboardError::StoreFull {
                    table: self.name.clone(),
                    capacity: self.capacity,
                })?;
        }
        shard.insert(key.to_string(), record.clone());
        self.log(Operation::Set {
            key: key.to_string(),
            record,
        });
        Ok(())
    }

    /// Get a full row
    pub fn get(&self, key: &str) -> Option<Record> {
        self.shard(key).read().get(key).cloned()
    }

    /// Get a single column of a row
    pub fn get_field(&self, key: &str, field: &str) -> Option<Value> {
        self.shard(key)
            .read()
            .get(key)
            .and_then(|record| record.get(field).cloned())
    }

    /// Remove a row. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut shard = self.shard(key).write();
        let existed = shard.remove(key).is_some();
        if existed {
            self.len.fetch_sub(1, Ordering::AcqRel);
            self.log(Operation::Delete {
                key: key.to_string(),
            });
        }
        existed
    }

    pub fn exists(&self, key: &str) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Atomically read-modify-write a row.
    ///
    /// The closure returns `false` to remove the row instead of keeping it.
    pub fn update<F>(&self, key: &str, f: F) -> Updated
    where
        F: FnOnce(&mut Record) -> bool,
    {
        let mut shard = self.shard(key).write();
        let keep = match shard.get_mut(key) {
            Some(record) => f(record),
            None => return Updated::Missing,
        };

        if keep {
            let record = shard.get(key).cloned().unwrap_or_default();
            self.log(Operation::Set {
                key: key.to_string(),
                record: record.clone(),
            });
            Updated::Kept(record)
        } else {
            shard.remove(key);
            self.len.fetch_sub(1, Ordering::AcqRel);
            self.log(Operation::Delete {
                key: key.to_string(),
            });
            Updated::Removed
        }
    }

    /// Atomically add `by` to an integer column, returning the new value
    pub fn incr(&self, key: &str, field: &str, by: i64) -> Option<i64> {
        let mut out = None;
        self.update(key, |record| {
            let current = record.get(field).and_then(Value::as_int).unwrap_or(0);
            record.insert(field.to_string(), Value::Int(current + by));
            out = Some(current + by);
            true
        });
        out
    }

    /// Atomically subtract `by` from an integer column, returning the new value
    pub fn decr(&self, key: &str, field: &str, by: i64) -> Option<i64> {
        self.incr(key, field, -by)
    }

    // =========================================================================
    // Whole-table operations
    // =========================================================================

    /// Point-in-time snapshot of every row.
    ///
    /// Shards are read one after another, so rows mutated mid-iteration may
    /// or may not appear.
    pub fn iter(&self) -> Vec<(String, Record)> {
        let mut rows = Vec::with_capacity(self.len());
        for shard in &self.shards {
            rows.extend(shard.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        rows
    }

    /// Drop every row
    pub fn destroy(&self) {
        self.clear_rows();
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.lock().truncate() {
                tracing::warn!("[{}] journal truncate failed: {}", self.name, e);
            }
        }
    }

    /// Destroy and start over with the same schema and capacity
    pub fn recreate(&self) {
        self.destroy();
        tracing::debug!("[{}] table recreated", self.name);
    }

    fn clear_rows(&self) {
        for shard in &self.shards {
            let mut shard = shard.write();
            let removed = shard.len();
            shard.clear();
            self.len.fetch_sub(removed, Ordering::AcqRel);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_journaled(&self) -> bool {
        self.journal.is_some()
    }
}
