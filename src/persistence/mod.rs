//! Persistence Module
//!
//! Domain stores shared by every worker: channel membership, listener
//! subscriptions, user associations, acknowledgment counters and auth
//! tokens. Each facet is a trait so the router and actions only ever see a
//! reference, and each has a table-backed implementation over
//! [`KeyedStore`](crate::store::KeyedStore), in memory or journaled.
//!
//! Reads never fail. Writes only fail when a table is full.

mod ack;
mod channel;
mod listener;
mod token;
mod user;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub use ack::AckTable;
pub use channel::ChannelTable;
pub use listener::ListenerTable;
pub use token::TokenTable;
pub use user::UserTable;

use crate::config::{Config, JournalSyncStrategy};
use crate::error::Result;
use crate::store::{KeyedStore, Schema};
use crate::transport::Fd;

/// `fd → channel` membership
pub trait ChannelPersistence: Send + Sync {
    /// Reset; `fresh` drops every record
    fn refresh(&self, fresh: bool);

    /// Put `fd` in `channel`, replacing any previous membership
    fn connect(&self, fd: Fd, channel: &str) -> Result<()>;

    /// Remove `fd` from its channel. No-op without a record.
    fn disconnect(&self, fd: Fd);

    fn get_all_connections(&self) -> HashMap<Fd, String>;

    fn get_channel(&self, fd: Fd) -> Option<String>;
}

/// `fd → action names` subscriptions (legacy protocol)
pub trait ListenerPersistence: Send + Sync {
    fn refresh(&self, fresh: bool);

    /// Subscribe `fd` to `action`
    fn listen(&self, fd: Fd, action: &str) -> Result<()>;

    fn get_listener(&self, fd: Fd) -> Option<BTreeSet<String>>;

    fn get_all_listeners(&self) -> HashMap<Fd, BTreeSet<String>>;

    /// Unsubscribe `fd` from `action`; returns whether it was subscribed
    fn stop_listener(&self, fd: Fd, action: &str) -> bool;

    /// Drop every subscription of `fd`; returns whether it had any
    fn stop_listeners_for_fd(&self, fd: Fd) -> bool;
}

/// `fd → user id`, at most one fd per user
pub trait UserPersistence: Send + Sync {
    fn refresh(&self, fresh: bool);

    /// Associate `user_id` with `fd`, dropping the user's previous fd
    fn assoc(&self, fd: Fd, user_id: i64) -> Result<()>;

    /// Remove the association of `user_id`
    fn disassoc(&self, user_id: i64);

    /// Remove whatever user is associated with `fd`
    fn disassoc_fd(&self, fd: Fd);

    fn get_assoc(&self, fd: Fd) -> Option<i64>;

    fn get_all_assocs(&self) -> HashMap<Fd, i64>;
}

/// `message hash → remaining attempts`
pub trait AckPersistence: Send + Sync {
    fn refresh(&self, fresh: bool);

    /// Start tracking `hash` with `count` attempts
    fn register(&self, hash: &str, count: u32) -> Result<()>;

    /// Decrement; the record is deleted instead of dropping below one
    fn subtract(&self, hash: &str);

    /// Decrement if tracked, in one step.
    ///
    /// Returns whether an attempt was taken; `false` once acknowledged or
    /// exhausted.
    fn take_attempt(&self, hash: &str) -> bool;

    fn has(&self, hash: &str) -> bool;

    /// Remaining attempts, if tracked
    fn remaining(&self, hash: &str) -> Option<u32>;

    /// Client confirmed receipt; unconditional delete
    fn acknowledge(&self, hash: &str);
}

/// Single-use `token → channel`
pub trait TokenPersistence: Send + Sync {
    fn refresh(&self, fresh: bool);

    fn store_token(&self, token: &str, channel: &str) -> Result<()>;

    /// Look up the channel a token was issued for
    fn by_token(&self, token: &str) -> Option<String>;

    /// Delete a token
    fn consume(&self, token: &str);
}

/// Every facet the router binds for a message
#[derive(Clone)]
pub struct PersistenceSet {
    pub channels: Arc<dyn ChannelPersistence>,
    pub listeners: Arc<dyn ListenerPersistence>,
    pub users: Arc<dyn UserPersistence>,
    pub acks: Arc<dyn AckPersistence>,
    pub tokens: Arc<dyn TokenPersistence>,
}

impl PersistenceSet {
    /// In-memory tables with `capacity` rows each
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            channels: Arc::new(ChannelTable::new(capacity)),
            listeners: Arc::new(ListenerTable::new(capacity)),
            users: Arc::new(UserTable::new(capacity)),
            acks: Arc::new(AckTable::new(capacity)),
            tokens: Arc::new(TokenTable::new(capacity)),
        }
    }

    /// Journaled tables under `dir`, one journal file per table
    pub fn journaled(dir: &Path, capacity: usize, sync: JournalSyncStrategy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            channels: Arc::new(ChannelTable::open(dir, capacity, sync)?),
            listeners: Arc::new(ListenerTable::open(dir, capacity, sync)?),
            users: Arc::new(UserTable::open(dir, capacity, sync)?),
            acks: Arc::new(AckTable::open(dir, capacity, sync)?),
            tokens: Arc::new(TokenTable::open(dir, capacity, sync)?),
        })
    }

    /// Pick the variant the config asks for
    pub fn from_config(config: &Config) -> Result<Self> {
        match &config.journal_dir {
            Some(dir) => Self::journaled(dir, config.store_capacity, config.journal_sync_strategy),
            None => Ok(Self::in_memory(config.store_capacity)),
        }
    }

    /// Refresh every facet
    pub fn refresh(&self, fresh: bool) -> &Self {
        self.channels.refresh(fresh);
        self.listeners.refresh(fresh);
        self.users.refresh(fresh);
        self.acks.refresh(fresh);
        self.tokens.refresh(fresh);
        self
    }
}

/// Build the backing table for a facet
fn open_table(
    name: &str,
    schema: Schema,
    capacity: usize,
    dir: Option<(&Path, JournalSyncStrategy)>,
) -> Result<KeyedStore> {
    match dir {
        Some((dir, sync)) => {
            let path = dir.join(format!("{}.journal", name));
            KeyedStore::open_journaled(name, schema, capacity, &path, sync)
        }
        None => Ok(KeyedStore::new(name, schema, capacity)),
    }
}

/// Parse a table key back into an fd
fn parse_fd(key: &str) -> Option<Fd> {
    key.parse().ok()
}
