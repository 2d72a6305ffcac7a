//! Store Module
//!
//! Concurrent keyed tables that back every persistence facet.
//!
//! ## Responsibilities
//! - Fixed-capacity rows with typed columns
//! - Per-key atomic operations without caller-side locking
//! - Snapshot iteration that tolerates concurrent mutation
//! - Optional journaling for durability across restarts
//!
//! ## Layout
//! ```text
//! ┌───────────────────────────────────────────┐
//! │ KeyedStore                                │
//! │  shard 0: RwLock<HashMap<key, Record>>    │
//! │  shard 1: ...                             │
//! │  shard N: ...        len: AtomicUsize     │
//! └─────────────────────┬─────────────────────┘
//!                       │ (durable variant)
//!                       ▼
//!               ┌───────────────┐
//!               │    Journal    │
//!               └───────────────┘
//! ```

pub mod journal;
mod record;
mod table;

pub use record::{record, Column, ColumnType, Record, Schema, Value};
pub use table::{KeyedStore, Updated};
