//! # Switchboard
//!
//! Real-time message routing behind a multi-worker WebSocket server:
//! - Named actions with per-action middleware pipelines
//! - Direct reply, channel broadcast and fanout delivery
//! - At-least-once redelivery with client acknowledgments
//! - Channel presence and single-use channel auth tokens
//! - Shared, concurrency-safe persistence, optionally journaled
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WebSocket Server                           │
//! │              (frames + connection ids)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Worker Pool → Switchboard                       │
//! │        (one Router workflow per inbound frame)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Pipeline   │          │  Broadcast  │──▶ Ack timers
//!   │  + Action   │─────────▶│   Engine    │
//!   └──────┬──────┘          └──────┬──────┘
//!          │                        │
//!          ▼                        ▼
//!   ┌─────────────────────────────────────┐
//!   │  Persistence facets (KeyedStore)    │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod persistence;
pub mod protocol;
pub mod transport;
pub mod broadcast;
pub mod ack;
pub mod action;
pub mod router;
pub mod reload;
pub mod network;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, SwitchboardError};
pub use config::{Config, ProtocolVariant};
pub use engine::Switchboard;
pub use router::Router;
pub use transport::{Fd, MemoryTransport, Transport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Switchboard
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
