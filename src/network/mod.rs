//! Network Module
//!
//! Worker pool between the WebSocket server and the engine.
//!
//! ## Architecture
//! - The server pushes connection events onto one queue
//! - N worker threads pull events and run them through the engine
//! - A worker finishes one frame before taking the next
//! - Frames from different connections run in parallel, with no ordering
//!   between them

mod server;

pub use server::{Event, Server, ServerStats};
