//! Transport Module
//!
//! The boundary to the WebSocket server. The router never touches sockets
//! directly; it asks the transport whether a connection is still
//! established and hands it encoded frames to push.

mod memory;

pub use memory::MemoryTransport;

use crate::error::Result;

/// Connection id: unique while the connection is open, may be reused after close
pub type Fd = u64;

/// Handle to the server that owns the live connections
pub trait Transport: Send + Sync {
    /// Push an encoded frame to one connection
    fn push(&self, fd: Fd, frame: &str) -> Result<()>;

    /// Whether the connection is open and past the handshake
    fn is_established(&self, fd: Fd) -> bool;

    /// Every connection the server currently knows about
    fn connections(&self) -> Vec<Fd>;
}
