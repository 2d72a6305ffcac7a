//! Send hooks
//!
//! Extension points around the single push path. A pre-send hook may edit
//! the message before encoding; a post-send hook sees what was delivered.

use crate::protocol::OutboundMessage;
use crate::transport::Fd;

/// Callbacks around every push
pub trait SendHooks: Send + Sync {
    /// Runs before encoding; may edit the message
    fn before_send(&self, _fd: Fd, _message: &mut OutboundMessage) {}

    /// Runs after the transport accepted the frame
    fn after_send(&self, _fd: Fd, _message: &OutboundMessage, _frame: &str) {}
}

/// No-op hooks
pub struct NoHooks;

impl SendHooks for NoHooks {}
