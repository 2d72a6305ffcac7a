//! Action Module
//!
//! Named handlers that run once per inbound message.
//!
//! ## Lifecycle
//! ```text
//! registry ──resolve name──▶ Arc<dyn Action>
//!                               │ bind {fd, transport, persistence}
//!                               ▼
//!                          BoundAction::invoke(payload)
//!                               │ validate → ack echo → execute
//!                               ▼
//!                          ActionContext::send(...) ──▶ Broadcaster
//! ```
//!
//! Handlers are shared across messages and hold no per-message state; the
//! per-message bindings live in [`ActionContext`].

mod builtin;
mod channel;
mod context;
mod pipeline;
mod registry;

pub use builtin::{
    AcknowledgeAction, AddListenerAction, AssocUserToFdAction, BaseAction, BroadcastAction,
    FanoutAction, RemoveListenerAction,
};
pub use channel::{ChannelConnectAction, ChannelDisconnectAction};
pub use context::{ActionContext, Binding, BoundAction};
pub use pipeline::{Middleware, MiddlewareContext, Pipeline};
pub use registry::ActionRegistry;

use crate::error::Result;
use crate::protocol::Payload;

// =============================================================================
// Built-in action names
// =============================================================================

/// Plain reply to the sender; also the fallback for unparseable frames
pub const BASE_ACTION: &str = "base-action";
pub const BROADCAST_ACTION: &str = "broadcast-action";
pub const FANOUT_ACTION: &str = "fanout-action";
pub const CHANNEL_CONNECT_ACTION: &str = "channel-connect";
pub const CHANNEL_DISCONNECT_ACTION: &str = "channel-disconnect";
pub const ASSOC_USER_ACTION: &str = "assoc-user-to-fd-action";
pub const ACKNOWLEDGE_ACTION: &str = "acknowledge-action";
pub const ADD_LISTENER_ACTION: &str = "add-listener";
pub const REMOVE_LISTENER_ACTION: &str = "remove-listener";

/// Outbound-only: membership snapshot pushed to channel members
pub const PRESENCE_ACTION: &str = "channel-presence";

/// A named message handler
pub trait Action: Send + Sync {
    /// Name clients use in the `action` field
    fn name(&self) -> &str;

    /// Check the payload shape. Missing fields are client-input faults.
    fn validate(&self, _payload: &Payload) -> Result<()> {
        Ok(())
    }

    /// Business logic
    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()>;
}

/// Fail with a validation fault unless `present`
pub(crate) fn require(action: &str, field: &str, present: bool) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(crate::error::SwitchboardError::validation(action, field))
    }
}
