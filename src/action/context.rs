//! Per-message action bindings and the send primitives

use std::sync::Arc;

use serde_json::{json, Value};

use crate::ack::AckProtocol;
use crate::broadcast::{Broadcaster, NoHooks, SendHooks};
use crate::config::Config;
use crate::error::Result;
use crate::persistence::PersistenceSet;
use crate::protocol::{OutboundMessage, Payload};
use crate::transport::{Fd, Transport};

use super::{Action, ACKNOWLEDGE_ACTION, PRESENCE_ACTION};

/// What the router binds to an action for one message
#[derive(Clone)]
pub struct Binding {
    pub fd: Fd,
    pub transport: Arc<dyn Transport>,
    pub persistence: PersistenceSet,
    pub config: Arc<Config>,
    /// Present when acknowledgment is enabled
    pub ack: Option<AckProtocol>,
}

/// An action's view of the message it is handling
#[derive(Clone)]
pub struct ActionContext {
    action: String,
    binding: Binding,
    broadcaster: Broadcaster,
}

impl ActionContext {
    pub fn new(action: impl Into<String>, binding: Binding) -> Self {
        let hooks: Arc<dyn SendHooks> = match &binding.ack {
            Some(ack) => Arc::new(ack.clone()),
            None => Arc::new(NoHooks),
        };
        let broadcaster = Broadcaster::new(
            Arc::clone(&binding.transport),
            Arc::clone(&binding.persistence.channels),
            hooks,
        );
        Self {
            action: action.into(),
            binding,
            broadcaster,
        }
    }

    // =========================================================================
    // Send primitives
    // =========================================================================

    /// Send `data` under this action's name.
    ///
    /// - `fd`: direct push to that connection
    /// - `to_channel`: the sender's channel, or every channel-less
    ///   connection when the sender is in none
    /// - neither: fanout to every connection
    ///
    /// Returns how many connections received it.
    pub fn send(&self, data: Value, fd: Option<Fd>, to_channel: bool) -> Result<usize> {
        let message = self.message(&self.action, data);
        let include_self = self.binding.config.include_self_in_broadcast;

        if let Some(target) = fd {
            return Ok(usize::from(self.broadcaster.push(target, &message)?));
        }

        if to_channel {
            return Ok(match self.persistence().channels.get_channel(self.fd()) {
                Some(channel) => self.broadcaster.broadcast_to_channel(
                    &message,
                    &channel,
                    Some(self.fd()),
                    include_self,
                ),
                None => self.broadcaster.broadcast_without_channel(
                    &message,
                    Some(self.fd()),
                    include_self,
                ),
            });
        }

        let listeners = self
            .binding
            .config
            .filters_by_listener()
            .then(|| self.persistence().listeners.as_ref());
        Ok(self
            .broadcaster
            .fanout(&message, Some(self.fd()), include_self, listeners))
    }

    /// Direct reply to the sender
    pub fn reply(&self, data: Value) -> Result<usize> {
        self.send(data, Some(self.fd()), false)
    }

    /// Push under another action name to one connection
    pub fn push_as(&self, action: &str, data: Value, fd: Fd) -> Result<bool> {
        let message = self.message(action, data);
        self.broadcaster.push(fd, &message)
    }

    fn message(&self, action: &str, data: Value) -> OutboundMessage {
        let sender = self.binding.config.sends_sender_fd().then_some(self.fd());
        OutboundMessage::new(action, data).with_sender(sender)
    }

    /// Tell every member of `channel` who is in it
    pub fn notify_presence(&self, channel: &str) -> Result<usize> {
        let mut fds: Vec<Fd> = self
            .persistence()
            .channels
            .get_all_connections()
            .into_iter()
            .filter(|(_, c)| c == channel)
            .map(|(fd, _)| fd)
            .filter(|fd| self.transport().is_established(*fd))
            .collect();
        fds.sort_unstable();

        let users = self.persistence().users.get_all_assocs();
        let mut user_ids: Vec<i64> = fds.iter().filter_map(|fd| users.get(fd).copied()).collect();
        user_ids.sort_unstable();

        let data = json!({ "channel": channel, "fds": fds, "userIds": user_ids });
        let message = self.message(PRESENCE_ACTION, data);

        let mut delivered = 0;
        for fd in fds {
            if self.broadcaster.push(fd, &message)? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Name of the action being executed
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sender connection
    pub fn fd(&self) -> Fd {
        self.binding.fd
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.binding.transport
    }

    pub fn persistence(&self) -> &PersistenceSet {
        &self.binding.persistence
    }

    pub fn config(&self) -> &Config {
        &self.binding.config
    }

    pub fn ack(&self) -> Option<&AckProtocol> {
        self.binding.ack.as_ref()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }
}

/// A resolved handler together with its per-message bindings
#[derive(Clone)]
pub struct BoundAction {
    action: Arc<dyn Action>,
    ctx: ActionContext,
}

impl BoundAction {
    pub fn new(action: Arc<dyn Action>, binding: Binding) -> Self {
        let ctx = ActionContext::new(action.name().to_string(), binding);
        Self { action, ctx }
    }

    /// Validate, echo an acknowledgment if asked, then execute
    pub fn invoke(&self, payload: &Payload) -> Result<()> {
        self.action.validate(payload)?;

        if self.ctx.config().use_acknowledgment {
            if let Some(id) = &payload.id {
                self.ctx
                    .push_as(ACKNOWLEDGE_ACTION, Value::String(id.clone()), self.ctx.fd())?;
            }
        }

        self.action.execute(&self.ctx, payload)
    }

    pub fn name(&self) -> &str {
        self.action.name()
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }
}
