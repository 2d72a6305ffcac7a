//! Broadcast Module
//!
//! Decides who receives a payload and funnels every delivery through one
//! push path.
//!
//! ## Delivery policies
//! - **push**: one connection
//! - **channel**: members of a channel
//! - **outside channels**: connections that belong to no channel
//! - **fanout**: every connection, optionally filtered by listener
//!   subscriptions
//!
//! Membership is read from a snapshot, so a connection that dies
//! mid-broadcast is skipped rather than reported.

mod hooks;

pub use hooks::{NoHooks, SendHooks};

use std::sync::Arc;

use crate::error::Result;
use crate::persistence::{ChannelPersistence, ListenerPersistence};
use crate::protocol::OutboundMessage;
use crate::transport::{Fd, Transport};

/// Delivery engine over a transport and the channel facet
#[derive(Clone)]
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    channels: Arc<dyn ChannelPersistence>,
    hooks: Arc<dyn SendHooks>,
}

impl Broadcaster {
    pub fn new(
        transport: Arc<dyn Transport>,
        channels: Arc<dyn ChannelPersistence>,
        hooks: Arc<dyn SendHooks>,
    ) -> Self {
        Self {
            transport,
            channels,
            hooks,
        }
    }

    /// Deliver to one connection.
    ///
    /// Returns `Ok(false)` when the connection is not established.
    pub fn push(&self, fd: Fd, message: &OutboundMessage) -> Result<bool> {
        if !self.transport.is_established(fd) {
            tracing::trace!("Skipping push to dead fd {}", fd);
            return Ok(false);
        }

        let mut message = message.clone();
        self.hooks.before_send(fd, &mut message);
        let frame = message.encode()?;

        self.transport.push(fd, &frame)?;
        tracing::trace!("Pushed '{}' to fd {}", message.action, fd);

        self.hooks.after_send(fd, &message, &frame);
        Ok(true)
    }

    /// Push to each fd, skipping any that died; returns deliveries
    fn deliver<I: IntoIterator<Item = Fd>>(&self, fds: I, message: &OutboundMessage) -> usize {
        let mut delivered = 0;
        for fd in fds {
            match self.push(fd, message) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!("Dropped delivery to fd {}: {}", fd, e),
            }
        }
        delivered
    }

    /// Deliver to every established member of `channel`
    pub fn broadcast_to_channel(
        &self,
        message: &OutboundMessage,
        channel: &str,
        sender: Option<Fd>,
        include_self: bool,
    ) -> usize {
        let mut fds: Vec<Fd> = self
            .channels
            .get_all_connections()
            .into_iter()
            .filter(|(_, c)| c == channel)
            .map(|(fd, _)| fd)
            .filter(|fd| include_self || Some(*fd) != sender)
            .collect();
        fds.sort_unstable();
        self.deliver(fds, message)
    }

    /// Deliver to every established connection that belongs to no channel
    pub fn broadcast_without_channel(
        &self,
        message: &OutboundMessage,
        sender: Option<Fd>,
        include_self: bool,
    ) -> usize {
        let members = self.channels.get_all_connections();
        let fds: Vec<Fd> = self
            .transport
            .connections()
            .into_iter()
            .filter(|fd| !members.contains_key(fd))
            .filter(|fd| include_self || Some(*fd) != sender)
            .collect();
        self.deliver(fds, message)
    }

    /// Deliver to every established connection regardless of channel.
    ///
    /// With `listeners`, a recipient only gets the message if it has no
    /// subscriptions or is subscribed to the message's action.
    pub fn fanout(
        &self,
        message: &OutboundMessage,
        sender: Option<Fd>,
        include_self: bool,
        listeners: Option<&dyn ListenerPersistence>,
    ) -> usize {
        let subscriptions = listeners.map(|l| l.get_all_listeners());
        let fds: Vec<Fd> = self
            .transport
            .connections()
            .into_iter()
            .filter(|fd| include_self || Some(*fd) != sender)
            .filter(|fd| match &subscriptions {
                Some(subs) => subs
                    .get(fd)
                    .map_or(true, |set| set.is_empty() || set.contains(&message.action)),
                None => true,
            })
            .collect();
        self.deliver(fds, message)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn channels(&self) -> &Arc<dyn ChannelPersistence> {
        &self.channels
    }
}
