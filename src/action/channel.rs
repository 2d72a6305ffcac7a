//! Channel membership actions

use crate::error::{Result, SwitchboardError};
use crate::protocol::Payload;

use super::{require, Action, ActionContext, CHANNEL_CONNECT_ACTION, CHANNEL_DISCONNECT_ACTION};

/// Moves the sender into `channel`
///
/// With a server auth token configured, `auth` must carry a token issued
/// for that channel. The token is consumed whether or not it matches.
pub struct ChannelConnectAction;

impl Action for ChannelConnectAction {
    fn name(&self) -> &str {
        CHANNEL_CONNECT_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(
            CHANNEL_CONNECT_ACTION,
            "channel",
            payload.channel.as_deref().map_or(false, |c| !c.is_empty()),
        )
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let channel = payload
            .channel
            .as_deref()
            .ok_or_else(|| SwitchboardError::validation(CHANNEL_CONNECT_ACTION, "channel"))?;

        if ctx.config().server_auth_token.is_some() {
            let token = payload
                .auth
                .as_deref()
                .ok_or_else(|| SwitchboardError::validation(CHANNEL_CONNECT_ACTION, "auth"))?;

            let tokens = &ctx.persistence().tokens;
            let issued_for = tokens.by_token(token);
            tokens.consume(token);

            if issued_for.as_deref() != Some(channel) {
                return Err(SwitchboardError::Unauthorized(format!(
                    "invalid auth token for channel '{}'",
                    channel
                )));
            }
        }

        let previous = ctx.persistence().channels.get_channel(ctx.fd());
        ctx.persistence().channels.connect(ctx.fd(), channel)?;
        tracing::debug!("fd {} joined channel '{}'", ctx.fd(), channel);

        if ctx.config().use_presence {
            if let Some(previous) = previous.filter(|p| p != channel) {
                ctx.notify_presence(&previous)?;
            }
            ctx.notify_presence(channel)?;
        }
        Ok(())
    }
}

/// Removes the sender from its channel, if any
pub struct ChannelDisconnectAction;

impl Action for ChannelDisconnectAction {
    fn name(&self) -> &str {
        CHANNEL_DISCONNECT_ACTION
    }

    fn execute(&self, ctx: &ActionContext, _payload: &Payload) -> Result<()> {
        let previous = ctx.persistence().channels.get_channel(ctx.fd());
        ctx.persistence().channels.disconnect(ctx.fd());

        if let Some(channel) = previous {
            tracing::debug!("fd {} left channel '{}'", ctx.fd(), channel);
            if ctx.config().use_presence {
                ctx.notify_presence(&channel)?;
            }
        }
        Ok(())
    }
}
