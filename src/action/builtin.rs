//! Built-in actions

use crate::error::{Result, SwitchboardError};
use crate::protocol::Payload;

use super::{
    require, Action, ActionContext, ACKNOWLEDGE_ACTION, ADD_LISTENER_ACTION, ASSOC_USER_ACTION,
    BASE_ACTION, BROADCAST_ACTION, FANOUT_ACTION, REMOVE_LISTENER_ACTION,
};

/// Echoes `data` back to the sender
pub struct BaseAction;

impl Action for BaseAction {
    fn name(&self) -> &str {
        BASE_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(BASE_ACTION, "data", payload.data.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        ctx.reply(payload.data_or_null())?;
        Ok(())
    }
}

/// Sends `data` to the sender's channel
pub struct BroadcastAction;

impl Action for BroadcastAction {
    fn name(&self) -> &str {
        BROADCAST_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(BROADCAST_ACTION, "data", payload.data.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let delivered = ctx.send(payload.data_or_null(), None, true)?;
        tracing::debug!("broadcast from fd {} reached {} connections", ctx.fd(), delivered);
        Ok(())
    }
}

/// Sends `data` to every connection
pub struct FanoutAction;

impl Action for FanoutAction {
    fn name(&self) -> &str {
        FANOUT_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(FANOUT_ACTION, "data", payload.data.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let delivered = ctx.send(payload.data_or_null(), None, false)?;
        tracing::debug!("fanout from fd {} reached {} connections", ctx.fd(), delivered);
        Ok(())
    }
}

/// Associates `userId` with the sender
pub struct AssocUserToFdAction;

impl Action for AssocUserToFdAction {
    fn name(&self) -> &str {
        ASSOC_USER_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(ASSOC_USER_ACTION, "userId", payload.user_id.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let user_id = payload
            .user_id
            .ok_or_else(|| SwitchboardError::validation(ASSOC_USER_ACTION, "userId"))?;
        ctx.persistence().users.assoc(ctx.fd(), user_id)
    }
}

/// Confirms receipt of the message id in `data`
pub struct AcknowledgeAction;

impl Action for AcknowledgeAction {
    fn name(&self) -> &str {
        ACKNOWLEDGE_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(ACKNOWLEDGE_ACTION, "data", payload.data_str().is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let id = payload
            .data_str()
            .ok_or_else(|| SwitchboardError::validation(ACKNOWLEDGE_ACTION, "data"))?;
        ctx.persistence().acks.acknowledge(id);
        tracing::trace!("fd {} acknowledged {}", ctx.fd(), id);
        Ok(())
    }
}

/// Subscribes the sender to the action named in `listen`
pub struct AddListenerAction;

impl Action for AddListenerAction {
    fn name(&self) -> &str {
        ADD_LISTENER_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(ADD_LISTENER_ACTION, "listen", payload.listen.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        let listen = payload
            .listen
            .as_deref()
            .ok_or_else(|| SwitchboardError::validation(ADD_LISTENER_ACTION, "listen"))?;
        ctx.persistence().listeners.listen(ctx.fd(), listen)
    }
}

/// Unsubscribes the sender from the action named in `listen`
pub struct RemoveListenerAction;

impl Action for RemoveListenerAction {
    fn name(&self) -> &str {
        REMOVE_LISTENER_ACTION
    }

    fn validate(&self, payload: &Payload) -> Result<()> {
        require(REMOVE_LISTENER_ACTION, "listen", payload.listen.is_some())
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        if let Some(listen) = payload.listen.as_deref() {
            ctx.persistence().listeners.stop_listener(ctx.fd(), listen);
        }
        Ok(())
    }
}
