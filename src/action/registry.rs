//! Action registry
//!
//! Owns the name → handler and name → middleware maps, and resolves each
//! inbound payload to a bound action.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SwitchboardError};
use crate::protocol::Payload;

use super::{
    AcknowledgeAction, Action, AddListenerAction, AssocUserToFdAction, BaseAction, Binding,
    BoundAction, BroadcastAction, ChannelConnectAction, ChannelDisconnectAction, FanoutAction,
    Middleware, Pipeline, RemoveListenerAction,
};

/// Registered actions and their middleware
///
/// Registering a name twice is rejected on every path; use
/// [`replace`](Self::replace) to swap a handler deliberately.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    middlewares: HashMap<String, Vec<Arc<dyn Middleware>>>,
    current: Option<BoundAction>,
}

impl ActionRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn Action>> = vec![
            Arc::new(BaseAction),
            Arc::new(BroadcastAction),
            Arc::new(FanoutAction),
            Arc::new(ChannelConnectAction),
            Arc::new(ChannelDisconnectAction),
            Arc::new(AssocUserToFdAction),
            Arc::new(AcknowledgeAction),
            Arc::new(AddListenerAction),
            Arc::new(RemoveListenerAction),
        ];
        for action in builtins {
            registry
                .actions
                .insert(action.name().to_string(), action);
        }
        registry
    }

    /// Register under the action's declared name
    pub fn add(&mut self, action: Arc<dyn Action>) -> Result<()> {
        let name = action.name().to_string();
        if self.actions.contains_key(&name) {
            return Err(SwitchboardError::DuplicateAction(name));
        }
        self.actions.insert(name, action);
        Ok(())
    }

    /// Register an action together with its middleware, in order
    pub fn add_with_middlewares(
        &mut self,
        action: Arc<dyn Action>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<()> {
        let name = action.name().to_string();
        self.add(action)?;
        for middleware in middlewares {
            self.middleware(&name, middleware);
        }
        Ok(())
    }

    /// Register, overwriting any handler with the same name.
    ///
    /// Returns the handler that was replaced.
    pub fn replace(&mut self, action: Arc<dyn Action>) -> Option<Arc<dyn Action>> {
        self.actions.insert(action.name().to_string(), action)
    }

    /// Append a middleware step to an action's chain
    pub fn middleware(&mut self, action: &str, middleware: Arc<dyn Middleware>) {
        self.middlewares
            .entry(action.to_string())
            .or_default()
            .push(middleware);
    }

    /// Composed pipeline for `action`; identity when nothing is registered
    pub fn get_pipeline(&self, action: &str) -> Pipeline {
        Pipeline::new(self.middlewares.get(action).cloned().unwrap_or_default())
    }

    /// Resolve the payload's action and bind it for this message
    pub fn ingest_data(&mut self, payload: &Payload, binding: Binding) -> Result<&BoundAction> {
        let name = payload.action_name().ok_or_else(|| {
            SwitchboardError::InvalidPayload("missing 'action' field".to_string())
        })?;

        let action = self
            .actions
            .get(name)
            .cloned()
            .ok_or_else(|| SwitchboardError::UnknownAction(name.to_string()))?;

        Ok(self.current.insert(BoundAction::new(action, binding)))
    }

    /// Action resolved by the last [`ingest_data`](Self::ingest_data)
    pub fn get_current_action(&self) -> Option<&BoundAction> {
        self.current.as_ref()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Remove an action and its middleware
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Action>> {
        self.middlewares.remove(name);
        self.actions.remove(name)
    }

    /// Registered action names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }
}
