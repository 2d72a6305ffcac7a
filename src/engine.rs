//! Engine Module
//!
//! The long-lived coordinator behind the WebSocket server.
//!
//! ## Responsibilities
//! - Own the config, persistence facets, timer scheduler and action
//!   registry shared by every message
//! - Spin up one [`Router`] workflow per inbound frame
//! - Report client-visible faults back to the sending connection
//! - Clean up after closed connections
//! - Issue single-use channel auth tokens

use std::sync::Arc;

use parking_lot::RwLock;

use crate::ack::{generate_token, AckProtocol, Scheduler, ThreadScheduler};
use crate::action::{
    Action, ActionContext, ActionRegistry, Binding, Middleware, BASE_ACTION,
    CHANNEL_DISCONNECT_ACTION,
};
use crate::config::Config;
use crate::error::{Result, SwitchboardError};
use crate::persistence::PersistenceSet;
use crate::protocol::{decode_frame, OutboundMessage};
use crate::reload::ReloadLock;
use crate::router::{FaultHandler, Router};
use crate::transport::{Fd, Transport};

/// Message-routing engine
///
/// ## Concurrency Model
///
/// - Every method takes `&self`; share it across workers behind an `Arc`
/// - Each frame gets its own `Router` built from a snapshot of the registry
/// - Facets serialize per key internally; nothing here holds a lock across
///   a broadcast
/// - The reload lock brackets every frame
pub struct Switchboard {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    persistence: PersistenceSet,
    scheduler: Arc<dyn Scheduler>,

    /// Template cloned into each workflow
    registry: RwLock<ActionRegistry>,

    fault_handler: RwLock<Option<Arc<dyn FaultHandler>>>,
    reload: ReloadLock,
}

impl Switchboard {
    /// Open an engine over `transport`
    ///
    /// On startup:
    /// 1. Validate config
    /// 2. Open persistence (journaled when `journal_dir` is set)
    /// 3. Start the timer thread
    /// 4. Register built-in actions
    pub fn open(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let persistence = PersistenceSet::from_config(&config)?;
        let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadScheduler::start()?);
        Self::with_parts(config, transport, persistence, scheduler)
    }

    /// Assemble an engine from explicit parts
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        persistence: PersistenceSet,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;
        let reload = ReloadLock::new(config.reload_poll_interval);
        tracing::info!(
            "Switchboard ready (protocol={:?}, ack={}, presence={}, journaled={})",
            config.protocol,
            config.use_acknowledgment,
            config.use_presence,
            config.journal_dir.is_some()
        );
        Ok(Self {
            config: Arc::new(config),
            transport,
            persistence,
            scheduler,
            registry: RwLock::new(ActionRegistry::with_builtins()),
            fault_handler: RwLock::new(None),
            reload,
        })
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a user-defined action
    pub fn add_action(&self, action: Arc<dyn Action>) -> Result<()> {
        self.registry.write().add(action)
    }

    /// Register an action with its middleware chain
    pub fn add_action_with_middlewares(
        &self,
        action: Arc<dyn Action>,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> Result<()> {
        self.registry.write().add_with_middlewares(action, middlewares)
    }

    /// Swap out a handler, built-ins included
    pub fn replace_action(&self, action: Arc<dyn Action>) -> Option<Arc<dyn Action>> {
        self.registry.write().replace(action)
    }

    /// Append middleware to an action's chain
    pub fn middleware(&self, action: &str, middleware: Arc<dyn Middleware>) {
        self.registry.write().middleware(action, middleware);
    }

    pub fn set_fault_handler(&self, handler: Arc<dyn FaultHandler>) {
        *self.fault_handler.write() = Some(handler);
    }

    // =========================================================================
    // Message handling
    // =========================================================================

    /// Fully bound workflow for a message from `fd`
    pub fn router(&self, fd: Fd) -> Result<Router> {
        let mut router = Router::with_registry(Arc::clone(&self.config), self.registry.read().clone())
            .with_scheduler(Arc::clone(&self.scheduler));
        if let Some(handler) = self.fault_handler.read().clone() {
            router = router.with_fault_handler(handler);
        }
        router
            .set_server(Arc::clone(&self.transport))?
            .set_fd(fd)?
            .set_persistence(self.persistence.clone())?;
        Ok(router)
    }

    /// Route one raw frame from `fd`
    ///
    /// Client-visible faults are pushed back to `fd` as an error frame and
    /// then returned; everything else is only returned.
    pub fn handle_frame(&self, fd: Fd, raw: &[u8]) -> Result<()> {
        let _guard = self.reload.message_guard();

        let mut router = self.router(fd)?;
        let result = router.handle(raw);

        if let Err(e) = &result {
            if e.is_client_visible() {
                let action = router
                    .current_action()
                    .map(|a| a.name().to_string())
                    .or_else(|| decode_frame(raw).ok().and_then(|p| p.action))
                    .unwrap_or_else(|| BASE_ACTION.to_string());
                self.report_fault(fd, &action, e);
            } else {
                tracing::error!("fd {}: {}", fd, e);
            }
        }
        result
    }

    fn report_fault(&self, fd: Fd, action: &str, error: &SwitchboardError) {
        tracing::debug!("fd {}: client fault in '{}': {}", fd, action, error);
        if !self.transport.is_established(fd) {
            return;
        }
        let pushed = OutboundMessage::error(action, error.to_string())
            .encode()
            .and_then(|frame| self.transport.push(fd, &frame));
        if let Err(e) = pushed {
            tracing::warn!("Could not report fault to fd {}: {}", fd, e);
        }
    }

    /// Forget everything recorded for a closed connection
    ///
    /// Safe to call for an fd with no records.
    pub fn close_connection(&self, fd: Fd) -> Result<()> {
        let channel = self.persistence.channels.get_channel(fd);
        self.persistence.channels.disconnect(fd);
        self.persistence.listeners.stop_listeners_for_fd(fd);
        self.persistence.users.disassoc_fd(fd);

        if let Some(channel) = channel {
            tracing::debug!("fd {} closed; left channel '{}'", fd, channel);
            if self.config.use_presence {
                let ctx = ActionContext::new(
                    CHANNEL_DISCONNECT_ACTION,
                    Binding {
                        fd,
                        transport: Arc::clone(&self.transport),
                        persistence: self.persistence.clone(),
                        config: Arc::clone(&self.config),
                        ack: self.ack_protocol(),
                    },
                );
                ctx.notify_presence(&channel)?;
            }
        }
        Ok(())
    }

    /// Redelivery hooks for pushes made outside a workflow
    fn ack_protocol(&self) -> Option<AckProtocol> {
        self.config.use_acknowledgment.then(|| {
            AckProtocol::new(
                Arc::clone(&self.persistence.acks),
                Arc::clone(&self.transport),
                Arc::clone(&self.scheduler),
                self.config.acknowledgment_attempts,
                self.config.acknowledgment_timeout,
            )
        })
    }

    /// Issue a single-use token admitting one connection to `channel`
    pub fn issue_token(&self, server_token: &str, channel: &str) -> Result<String> {
        match &self.config.server_auth_token {
            Some(expected) if expected == server_token => {}
            Some(_) => {
                return Err(SwitchboardError::Unauthorized(
                    "server auth token mismatch".to_string(),
                ))
            }
            None => {
                return Err(SwitchboardError::Config(
                    "no server auth token configured".to_string(),
                ))
            }
        }

        let token = generate_token(channel);
        self.persistence.tokens.store_token(&token, channel)?;
        Ok(token)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn persistence(&self) -> &PersistenceSet {
        &self.persistence
    }

    pub fn reload_lock(&self) -> &ReloadLock {
        &self.reload
    }

    /// Registered action names
    pub fn actions(&self) -> Vec<String> {
        self.registry.read().names()
    }
}
