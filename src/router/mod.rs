//! Router Module
//!
//! One [`Router`] workflow per inbound message. The workflow is a small
//! state machine (see [`state`]) that refuses to resolve or run an action
//! until the transport, connection id and persistence have been bound.
//!
//! ## Per-message flow
//! ```text
//! set_server → set_fd → set_persistence → (add_actions | add_middleware)*
//!     → prepare_action   (decode frame, liveness sweep, resolve action)
//!     → prepare_pipeline (compose middleware)
//!     → process_message  (run middleware, invoke action)
//!     → finalize         (liveness sweep)
//! ```

pub mod state;

pub use state::{Place, Transition};

use std::sync::Arc;
use std::time::Instant;

use crate::ack::{AckProtocol, Scheduler};
use crate::action::{Action, ActionRegistry, Binding, BoundAction, Middleware, MiddlewareContext, Pipeline};
use crate::config::Config;
use crate::error::{Result, SwitchboardError};
use crate::persistence::PersistenceSet;
use crate::protocol::{decode_frame, Payload};
use crate::transport::{Fd, Transport};

/// Intercepts faults before they reach the router's caller
///
/// May log or translate an error. Client-visible faults must stay
/// client-visible.
pub trait FaultHandler: Send + Sync {
    fn handle(&self, fd: Option<Fd>, error: SwitchboardError) -> SwitchboardError;
}

/// Workflow for a single inbound message
pub struct Router {
    place: Place,
    config: Arc<Config>,
    registry: ActionRegistry,

    // Bound context
    transport: Option<Arc<dyn Transport>>,
    fd: Option<Fd>,
    persistence: Option<PersistenceSet>,
    scheduler: Option<Arc<dyn Scheduler>>,
    fault_handler: Option<Arc<dyn FaultHandler>>,

    // Per-message state
    payload: Option<Payload>,
    pipeline: Option<Pipeline>,
}

impl Router {
    /// Workflow with the built-in actions registered
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_registry(config, ActionRegistry::with_builtins())
    }

    /// Workflow starting from an existing registry
    pub fn with_registry(config: Arc<Config>, registry: ActionRegistry) -> Self {
        Self {
            place: Place::Started,
            config,
            registry,
            transport: None,
            fd: None,
            persistence: None,
            scheduler: None,
            fault_handler: None,
            payload: None,
            pipeline: None,
        }
    }

    /// Scheduler for acknowledgment timers; required when acknowledgment is on
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_fault_handler(mut self, handler: Arc<dyn FaultHandler>) -> Self {
        self.fault_handler = Some(handler);
        self
    }

    // =========================================================================
    // State machine plumbing
    // =========================================================================

    /// Where `transition` would lead, or why it cannot fire
    fn check(&self, transition: Transition) -> Result<Place> {
        state::next(self.place, transition).ok_or(SwitchboardError::IllegalTransition {
            transition: transition.as_str(),
            state: self.place.as_str(),
            expected: transition.predecessor(),
        })
    }

    fn commit(&mut self, transition: Transition, to: Place) {
        tracing::trace!(
            "workflow {} --{}--> {}",
            self.place.as_str(),
            transition.as_str(),
            to.as_str()
        );
        self.place = to;
    }

    fn require<'a, T>(
        value: &'a Option<T>,
        transition: Transition,
        context: &'static str,
    ) -> Result<&'a T> {
        value.as_ref().ok_or(SwitchboardError::MissingContext {
            transition: transition.as_str(),
            context,
        })
    }

    // =========================================================================
    // Setup transitions
    // =========================================================================

    /// Bind the server transport
    pub fn set_server(&mut self, transport: Arc<dyn Transport>) -> Result<&mut Self> {
        let to = self.check(Transition::SetServer)?;
        self.transport = Some(transport);
        self.commit(Transition::SetServer, to);
        Ok(self)
    }

    /// Bind the sending connection
    pub fn set_fd(&mut self, fd: Fd) -> Result<&mut Self> {
        let to = self.check(Transition::SetFd)?;
        Self::require(&self.transport, Transition::SetFd, "a bound server transport")?;
        self.fd = Some(fd);
        self.commit(Transition::SetFd, to);
        Ok(self)
    }

    /// Bind the persistence facets
    pub fn set_persistence(&mut self, persistence: PersistenceSet) -> Result<&mut Self> {
        let to = self.check(Transition::SetPersistence)?;
        self.persistence = Some(persistence);
        self.commit(Transition::SetPersistence, to);
        Ok(self)
    }

    /// Register an action for this message
    pub fn add_action(&mut self, action: Arc<dyn Action>) -> Result<&mut Self> {
        let to = self.check(Transition::AddActions)?;
        self.registry.add(action)?;
        self.commit(Transition::AddActions, to);
        Ok(self)
    }

    /// Append a middleware step to `action`'s chain
    pub fn add_middleware(
        &mut self,
        action: &str,
        middleware: Arc<dyn Middleware>,
    ) -> Result<&mut Self> {
        let to = self.check(Transition::AddMiddleware)?;
        self.registry.middleware(action, middleware);
        self.commit(Transition::AddMiddleware, to);
        Ok(self)
    }

    // =========================================================================
    // Message transitions
    // =========================================================================

    /// Decode a raw frame and resolve its action.
    ///
    /// Frames that are not JSON objects degrade to the base action.
    pub fn prepare_action(&mut self, raw: &[u8]) -> Result<&mut Self> {
        self.check(Transition::PrepareAction)?;
        let payload = decode_frame(raw)?;
        self.ingest_payload(payload)
    }

    /// Resolve an already-decoded payload's action
    pub fn ingest_payload(&mut self, payload: Payload) -> Result<&mut Self> {
        let to = self.check(Transition::PrepareAction)?;
        let t = Transition::PrepareAction;
        let transport = Arc::clone(Self::require(&self.transport, t, "a bound server transport")?);
        let fd = *Self::require(&self.fd, t, "a bound connection id")?;
        let persistence = Self::require(&self.persistence, t, "bound persistence")?.clone();

        let ack = if self.config.use_acknowledgment {
            let scheduler = Self::require(&self.scheduler, t, "a scheduler for acknowledgments")?;
            Some(AckProtocol::new(
                Arc::clone(&persistence.acks),
                Arc::clone(&transport),
                Arc::clone(scheduler),
                self.config.acknowledgment_attempts,
                self.config.acknowledgment_timeout,
            ))
        } else {
            None
        };

        self.close_connections();

        let binding = Binding {
            fd,
            transport,
            persistence,
            config: Arc::clone(&self.config),
            ack,
        };
        self.registry.ingest_data(&payload, binding)?;
        self.payload = Some(payload);

        self.commit(Transition::PrepareAction, to);
        Ok(self)
    }

    /// Compose the middleware chain for the resolved action
    pub fn prepare_pipeline(&mut self) -> Result<&mut Self> {
        let to = self.check(Transition::PreparePipeline)?;
        let name = self
            .registry
            .get_current_action()
            .map(|a| a.name().to_string())
            .ok_or(SwitchboardError::NoActionResolved)?;
        self.pipeline = Some(self.registry.get_pipeline(&name));
        self.commit(Transition::PreparePipeline, to);
        Ok(self)
    }

    /// Run the middleware chain, then the action
    pub fn process_message(&mut self) -> Result<&mut Self> {
        let to = self.check(Transition::ProcessMessage)?;
        let t = Transition::ProcessMessage;

        let action = self
            .registry
            .get_current_action()
            .cloned()
            .ok_or(SwitchboardError::NoActionResolved)?;
        let payload = Self::require(&self.payload, t, "an ingested payload")?.clone();
        let pipeline = self.pipeline.clone().unwrap_or_default();

        let current_user_id = action.context().persistence().users.get_assoc(action.context().fd());
        let ctx = MiddlewareContext {
            transport: Arc::clone(action.context().transport()),
            fd: action.context().fd(),
            payload,
            current_user_id,
        };

        let ctx = pipeline.process(ctx)?;
        action.invoke(&ctx.payload)?;
        self.payload = Some(ctx.payload);

        self.commit(Transition::ProcessMessage, to);
        Ok(self)
    }

    /// Final liveness sweep
    pub fn finalize(&mut self) -> Result<&mut Self> {
        let to = self.check(Transition::Finalize)?;
        self.close_connections();
        self.commit(Transition::Finalize, to);
        Ok(self)
    }

    /// Run every message transition for `raw`, passing faults through the
    /// fault handler
    pub fn handle(&mut self, raw: &[u8]) -> Result<()> {
        let started = Instant::now();
        let result = self.run(raw);

        if self.config.track_profile {
            tracing::debug!(
                action = self.current_action().map(|a| a.name()).unwrap_or("-"),
                fd = self.fd,
                elapsed_us = started.elapsed().as_micros() as u64,
                ok = result.is_ok(),
                "message profile"
            );
        }

        result.map_err(|e| match &self.fault_handler {
            Some(handler) => handler.handle(self.fd, e),
            None => e,
        })
    }

    fn run(&mut self, raw: &[u8]) -> Result<()> {
        self.prepare_action(raw)?
            .prepare_pipeline()?
            .process_message()?
            .finalize()?;
        Ok(())
    }

    /// Drop channel memberships whose connection is gone.
    ///
    /// Returns how many were removed; no-op before transport and
    /// persistence are bound.
    pub fn close_connections(&self) -> usize {
        let (Some(transport), Some(persistence)) = (&self.transport, &self.persistence) else {
            return 0;
        };

        let mut removed = 0;
        for fd in persistence.channels.get_all_connections().into_keys() {
            if !transport.is_established(fd) {
                persistence.channels.disconnect(fd);
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!("Liveness sweep removed {} stale channel members", removed);
        }
        removed
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn place(&self) -> Place {
        self.place
    }

    /// Payload after middleware, once processed
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn current_action(&self) -> Option<&BoundAction> {
        self.registry.get_current_action()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn fd(&self) -> Option<Fd> {
        self.fd
    }
}
