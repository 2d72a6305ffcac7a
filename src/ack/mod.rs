//! Acknowledgment Module
//!
//! At-least-once delivery for outbound messages.
//!
//! ## Cycle
//! 1. Pre-send: the message gets `id = sha256(content, timestamp)`
//! 2. Post-send: `id → attempts` is registered and one timer is scheduled
//!    per attempt at `timeout × 1, timeout × 2, …` (linear backoff)
//! 3. Each timer: if `id` is still tracked, decrement it and re-push the
//!    original frame to the recipient if it is still established
//! 4. An `acknowledge-action` from the client deletes the record, turning
//!    every remaining timer into a no-op
//!
//! Registration happens on the caller's thread; timers fire on the
//! scheduler's.

pub mod hash;
mod scheduler;

pub use hash::{generate_token, message_hash};
pub use scheduler::{Job, ManualScheduler, Scheduler, ThreadScheduler};

use std::sync::Arc;
use std::time::Duration;

use crate::action::ACKNOWLEDGE_ACTION;
use crate::broadcast::SendHooks;
use crate::error::{Result, SwitchboardError};
use crate::persistence::AckPersistence;
use crate::protocol::OutboundMessage;
use crate::transport::{Fd, Transport};

/// Redelivery state machine for one server
#[derive(Clone)]
pub struct AckProtocol {
    acks: Arc<dyn AckPersistence>,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    attempts: u32,
    timeout: Duration,
}

impl AckProtocol {
    pub fn new(
        acks: Arc<dyn AckPersistence>,
        transport: Arc<dyn Transport>,
        scheduler: Arc<dyn Scheduler>,
        attempts: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            acks,
            transport,
            scheduler,
            attempts,
            timeout,
        }
    }

    /// Register `id` and schedule its redeliveries of `frame` to `fd`
    pub fn track(&self, fd: Fd, id: &str, frame: &str) -> Result<()> {
        let delays = (1..=self.attempts)
            .map(|attempt| self.timeout.checked_mul(attempt))
            .collect::<Option<Vec<Duration>>>()
            .ok_or_else(|| {
                SwitchboardError::Config(format!(
                    "redelivery delay {:?} x {} overflows",
                    self.timeout, self.attempts
                ))
            })?;

        self.acks.register(id, self.attempts)?;

        for delay in delays {
            let acks = Arc::clone(&self.acks);
            let transport = Arc::clone(&self.transport);
            let id = id.to_string();
            let frame = frame.to_string();

            self.scheduler.schedule(
                delay,
                Box::new(move || redeliver(acks.as_ref(), transport.as_ref(), fd, &id, &frame)),
            );
        }

        tracing::trace!(
            "Tracking {} for fd {} ({} attempts, {:?} base)",
            id,
            fd,
            self.attempts,
            self.timeout
        );
        Ok(())
    }

    /// Client confirmed receipt of `id`
    pub fn acknowledge(&self, id: &str) {
        self.acks.acknowledge(id);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One timer firing
fn redeliver(acks: &dyn AckPersistence, transport: &dyn Transport, fd: Fd, id: &str, frame: &str) {
    if !acks.take_attempt(id) {
        return;
    }

    if transport.is_established(fd) {
        match transport.push(fd, frame) {
            Ok(()) => tracing::debug!("Redelivered {} to fd {}", id, fd),
            Err(e) => tracing::debug!("Redelivery of {} to fd {} failed: {}", id, fd, e),
        }
    }
}

impl SendHooks for AckProtocol {
    fn before_send(&self, _fd: Fd, message: &mut OutboundMessage) {
        if message.id.is_some() {
            return;
        }
        match message.content() {
            Ok(content) => message.id = Some(message_hash(&content)),
            Err(e) => tracing::warn!("Could not hash outbound message: {}", e),
        }
    }

    fn after_send(&self, fd: Fd, message: &OutboundMessage, frame: &str) {
        // Acknowledgments are never themselves acknowledged
        if message.action == ACKNOWLEDGE_ACTION {
            return;
        }
        if let Some(id) = &message.id {
            if let Err(e) = self.track(fd, id, frame) {
                tracing::warn!("Could not track {} for redelivery: {}", id, e);
            }
        }
    }
}
