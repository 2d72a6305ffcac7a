//! Configuration for Switchboard
//!
//! Centralized configuration with sensible defaults. Values are normally
//! supplied by the bootstrap layer that owns the WebSocket server.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SwitchboardError};

/// Main configuration for a Switchboard instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Which wire protocol generation to speak
    pub protocol: ProtocolVariant,

    /// Whether broadcasts also reach the sending connection
    pub include_self_in_broadcast: bool,

    // -------------------------------------------------------------------------
    // Acknowledgment Configuration
    // -------------------------------------------------------------------------
    /// Attach ids to outbound messages and redeliver until acknowledged
    pub use_acknowledgment: bool,

    /// Number of redelivery attempts per message
    pub acknowledgment_attempts: u32,

    /// Base redelivery delay; attempt `n` fires after `n * timeout`
    pub acknowledgment_timeout: Duration,

    // -------------------------------------------------------------------------
    // Channel Configuration
    // -------------------------------------------------------------------------
    /// Notify channel members when membership changes
    pub use_presence: bool,

    /// When set, channel-connect requires a single-use auth token
    pub server_auth_token: Option<String>,

    // -------------------------------------------------------------------------
    // Persistence Configuration
    // -------------------------------------------------------------------------
    /// Max rows per persistence table
    pub store_capacity: usize,

    /// Directory for table journals (durable variant); `None` keeps
    /// everything in memory
    pub journal_dir: Option<PathBuf>,

    /// How often to fsync table journals
    pub journal_sync_strategy: JournalSyncStrategy,

    // -------------------------------------------------------------------------
    // Runtime Configuration
    // -------------------------------------------------------------------------
    /// Emit per-message timing
    pub track_profile: bool,

    /// Worker threads consuming inbound frames
    pub workers: usize,

    /// Sleep between polls while waiting on the reload lock
    pub reload_poll_interval: Duration,
}

/// Wire protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Listener subscriptions filter fanout; outbound frames omit the sender fd
    Legacy,

    /// Outbound frames carry the sender fd; acknowledgment and presence aware
    Acknowledged,
}

/// Journal sync strategy
#[derive(Debug, Clone, Copy)]
pub enum JournalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: ProtocolVariant::Acknowledged,
            include_self_in_broadcast: false,
            use_acknowledgment: false,
            acknowledgment_attempts: 3,
            acknowledgment_timeout: Duration::from_secs(5),
            use_presence: false,
            server_auth_token: None,
            store_capacity: 1024,
            journal_dir: None,
            journal_sync_strategy: JournalSyncStrategy::EveryNEntries { count: 100 },
            track_profile: false,
            workers: 4,
            reload_poll_interval: Duration::from_millis(10),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check for combinations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.use_acknowledgment && self.acknowledgment_attempts == 0 {
            return Err(SwitchboardError::Config(
                "acknowledgment enabled with zero attempts".to_string(),
            ));
        }
        if self.use_acknowledgment
            && self
                .acknowledgment_timeout
                .checked_mul(self.acknowledgment_attempts)
                .is_none()
        {
            return Err(SwitchboardError::Config(format!(
                "acknowledgment timeout {:?} x {} attempts overflows",
                self.acknowledgment_timeout, self.acknowledgment_attempts
            )));
        }
        if self.workers == 0 {
            return Err(SwitchboardError::Config("workers must be at least 1".to_string()));
        }
        if self.store_capacity == 0 {
            return Err(SwitchboardError::Config(
                "store capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Outbound frames include the sender fd
    pub fn sends_sender_fd(&self) -> bool {
        self.protocol == ProtocolVariant::Acknowledged
    }

    /// Fanout is filtered by listener subscriptions
    pub fn filters_by_listener(&self) -> bool {
        self.protocol == ProtocolVariant::Legacy
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the protocol variant
    pub fn protocol(mut self, protocol: ProtocolVariant) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Deliver broadcasts back to the sender as well
    pub fn include_self_in_broadcast(mut self, include: bool) -> Self {
        self.config.include_self_in_broadcast = include;
        self
    }

    /// Enable or disable acknowledged redelivery
    pub fn use_acknowledgment(mut self, enabled: bool) -> Self {
        self.config.use_acknowledgment = enabled;
        self
    }

    /// Set the number of redelivery attempts
    pub fn acknowledgment_attempts(mut self, attempts: u32) -> Self {
        self.config.acknowledgment_attempts = attempts;
        self
    }

    /// Set the base redelivery delay
    pub fn acknowledgment_timeout(mut self, timeout: Duration) -> Self {
        self.config.acknowledgment_timeout = timeout;
        self
    }

    /// Set the base redelivery delay in (fractional) seconds.
    ///
    /// Negative and NaN values clamp to zero; values too large for a
    /// `Duration` are rejected.
    pub fn acknowledgment_timeout_secs(mut self, secs: f64) -> Result<Self> {
        self.config.acknowledgment_timeout = Duration::try_from_secs_f64(secs.max(0.0))
            .map_err(|e| SwitchboardError::Config(format!("acknowledgment timeout {}: {}", secs, e)))?;
        Ok(self)
    }

    /// Enable or disable presence notifications
    pub fn use_presence(mut self, enabled: bool) -> Self {
        self.config.use_presence = enabled;
        self
    }

    /// Require auth tokens on channel-connect
    pub fn server_auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.server_auth_token = Some(token.into());
        self
    }

    /// Set the max rows per persistence table
    pub fn store_capacity(mut self, capacity: usize) -> Self {
        self.config.store_capacity = capacity;
        self
    }

    /// Journal persistence tables under this directory
    pub fn journal_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.journal_dir = Some(path.into());
        self
    }

    /// Set the journal sync strategy
    pub fn journal_sync_strategy(mut self, strategy: JournalSyncStrategy) -> Self {
        self.config.journal_sync_strategy = strategy;
        self
    }

    /// Enable or disable per-message timing
    pub fn track_profile(mut self, enabled: bool) -> Self {
        self.config.track_profile = enabled;
        self
    }

    /// Set the number of worker threads
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the reload lock polling interval
    pub fn reload_poll_interval(mut self, interval: Duration) -> Self {
        self.config.reload_poll_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
