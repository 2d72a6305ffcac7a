//! Error types for Switchboard
//!
//! Provides a unified error type for all operations, grouped so callers can
//! tell a malformed client frame apart from a misused router or a missing
//! action registration.

use thiserror::Error;

/// Result type alias using SwitchboardError
pub type Result<T> = std::result::Result<T, SwitchboardError>;

/// Unified error type for Switchboard operations
#[derive(Debug, Error)]
pub enum SwitchboardError {
    // -------------------------------------------------------------------------
    // Client-Input Errors
    // -------------------------------------------------------------------------
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Missing required field '{field}' for action '{action}'")]
    Validation { action: String, field: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Rejected(String),

    // -------------------------------------------------------------------------
    // Registry Errors
    // -------------------------------------------------------------------------
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action already registered: {0}")]
    DuplicateAction(String),

    // -------------------------------------------------------------------------
    // Sequencing Errors
    // -------------------------------------------------------------------------
    #[error("Illegal transition '{transition}' from state '{state}' (expected '{expected}' first)")]
    IllegalTransition {
        transition: &'static str,
        state: &'static str,
        expected: &'static str,
    },

    #[error("Transition '{transition}' requires {context}")]
    MissingContext {
        transition: &'static str,
        context: &'static str,
    },

    #[error("No action resolved for the current message")]
    NoActionResolved,

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Table '{table}' is full (capacity {capacity})")]
    StoreFull { table: String, capacity: usize },

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Journal corruption detected: {0}")]
    JournalCorruption(String),

    #[error("Journal write failed: {0}")]
    JournalWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport error: {0}")]
    Transport(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`SwitchboardError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or incomplete client frame; reported back to the sender
    ClientInput,

    /// Frame named an action nobody registered
    UnknownAction,

    /// Router or registry misused by integration code
    Sequencing,

    /// Backing store or journal failure
    Persistence,

    /// Push to a connection failed
    Transport,

    /// Invalid configuration
    Config,
}

impl SwitchboardError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPayload(_)
            | Self::Validation { .. }
            | Self::Unauthorized(_)
            | Self::Rejected(_) => ErrorKind::ClientInput,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
            Self::DuplicateAction(_)
            | Self::IllegalTransition { .. }
            | Self::MissingContext { .. }
            | Self::NoActionResolved => ErrorKind::Sequencing,
            Self::StoreFull { .. }
            | Self::UnknownColumn { .. }
            | Self::JournalCorruption(_)
            | Self::JournalWrite(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Persistence,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the originating connection should be told about this error
    pub fn is_client_visible(&self) -> bool {
        matches!(self.kind(), ErrorKind::ClientInput | ErrorKind::UnknownAction)
    }

    pub(crate) fn validation(action: &str, field: &str) -> Self {
        Self::Validation {
            action: action.to_string(),
            field: field.to_string(),
        }
    }
}

impl From<bincode::Error> for SwitchboardError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for SwitchboardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
