//! Outbound messages
//!
//! What the server pushes to a connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::transport::Fd;

/// A frame pushed to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Action that produced the message
    pub action: String,

    /// Message body
    pub data: Value,

    /// Sending connection (acknowledged protocol only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fd: Option<Fd>,

    /// Acknowledgment id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Set on error pushes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl OutboundMessage {
    pub fn new(action: impl Into<String>, data: Value) -> Self {
        Self {
            action: action.into(),
            data,
            fd: None,
            id: None,
            error: false,
        }
    }

    pub fn with_sender(mut self, fd: Option<Fd>) -> Self {
        self.fd = fd;
        self
    }

    /// Error-shaped push carrying the fault text
    pub fn error(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: Value::String(message.into()),
            fd: None,
            id: None,
            error: true,
        }
    }

    /// Encode to a JSON string
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Content hashed for the acknowledgment id: the message without its id
    pub fn content(&self) -> Result<String> {
        let mut bare = self.clone();
        bare.id = None;
        bare.encode()
    }
}
