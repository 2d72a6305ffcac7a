//! Inbound payloads
//!
//! What a client sends, after JSON decoding.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A decoded client frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Name of the action to run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Action-specific body; an explicit `null` counts as present
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Target channel for channel-connect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// User id for user association
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// Client message id; asks for an acknowledgment echo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Single-use channel auth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,

    /// Action name to subscribe to (legacy listener protocol)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,

    /// Anything else the client sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `Some` for any value that appears in the frame, `null` included
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Payload {
    /// Payload naming `action` with the given data
    pub fn new(action: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            action: Some(action.into()),
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = Some(listen.into());
        self
    }

    /// The action name, if the frame carried one
    pub fn action_name(&self) -> Option<&str> {
        self.action.as_deref().filter(|a| !a.is_empty())
    }

    /// `data` as a string, if it is one
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }

    /// `data`, or JSON null
    pub fn data_or_null(&self) -> Value {
        self.data.clone().unwrap_or(Value::Null)
    }
}
