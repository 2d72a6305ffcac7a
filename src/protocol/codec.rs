//! Frame codec
//!
//! Turns raw inbound frames into payloads. Frames that are not JSON
//! objects are never rejected: they degrade to a plain-text base action
//! carrying the raw text. Only frames over [`MAX_FRAME_SIZE`] are refused.

use serde_json::Value;

use crate::action::BASE_ACTION;
use crate::error::{Result, SwitchboardError};

use super::{OutboundMessage, Payload};

/// Maximum inbound frame size (1 MB)
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Decode a raw frame into a payload
pub fn decode_frame(raw: &[u8]) -> Result<Payload> {
    if raw.len() > MAX_FRAME_SIZE {
        return Err(SwitchboardError::InvalidPayload(format!(
            "frame too large: {} bytes (max {})",
            raw.len(),
            MAX_FRAME_SIZE
        )));
    }

    let text = String::from_utf8_lossy(raw);
    match serde_json::from_str::<Value>(&text) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value)
            .map_err(|e| SwitchboardError::InvalidPayload(e.to_string())),
        _ => Ok(Payload::new(BASE_ACTION, text.into_owned())),
    }
}

/// Encode an outbound message
pub fn encode_message(message: &OutboundMessage) -> Result<String> {
    message.encode()
}

/// Decode an outbound message (client side / tests)
pub fn decode_message(raw: &str) -> Result<OutboundMessage> {
    Ok(serde_json::from_str(raw)?)
}
