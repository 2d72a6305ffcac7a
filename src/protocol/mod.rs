//! Protocol Module
//!
//! Defines the JSON wire protocol between clients and the router.
//!
//! ### Inbound
//! ```text
//! {"action": "...", "data": ..., "channel": "...", "userId": 1, "id": "...", "auth": "..."}
//! ```
//!
//! ### Outbound
//! ```text
//! {"action": "...", "data": ..., "fd": 1, "id": "..."}
//! ```
//! `fd` is present in the acknowledged protocol, `id` when acknowledgment
//! is enabled.

mod codec;
mod message;
mod payload;

pub use codec::{decode_frame, decode_message, encode_message, MAX_FRAME_SIZE};
pub use message::OutboundMessage;
pub use payload::Payload;
