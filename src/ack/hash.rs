//! Message ids and tokens

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Distinguishes hashes taken within the same clock tick
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Hex sha256 over the given parts
pub fn digest(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Nanoseconds since the epoch, salted with a process-wide sequence
fn salt() -> Vec<u8> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut out = nanos.to_be_bytes().to_vec();
    out.extend_from_slice(&seq.to_be_bytes());
    out
}

/// Acknowledgment id for an outbound message: content plus timestamp
pub fn message_hash(content: &str) -> String {
    digest(&[content.as_bytes(), &salt()])
}

/// Fresh single-use auth token for a channel
pub fn generate_token(channel: &str) -> String {
    digest(&[b"token", channel.as_bytes(), &salt()])
}
