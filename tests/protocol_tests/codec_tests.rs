//! Codec Tests
//!
//! Tests for inbound frame decoding and outbound message encoding.

use serde_json::{json, Value};
use switchboard::action::BASE_ACTION;
use switchboard::protocol::{decode_frame, decode_message, encode_message, OutboundMessage, MAX_FRAME_SIZE};
use switchboard::SwitchboardError;

// =============================================================================
// Inbound Decoding Tests
// =============================================================================

#[test]
fn test_decode_full_payload() {
    let payload = decode_frame(
        br#"{"action":"channel-connect","channel":"lobby","userId":7,"id":"m1","auth":"tok","data":{"x":1}}"#,
    )
    .unwrap();

    assert_eq!(payload.action_name(), Some("channel-connect"));
    assert_eq!(payload.channel.as_deref(), Some("lobby"));
    assert_eq!(payload.user_id, Some(7));
    assert_eq!(payload.id.as_deref(), Some("m1"));
    assert_eq!(payload.auth.as_deref(), Some("tok"));
    assert_eq!(payload.data, Some(json!({"x": 1})));
}

#[test]
fn test_decode_keeps_unknown_fields() {
    let payload = decode_frame(br#"{"action":"custom","room":12}"#).unwrap();
    assert_eq!(payload.extra.get("room"), Some(&json!(12)));
}

#[test]
fn test_decode_explicit_null_data_is_present() {
    let payload = decode_frame(br#"{"action":"base-action","data":null}"#).unwrap();
    assert_eq!(payload.data, Some(Value::Null));

    let payload = decode_frame(br#"{"action":"base-action"}"#).unwrap();
    assert_eq!(payload.data, None);
}

#[test]
fn test_decode_empty_action_is_none() {
    let payload = decode_frame(br#"{"action":"","data":"x"}"#).unwrap();
    assert_eq!(payload.action_name(), None);
}

#[test]
fn test_decode_non_json_degrades() {
    let payload = decode_frame(b"not json at all {").unwrap();
    assert_eq!(payload.action_name(), Some(BASE_ACTION));
    assert_eq!(payload.data_str(), Some("not json at all {"));
}

#[test]
fn test_decode_json_array_degrades() {
    let payload = decode_frame(b"[1,2,3]").unwrap();
    assert_eq!(payload.action_name(), Some(BASE_ACTION));
    assert_eq!(payload.data_str(), Some("[1,2,3]"));
}

#[test]
fn test_decode_wrong_field_type_is_invalid() {
    let err = decode_frame(br#"{"action":"channel-connect","channel":5}"#).unwrap_err();
    assert!(matches!(err, SwitchboardError::InvalidPayload(_)));
}

#[test]
fn test_decode_oversized_frame_is_invalid() {
    let raw = vec![b'a'; MAX_FRAME_SIZE + 1];
    let err = decode_frame(&raw).unwrap_err();
    assert!(matches!(err, SwitchboardError::InvalidPayload(_)));
}

// =============================================================================
// Outbound Encoding Tests
// =============================================================================

#[test]
fn test_encode_omits_absent_fields() {
    let msg = OutboundMessage::new("broadcast-action", json!("hi"));
    let encoded = encode_message(&msg).unwrap();
    let value: Value = serde_json::from_str(&encoded).unwrap();

    assert_eq!(value, json!({"action": "broadcast-action", "data": "hi"}));
}

#[test]
fn test_encode_with_sender_and_id() {
    let mut msg = OutboundMessage::new("fanout-action", json!({"n": 1})).with_sender(Some(4));
    msg.id = Some("abc".to_string());
    let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

    assert_eq!(value["fd"], json!(4));
    assert_eq!(value["id"], json!("abc"));
}

#[test]
fn test_error_shape() {
    let msg = OutboundMessage::error("custom", "Not allowed");
    let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

    assert_eq!(value, json!({"action": "custom", "data": "Not allowed", "error": true}));
}

#[test]
fn test_content_excludes_id() {
    let mut msg = OutboundMessage::new("a", json!(1));
    let bare = msg.content().unwrap();
    msg.id = Some("x".to_string());

    assert_eq!(msg.content().unwrap(), bare);
    assert_ne!(msg.encode().unwrap(), bare);
}

#[test]
fn test_decode_message() {
    let msg = decode_message(r#"{"action":"a","data":null,"fd":2}"#).unwrap();
    assert_eq!(msg.fd, Some(2));
    assert!(!msg.error);
    assert!(decode_message("garbage").is_err());
}
