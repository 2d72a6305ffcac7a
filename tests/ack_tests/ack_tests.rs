//! Acknowledgment Protocol Tests
//!
//! Redelivery runs on a ManualScheduler so every timer fires exactly when
//! virtual time passes its deadline.
//!
//! Tests verify:
//! - Exhaustion after the configured number of redeliveries
//! - Acknowledgment cancelling remaining redeliveries
//! - Linear backoff timing
//! - Acknowledgment echo for client ids
//! - Acknowledgments are never themselves tracked
//! - Closed connections are not pushed to

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use switchboard::ack::{AckProtocol, ManualScheduler};
use switchboard::action::{ACKNOWLEDGE_ACTION, PRESENCE_ACTION};
use switchboard::persistence::{AckPersistence, AckTable, PersistenceSet};
use switchboard::{Config, MemoryTransport, Switchboard};

// =============================================================================
// Helper Functions
// =============================================================================

struct Harness {
    transport: Arc<MemoryTransport>,
    scheduler: Arc<ManualScheduler>,
    engine: Switchboard,
}

fn harness(attempts: u32, timeout: Duration, open: &[u64]) -> Harness {
    let config = Config::builder()
        .use_acknowledgment(true)
        .acknowledgment_attempts(attempts)
        .acknowledgment_timeout(timeout)
        .build();
    harness_with(config, open)
}

fn harness_with(config: Config, open: &[u64]) -> Harness {
    let transport = Arc::new(MemoryTransport::new());
    for fd in open {
        transport.open(*fd);
    }
    let scheduler = Arc::new(ManualScheduler::new());
    let engine = Switchboard::with_parts(
        config,
        transport.clone(),
        PersistenceSet::in_memory(64),
        scheduler.clone(),
    )
    .unwrap();
    Harness {
        transport,
        scheduler,
        engine,
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =============================================================================
// Protocol Tests
// =============================================================================

#[test]
fn test_exhaustion_after_three_redeliveries() {
    let transport = Arc::new(MemoryTransport::new());
    transport.open(1);
    let acks = Arc::new(AckTable::new(16));
    let scheduler = Arc::new(ManualScheduler::new());
    let protocol = AckProtocol::new(acks.clone(), transport.clone(), scheduler.clone(), 3, ms(1000));

    protocol.track(1, "h", "frame").unwrap();
    assert_eq!(acks.remaining("h"), Some(3));
    assert_eq!(scheduler.pending(), 3);

    scheduler.advance(ms(10000));

    assert_eq!(transport.sent_to(1), vec!["frame"; 3]);
    assert!(!acks.has("h"));
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn test_ack_after_first_retry_stops_the_rest() {
    let transport = Arc::new(MemoryTransport::new());
    transport.open(1);
    let acks = Arc::new(AckTable::new(16));
    let scheduler = Arc::new(ManualScheduler::new());
    let protocol = AckProtocol::new(acks.clone(), transport.clone(), scheduler.clone(), 3, ms(1000));

    protocol.track(1, "h", "frame").unwrap();
    scheduler.advance(ms(1000));
    assert_eq!(transport.sent_to(1).len(), 1);
    assert_eq!(acks.remaining("h"), Some(2));

    protocol.acknowledge("h");
    scheduler.advance(ms(10000));

    assert_eq!(transport.sent_to(1).len(), 1);
    assert!(!acks.has("h"));
}

#[test]
fn test_closed_connection_not_pushed_but_counted_down() {
    let transport = Arc::new(MemoryTransport::new());
    transport.open(1);
    let acks = Arc::new(AckTable::new(16));
    let scheduler = Arc::new(ManualScheduler::new());
    let protocol = AckProtocol::new(acks.clone(), transport.clone(), scheduler.clone(), 2, ms(1000));

    protocol.track(1, "h", "frame").unwrap();
    transport.close(1);
    scheduler.advance(ms(1000));

    assert_eq!(transport.sent_count(), 0);
    assert_eq!(acks.remaining("h"), Some(1));
}

// =============================================================================
// End-to-end Tests
// =============================================================================

#[test]
fn test_redelivery_with_linear_backoff() {
    let h = harness(2, ms(500), &[1]);

    h.engine
        .handle_frame(1, br#"{"action":"base-action","data":"hello"}"#)
        .unwrap();
    let original = h.transport.sent_to(1);
    assert_eq!(original.len(), 1);
    let id = h.transport.messages_to(1)[0].id.clone().unwrap();

    h.scheduler.advance(ms(400));
    assert_eq!(h.transport.sent_to(1).len(), 1);

    h.scheduler.advance(ms(100));
    assert_eq!(h.transport.sent_to(1).len(), 2);

    h.scheduler.advance(ms(500));
    let sent = h.transport.sent_to(1);
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|frame| frame == &original[0]));

    h.scheduler.advance(ms(5000));
    assert_eq!(h.transport.sent_to(1).len(), 3);
    assert!(!h.engine.persistence().acks.has(&id));
}

#[test]
fn test_client_ack_cancels_redelivery() {
    let h = harness(3, ms(1000), &[1]);

    h.engine
        .handle_frame(1, br#"{"action":"base-action","data":"hello"}"#)
        .unwrap();
    let id = h.transport.messages_to(1)[0].id.clone().unwrap();
    h.scheduler.advance(ms(1000));
    h.transport.clear_sent();

    let ack = json!({"action": ACKNOWLEDGE_ACTION, "data": id}).to_string();
    h.engine.handle_frame(1, ack.as_bytes()).unwrap();
    h.scheduler.advance(ms(10000));

    assert_eq!(h.transport.sent_count(), 0);
    assert!(!h.engine.persistence().acks.has(&id));
}

#[test]
fn test_client_id_is_echoed() {
    let h = harness(3, ms(1000), &[1, 2]);

    h.engine
        .handle_frame(1, br#"{"action":"fanout-action","data":"x","id":"client-7"}"#)
        .unwrap();

    let to_sender = h.transport.messages_to(1);
    assert_eq!(to_sender.len(), 1);
    assert_eq!(to_sender[0].action, ACKNOWLEDGE_ACTION);
    assert_eq!(to_sender[0].data, json!("client-7"));

    let to_peer = h.transport.messages_to(2);
    assert_eq!(to_peer.len(), 1);
    assert!(to_peer[0].id.is_some());
}

#[test]
fn test_acknowledge_pushes_are_not_tracked() {
    let h = harness(3, ms(1000), &[1]);

    h.engine
        .handle_frame(1, br#"{"action":"assoc-user-to-fd-action","userId":5,"id":"c1"}"#)
        .unwrap();
    assert_eq!(h.transport.messages_to(1)[0].action, ACKNOWLEDGE_ACTION);
    assert_eq!(h.scheduler.pending(), 0);

    h.scheduler.advance(ms(10000));
    assert_eq!(h.transport.sent_to(1).len(), 1);
}

#[test]
fn test_each_recipient_tracked_separately() {
    let h = harness(1, ms(1000), &[1, 2, 3]);

    h.engine
        .handle_frame(1, br#"{"action":"fanout-action","data":"x"}"#)
        .unwrap();
    assert_eq!(h.scheduler.pending(), 2);

    let id_two = h.transport.messages_to(2)[0].id.clone().unwrap();
    let id_three = h.transport.messages_to(3)[0].id.clone().unwrap();
    assert_ne!(id_two, id_three);

    h.engine
        .handle_frame(2, json!({"action": ACKNOWLEDGE_ACTION, "data": id_two}).to_string().as_bytes())
        .unwrap();
    h.scheduler.advance(ms(1000));

    assert_eq!(h.transport.sent_to(2).len(), 1);
    assert_eq!(h.transport.sent_to(3).len(), 2);
}

#[test]
fn test_presence_on_close_is_tracked() {
    let config = Config::builder()
        .use_acknowledgment(true)
        .acknowledgment_attempts(1)
        .acknowledgment_timeout(ms(1000))
        .use_presence(true)
        .build();
    let h = harness_with(config, &[1, 2]);
    for fd in [1, 2] {
        h.engine
            .handle_frame(fd, br#"{"action":"channel-connect","channel":"room"}"#)
            .unwrap();
    }
    // Let the join updates run out their redeliveries
    h.scheduler.advance(ms(10000));
    h.transport.clear_sent();

    h.transport.close(1);
    h.engine.close_connection(1).unwrap();

    let update = h.transport.messages_to(2);
    assert_eq!(update.len(), 1);
    assert_eq!(update[0].action, PRESENCE_ACTION);
    let id = update[0].id.clone().unwrap();
    assert!(h.engine.persistence().acks.has(&id));

    h.scheduler.advance(ms(1000));
    assert_eq!(h.transport.sent_to(2).len(), 2);
    assert!(!h.engine.persistence().acks.has(&id));
}

#[test]
fn test_overflowing_backoff_is_not_tracked() {
    let transport = Arc::new(MemoryTransport::new());
    transport.open(1);
    let acks = Arc::new(AckTable::new(16));
    let scheduler = Arc::new(ManualScheduler::new());
    let protocol = AckProtocol::new(acks.clone(), transport, scheduler.clone(), 2, Duration::MAX);

    assert!(protocol.track(1, "h", "frame").is_err());
    assert!(!acks.has("h"));
    assert_eq!(scheduler.pending(), 0);
}
