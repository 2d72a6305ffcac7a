//! Router Workflow Tests
//!
//! Tests verify:
//! - Transition ordering and its error text
//! - Missing context before an action is resolved
//! - Action resolution, unknown actions and invalid payloads
//! - Middleware ordering, rewriting and aborting
//! - Fault handler interception
//! - Liveness sweep

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use switchboard::action::{
    Action, ActionContext, ActionRegistry, Middleware, MiddlewareContext, BASE_ACTION,
};
use switchboard::ack::ManualScheduler;
use switchboard::persistence::PersistenceSet;
use switchboard::protocol::Payload;
use switchboard::router::{FaultHandler, Place};
use switchboard::{Config, Fd, MemoryTransport, Result, Router, SwitchboardError};

// =============================================================================
// Helper Functions
// =============================================================================

/// Replies with whatever it was sent, tagged
struct EchoAction;

impl Action for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    fn execute(&self, ctx: &ActionContext, payload: &Payload) -> Result<()> {
        ctx.reply(json!({ "echo": payload.data_or_null() }))?;
        Ok(())
    }
}

fn transport(open: &[Fd]) -> Arc<MemoryTransport> {
    let t = Arc::new(MemoryTransport::new());
    for fd in open {
        t.open(*fd);
    }
    t
}

fn bound_router(transport: &Arc<MemoryTransport>, persistence: &PersistenceSet, fd: Fd) -> Router {
    let mut router = Router::new(Arc::new(Config::default()));
    router
        .set_server(transport.clone())
        .unwrap()
        .set_fd(fd)
        .unwrap()
        .set_persistence(persistence.clone())
        .unwrap();
    router
}

// =============================================================================
// Transition Tests
// =============================================================================

#[test]
fn test_full_workflow_reaches_finalized() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);

    router.handle(br#"{"action":"base-action","data":"ping"}"#).unwrap();

    assert_eq!(router.place(), Place::Finalized);
    assert_eq!(t.messages_to(1)[0].data, json!("ping"));
}

#[test]
fn test_set_fd_before_server_is_illegal() {
    let mut router = Router::new(Arc::new(Config::default()));
    let err = router.set_fd(1).err().unwrap();

    assert!(matches!(err, SwitchboardError::IllegalTransition { .. }));
    assert_eq!(
        err.to_string(),
        "Illegal transition 'set_fd' from state 'started' (expected 'set_server' first)"
    );
}

#[test]
fn test_process_before_prepare_is_illegal() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);

    let err = router.process_message().err().unwrap();
    assert!(matches!(
        err,
        SwitchboardError::IllegalTransition { transition: "process_message", state: "persistence_set", .. }
    ));
}

#[test]
fn test_registration_after_prepare_is_illegal() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);
    router.prepare_action(br#"{"action":"base-action","data":1}"#).unwrap();

    let err = router.add_action(Arc::new(EchoAction)).err().unwrap();
    assert!(matches!(err, SwitchboardError::IllegalTransition { .. }));
}

#[test]
fn test_prepare_without_persistence_is_missing_context() {
    let t = transport(&[1]);
    let mut router = Router::new(Arc::new(Config::default()));
    router
        .set_server(t.clone())
        .unwrap()
        .set_fd(1)
        .unwrap()
        .add_action(Arc::new(EchoAction))
        .unwrap();

    let err = router.prepare_action(br#"{"action":"echo"}"#).err().unwrap();
    assert!(matches!(err, SwitchboardError::MissingContext { .. }));
    assert_eq!(router.place(), Place::ActionsAdded);
}

#[test]
fn test_ack_without_scheduler_is_missing_context() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let config = Config::builder().use_acknowledgment(true).build();
    let mut router = Router::new(Arc::new(config));
    router
        .set_server(t.clone())
        .unwrap()
        .set_fd(1)
        .unwrap()
        .set_persistence(p)
        .unwrap();

    let err = router.prepare_action(br#"{"action":"base-action","data":1}"#).err().unwrap();
    assert!(matches!(err, SwitchboardError::MissingContext { .. }));

    // With a scheduler it goes through
    let mut router = Router::new(Arc::new(Config::builder().use_acknowledgment(true).build()))
        .with_scheduler(Arc::new(ManualScheduler::new()));
    router
        .set_server(t.clone())
        .unwrap()
        .set_fd(1)
        .unwrap()
        .set_persistence(PersistenceSet::in_memory(16))
        .unwrap();
    router.handle(br#"{"action":"base-action","data":1}"#).unwrap();
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_registered_action_runs() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);
    router.add_action(Arc::new(EchoAction)).unwrap();

    router.handle(br#"{"action":"echo","data":5}"#).unwrap();

    let msg = &t.messages_to(1)[0];
    assert_eq!(msg.action, "echo");
    assert_eq!(msg.data, json!({"echo": 5}));
    assert_eq!(msg.fd, Some(1));
}

#[test]
fn test_duplicate_registration_rejected() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);
    router.add_action(Arc::new(EchoAction)).unwrap();

    let err = router.add_action(Arc::new(EchoAction)).err().unwrap();
    assert!(matches!(err, SwitchboardError::DuplicateAction(name) if name == "echo"));
}

#[test]
fn test_unknown_action_differs_from_invalid_payload() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);

    let unknown = bound_router(&t, &p, 1).handle(br#"{"action":"nope"}"#).unwrap_err();
    assert!(matches!(unknown, SwitchboardError::UnknownAction(name) if name == "nope"));

    let missing = bound_router(&t, &p, 1).handle(br#"{"data":"x"}"#).unwrap_err();
    assert!(matches!(missing, SwitchboardError::InvalidPayload(_)));
}

#[test]
fn test_plain_text_frame_hits_base_action() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let mut router = bound_router(&t, &p, 1);

    router.handle(b"just words").unwrap();

    let msg = &t.messages_to(1)[0];
    assert_eq!(msg.action, BASE_ACTION);
    assert_eq!(msg.data, json!("just words"));
}

#[test]
fn test_validation_fault_message() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);

    let err = bound_router(&t, &p, 1)
        .handle(br#"{"action":"channel-connect"}"#)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required field 'channel' for action 'channel-connect'"
    );
    assert!(err.is_client_visible());
}

// =============================================================================
// Middleware Tests
// =============================================================================

#[test]
fn test_middleware_runs_in_order_and_rewrites() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = {
        let order = Arc::clone(&order);
        move |mut ctx: MiddlewareContext| -> Result<MiddlewareContext> {
            order.lock().unwrap().push("first");
            ctx.payload.data = Some(json!("rewritten"));
            Ok(ctx)
        }
    };
    let second = {
        let order = Arc::clone(&order);
        move |ctx: MiddlewareContext| -> Result<MiddlewareContext> {
            order.lock().unwrap().push("second");
            assert_eq!(ctx.payload.data, Some(json!("rewritten")));
            Ok(ctx)
        }
    };

    let mut router = bound_router(&t, &p, 1);
    router
        .add_action(Arc::new(EchoAction))
        .unwrap()
        .add_middleware("echo", Arc::new(first))
        .unwrap()
        .add_middleware("echo", Arc::new(second))
        .unwrap();
    router.handle(br#"{"action":"echo","data":"original"}"#).unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    assert_eq!(t.messages_to(1)[0].data, json!({"echo": "rewritten"}));
    assert_eq!(router.payload().and_then(|p| p.data.clone()), Some(json!("rewritten")));
}

#[test]
fn test_middleware_abort_skips_action() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let deny = |_ctx: MiddlewareContext| -> Result<MiddlewareContext> {
        Err(SwitchboardError::Rejected("Not allowed".to_string()))
    };

    let mut router = bound_router(&t, &p, 1);
    router
        .add_action(Arc::new(EchoAction))
        .unwrap()
        .add_middleware("echo", Arc::new(deny))
        .unwrap();
    let err = router.handle(br#"{"action":"echo","data":1}"#).unwrap_err();

    assert_eq!(err.to_string(), "Not allowed");
    assert_eq!(t.sent_count(), 0);
    assert_eq!(router.place(), Place::PipelinePrepared);
}

#[test]
fn test_middleware_sees_current_user() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    p.users.assoc(1, 77).unwrap();
    let seen = Arc::new(Mutex::new(None));

    let spy = {
        let seen = Arc::clone(&seen);
        move |ctx: MiddlewareContext| -> Result<MiddlewareContext> {
            *seen.lock().unwrap() = ctx.current_user_id;
            Ok(ctx)
        }
    };

    let mut router = bound_router(&t, &p, 1);
    router.add_middleware(BASE_ACTION, Arc::new(spy)).unwrap();
    router.handle(br#"{"action":"base-action","data":1}"#).unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(77));
}

#[test]
fn test_registry_pipeline_identity() {
    let registry = ActionRegistry::with_builtins();
    assert!(registry.get_pipeline("anything").is_empty());
    assert!(registry.has_action(BASE_ACTION));

    let mut registry = registry;
    let noop: Arc<dyn Middleware> = Arc::new(|ctx: MiddlewareContext| -> Result<MiddlewareContext> { Ok(ctx) });
    registry.middleware(BASE_ACTION, noop);
    assert_eq!(registry.get_pipeline(BASE_ACTION).len(), 1);
}

// =============================================================================
// Fault Handler Tests
// =============================================================================

struct RecordingHandler {
    seen: Mutex<Vec<(Option<Fd>, String)>>,
}

impl FaultHandler for RecordingHandler {
    fn handle(&self, fd: Option<Fd>, error: SwitchboardError) -> SwitchboardError {
        self.seen.lock().unwrap().push((fd, error.to_string()));
        error
    }
}

#[test]
fn test_fault_handler_sees_errors() {
    let t = transport(&[1]);
    let p = PersistenceSet::in_memory(16);
    let handler = Arc::new(RecordingHandler {
        seen: Mutex::new(Vec::new()),
    });

    let mut router = Router::new(Arc::new(Config::default())).with_fault_handler(handler.clone());
    router
        .set_server(t.clone())
        .unwrap()
        .set_fd(1)
        .unwrap()
        .set_persistence(p)
        .unwrap();
    let err = router.handle(br#"{"action":"missing"}"#).unwrap_err();

    assert!(matches!(err, SwitchboardError::UnknownAction(_)));
    let seen = handler.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, Some(1));
}

// =============================================================================
// Liveness Tests
// =============================================================================

#[test]
fn test_liveness_sweep_drops_dead_members() {
    let t = transport(&[1, 2]);
    let p = PersistenceSet::in_memory(16);
    p.channels.connect(1, "A").unwrap();
    p.channels.connect(2, "A").unwrap();
    p.channels.connect(3, "A").unwrap();

    let router = bound_router(&t, &p, 1);
    assert_eq!(router.close_connections(), 1);
    assert_eq!(p.channels.get_channel(3), None);
    assert_eq!(p.channels.get_all_connections().len(), 2);
}

#[test]
fn test_broadcast_after_sweep_skips_dead() {
    let t = transport(&[1, 2, 3]);
    let p = PersistenceSet::in_memory(16);
    for fd in [1, 2, 3] {
        p.channels.connect(fd, "A").unwrap();
    }
    t.close(3);

    bound_router(&t, &p, 1)
        .handle(br#"{"action":"broadcast-action","data":"hi"}"#)
        .unwrap();

    assert_eq!(t.messages_to(2).len(), 1);
    assert_eq!(p.channels.get_channel(3), None);
    let data: Vec<Value> = t.messages_to(2).into_iter().map(|m| m.data).collect();
    assert_eq!(data, vec![json!("hi")]);
}
