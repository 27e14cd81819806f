//! End-to-end tests for two relays connected by an in-memory link.

use event_relay::{
    channel_pair, Emitter, EventEmitter, Frame, Link, Relay, RelayConfig, RelayError,
    SubscriptionState, SubscriptionStatus, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Peers {
    a: Relay,
    b: Relay,
    a_link: Link,
    b_link: Link,
}

impl Peers {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let (a_link, b_link) = channel_pair();
        let a = Relay::with_transport(RelayConfig::default(), a_link.transport.clone());
        let b = Relay::with_transport(RelayConfig::default(), b_link.transport.clone());
        Self {
            a,
            b,
            a_link,
            b_link,
        }
    }

    /// Deliver frames both ways until nothing is in flight.
    fn settle(&self) {
        loop {
            let moved = self.a.pump(&self.a_link.inbox) + self.b.pump(&self.b_link.inbox);
            if moved == 0 {
                break;
            }
        }
    }

    fn emit_on_a(&self, event: &str, args: &[Value]) -> usize {
        self.a.root().unwrap().emit(event, args)
    }
}

fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
    let hits = Arc::new(AtomicUsize::new(0));
    let handle = hits.clone();
    (hits, move |_: &[Value]| {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

fn count_method(frames: &[Frame], name: &str) -> usize {
    frames.iter().filter(|f| f.method() == Some(name)).count()
}

// --- Basic Delivery ---

#[test]
fn test_subscribe_receive_unsubscribe() {
    let peers = Peers::new();
    let seen: Arc<Mutex<Vec<Vec<Value>>>> = Arc::default();
    let sink = seen.clone();

    let handle = peers.b.subscribe("event", move |args: &[Value]| {
        sink.lock().push(args.to_vec());
    });
    peers.settle();
    assert_eq!(handle.try_recv().unwrap(), SubscriptionStatus::Active);

    peers.emit_on_a("event", &[json!(42)]);
    peers.settle();
    assert_eq!(*seen.lock(), vec![vec![json!(42)]]);

    assert!(peers.b.unsubscribe("event", handle.handler));
    assert_eq!(peers.b.listener_count("event"), 0);
    peers.settle();
    assert!(!peers.a.is_forwarding("event"));
    assert_eq!(peers.a.root().unwrap().listener_count("event"), 0);

    peers.emit_on_a("event", &[json!(43)]);
    peers.settle();
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn test_nested_interface_unsubscribe_from_handler() {
    let peers = Peers::new();
    let z = Arc::new(Emitter::new());
    peers.a.set_interface("x.y.z", z.clone());

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let relay = peers.b.clone();
    let own_handler: Arc<Mutex<Option<event_relay::HandlerId>>> = Arc::default();
    let slot = own_handler.clone();
    let emitter = z.clone();

    let handle = peers.b.subscribe("x.y.z.wow", move |args: &[Value]| {
        assert_eq!(args, &[json!(42)]);
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = slot.lock().take() {
            relay.unsubscribe("x.y.z.wow", id);
            assert_eq!(relay.listener_count("x.y.z.wow"), 0);
        }
        // The peer has not processed the unsubscribe yet.
        emitter.emit("wow", &[json!(42)]);
    });
    *own_handler.lock() = Some(handle.handler);
    peers.settle();

    z.emit("wow", &[json!(42)]);
    peers.settle();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(z.listener_count("wow"), 0);
}

// --- Multiplexing ---

#[test]
fn test_concurrent_subscribers_share_one_call() {
    let peers = Peers::new();
    let mut handles = Vec::new();
    let mut counters = Vec::new();

    for _ in 0..5 {
        let (hits, handler) = counter();
        handles.push(peers.b.subscribe("event", handler));
        counters.push(hits);
    }
    assert_eq!(
        peers.b.subscription_state("event"),
        Some(SubscriptionState::Establishing)
    );

    let frames = peers.a_link.drain();
    assert_eq!(count_method(&frames, SUBSCRIBE_METHOD), 1);
    for frame in frames {
        peers.a.receive(frame);
    }
    peers.settle();

    for handle in &handles {
        assert_eq!(handle.try_recv().unwrap(), SubscriptionStatus::Active);
        assert!(handle.try_recv().is_err());
    }
    assert_eq!(peers.a.local_subscription_count(), 1);

    peers.emit_on_a("event", &[]);
    peers.settle();
    for hits in &counters {
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_unsubscribe_one_of_two_handlers() {
    let peers = Peers::new();
    let (first_hits, first) = counter();
    let (second_hits, second) = counter();

    let first = peers.b.subscribe("event", first);
    let second = peers.b.subscribe("event", second);

    let frames = peers.a_link.drain();
    assert_eq!(count_method(&frames, SUBSCRIBE_METHOD), 1);
    frames.into_iter().for_each(|f| peers.a.receive(f));
    peers.settle();

    assert!(peers.b.unsubscribe("event", first.handler));
    assert!(peers.a_link.drain().is_empty());

    peers.emit_on_a("event", &[json!("still here")]);
    peers.settle();
    assert_eq!(first_hits.load(Ordering::SeqCst), 0);
    assert_eq!(second_hits.load(Ordering::SeqCst), 1);

    assert!(peers.b.unsubscribe("event", second.handler));
    let frames = peers.a_link.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(count_method(&frames, UNSUBSCRIBE_METHOD), 1);
    assert_eq!(peers.b.remote_subscription_count(), 0);
}

#[test]
fn test_late_subscriber_confirmed_immediately() {
    let peers = Peers::new();
    let (_, early) = counter();
    let early = peers.b.subscribe("event", early);
    peers.settle();
    assert_eq!(early.try_recv().unwrap(), SubscriptionStatus::Active);

    let (late_hits, late) = counter();
    let late = peers.b.subscribe("event", late);
    assert_eq!(late.try_recv().unwrap(), SubscriptionStatus::Active);
    assert!(peers.a_link.drain().is_empty());

    peers.emit_on_a("event", &[]);
    peers.settle();
    assert_eq!(late_hits.load(Ordering::SeqCst), 1);
}

// --- Failure and Teardown ---

#[test]
fn test_subscribe_to_missing_interface() {
    let peers = Peers::new();
    let (_, handler) = counter();
    let handle = peers.b.subscribe("sub.event", handler);
    peers.settle();

    match handle.try_recv().unwrap() {
        SubscriptionStatus::Closed(err) => {
            assert_eq!(err.code(), -32000);
            assert!(matches!(err, RelayError::InterfaceNotFound(_)));
        }
        other => panic!("Expected Closed, got {:?}", other),
    }
    assert_eq!(peers.b.remote_subscription_count(), 0);
    assert_eq!(peers.b.listener_count("sub.event"), 0);
}

#[test]
fn test_interface_removal_closes_remote_subscription() {
    let peers = Peers::new();
    let sub = Arc::new(Emitter::new());
    peers.a.set_interface("sub", sub.clone());

    let (_, first) = counter();
    let (_, second) = counter();
    let first = peers.b.subscribe("sub.event", first);
    let second = peers.b.subscribe("sub.other", second);
    peers.settle();
    assert_eq!(sub.total_listeners(), 2);

    assert!(peers.a.remove_interface("sub").is_some());
    assert_eq!(sub.total_listeners(), 0);
    assert_eq!(peers.a.local_subscription_count(), 0);
    peers.settle();

    for handle in [&first, &second] {
        assert_eq!(handle.try_recv().unwrap(), SubscriptionStatus::Active);
        assert_eq!(
            handle.try_recv().unwrap(),
            SubscriptionStatus::Closed(RelayError::InterfaceRemoved)
        );
    }
    assert_eq!(peers.b.remote_subscription_count(), 0);
    assert_eq!(peers.b.listener_count("sub.event"), 0);
}

#[test]
fn test_close_tears_down_forwarding() {
    let peers = Peers::new();
    let (_, handler) = counter();
    let handle = peers.b.subscribe("event", handler);
    peers.settle();
    assert_eq!(handle.try_recv().unwrap(), SubscriptionStatus::Active);

    peers.a.close();
    assert_eq!(peers.a.local_subscription_count(), 0);
    assert_eq!(peers.a.root().unwrap().listener_count("event"), 0);

    peers.settle();
    assert_eq!(
        handle.try_recv().unwrap(),
        SubscriptionStatus::Closed(RelayError::InterfaceRemoved)
    );
    assert_eq!(peers.b.remote_subscription_count(), 0);
}

#[test]
fn test_close_drops_remote_subscriptions_without_traffic() {
    let peers = Peers::new();
    let (_, establishing) = counter();
    let (_, active) = counter();

    let active = peers.b.subscribe("active", active);
    peers.settle();
    assert_eq!(active.try_recv().unwrap(), SubscriptionStatus::Active);

    let establishing = peers.b.subscribe("establishing", establishing);
    assert_eq!(peers.a_link.drain().len(), 1);

    peers.b.close();
    assert!(peers.a_link.drain().is_empty());
    assert_eq!(peers.b.remote_subscription_count(), 0);
    assert_eq!(peers.b.listener_count("active"), 0);

    assert_eq!(
        active.try_recv().unwrap(),
        SubscriptionStatus::Closed(RelayError::ConnectionClosed)
    );
    assert_eq!(
        establishing.try_recv().unwrap(),
        SubscriptionStatus::Closed(RelayError::ConnectionClosed)
    );
}

#[test]
fn test_both_directions() {
    let peers = Peers::new();
    let (a_hits, a_handler) = counter();
    let (b_hits, b_handler) = counter();

    peers.a.subscribe("ping", a_handler);
    peers.b.subscribe("pong", b_handler);
    peers.settle();

    peers.b.root().unwrap().emit("ping", &[]);
    peers.emit_on_a("pong", &[]);
    peers.emit_on_a("ping", &[]);
    peers.settle();

    assert_eq!(a_hits.load(Ordering::SeqCst), 1);
    assert_eq!(b_hits.load(Ordering::SeqCst), 1);
    assert_eq!(peers.a.local_subscription_count(), 1);
    assert_eq!(peers.b.local_subscription_count(), 1);
}
