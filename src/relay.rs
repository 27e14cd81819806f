//! The relay: subscribe protocol and interface lifecycle on top of the engine.

use crate::engine::{Frame, RpcEngine, Transport};
use crate::error::{RelayError, Result};
use crate::interfaces::{Emitter, EventEmitter, InterfaceTree};
use crate::path::PathResolver;
use crate::sequence::{parse_sequence, SequenceGuard};
use crate::subscriptions::{
    LocalRegistry, RemoteRegistry, SubscriptionHandle, SubscriptionState, Unsubscribed,
};
use crate::types::{
    CallId, HandlerId, Listener, DEFAULT_PATH_DELIMITER, SUBSCRIBE_METHOD, UNSUBSCRIBE_METHOD,
};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Separator between interface path and event name.
    /// Default: '.'
    pub path_delimiter: char,

    /// How long a call waits for its response (None = forever).
    /// Default: 30s
    pub call_timeout: Option<Duration>,

    /// Capacity of each subscription's status channel.
    /// Default: 4
    pub status_buffer: usize,

    /// Starting point of the local sequence (None = random).
    pub initial_sequence: Option<u32>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            path_delimiter: DEFAULT_PATH_DELIMITER,
            call_timeout: Some(Duration::from_secs(30)),
            status_buffer: 4,
            initial_sequence: None,
        }
    }
}

struct RelayInner {
    config: RelayConfig,
    resolver: PathResolver,
    engine: RpcEngine,
    interfaces: InterfaceTree,
    /// Handlers for events forwarded by the peer, keyed by full path.
    dispatcher: Emitter,
    sequence: Mutex<SequenceGuard>,
    local: Mutex<LocalRegistry>,
    remote: Mutex<RemoteRegistry>,
}

/// One end of a two-peer event relay.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    /// Create a relay with an empty root interface at `""`.
    pub fn new(config: RelayConfig) -> Self {
        let resolver = PathResolver::new(config.path_delimiter);
        let sequence = match config.initial_sequence {
            Some(seed) => SequenceGuard::with_local_seed(seed),
            None => SequenceGuard::new(),
        };

        let inner = RelayInner {
            resolver,
            engine: RpcEngine::new(config.call_timeout),
            interfaces: InterfaceTree::new(),
            dispatcher: Emitter::new(),
            sequence: Mutex::new(sequence),
            local: Mutex::new(LocalRegistry::new(resolver)),
            remote: Mutex::new(RemoteRegistry::new(resolver)),
            config,
        };
        inner.interfaces.insert("", Arc::new(Emitter::new()));

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create a relay already attached to a transport.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        let relay = Self::new(config);
        relay.set_transport(transport);
        relay
    }

    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        self.inner.engine.set_transport(transport);
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// The underlying call engine.
    pub fn engine(&self) -> &RpcEngine {
        &self.inner.engine
    }

    // --- Interface Lifecycle ---

    /// Attach an interface node at `path`.
    ///
    /// A node already at `path` is treated as removed first, so the peer's
    /// subscriptions on it are closed rather than silently moved.
    pub fn set_interface(&self, path: impl Into<String>, node: Arc<dyn EventEmitter>) {
        let path = path.into();
        if let Some(previous) = self.inner.interfaces.insert(path.clone(), node) {
            self.inner.on_interface_removed(&path, previous.as_ref());
        }
        debug!(path = %path, "interface added");
    }

    /// Detach the node at `path` and every node below it.
    ///
    /// Subscriptions the peer held on them are closed with `InterfaceRemoved`.
    pub fn remove_interface(&self, path: &str) -> Option<Arc<dyn EventEmitter>> {
        let tree = &self.inner.interfaces;
        let node = tree.remove(path)?;
        self.inner.on_interface_removed(path, node.as_ref());

        for descendant in tree.descendants(path, self.inner.resolver.delimiter()) {
            if let Some(child) = tree.remove(&descendant) {
                self.inner.on_interface_removed(&descendant, child.as_ref());
            }
        }
        Some(node)
    }

    pub fn interface(&self, path: &str) -> Option<Arc<dyn EventEmitter>> {
        self.inner.interfaces.get(path)
    }

    /// The root interface, unless it was removed.
    pub fn root(&self) -> Option<Arc<dyn EventEmitter>> {
        self.interface("")
    }

    // --- Subscribing to the peer ---

    /// Subscribe `handler` to the peer's event at `path`.
    ///
    /// Only the first subscriber for a path causes a `subscribe` call; later
    /// ones share it. Progress is reported on the returned handle.
    pub fn subscribe<F>(&self, path: &str, handler: F) -> SubscriptionHandle
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let inner = &self.inner;
        let (status_tx, status_rx) = bounded(inner.config.status_buffer.max(2));
        let handler: Listener = Arc::new(handler);

        let (handler_id, call) = inner.remote.lock().subscribe(
            path,
            handler,
            status_tx,
            &inner.dispatcher,
            || inner.engine.generate_call_id(),
        );

        if let Some(call_id) = call {
            inner.send_subscribe(path, call_id);
        }

        SubscriptionHandle {
            path: path.to_string(),
            handler: handler_id,
            status: status_rx,
        }
    }

    /// Remove one handler from `path`.
    ///
    /// Removing the last handler sends a best-effort `unsubscribe` whose
    /// outcome is not reported. Returns false if the handler was not
    /// subscribed.
    pub fn unsubscribe(&self, path: &str, handler: HandlerId) -> bool {
        let inner = &self.inner;
        let removed = inner
            .remote
            .lock()
            .unsubscribe(path, handler, &inner.dispatcher);

        match removed {
            None => false,
            Some(Unsubscribed::Handler) => true,
            Some(Unsubscribed::Last(id)) => {
                inner.engine.cancel(id);
                let sequence = inner.sequence.lock().next_local();
                inner.engine.call(
                    None,
                    UNSUBSCRIBE_METHOD,
                    vec![json!(sequence), json!(path)],
                    None,
                );
                true
            }
        }
    }

    /// Handlers currently receiving events for `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        self.inner.dispatcher.listener_count(path)
    }

    pub fn subscription_state(&self, path: &str) -> Option<SubscriptionState> {
        self.inner.remote.lock().get(path).map(|s| s.state())
    }

    pub fn remote_subscription_count(&self) -> usize {
        self.inner.remote.lock().len()
    }

    // --- Serving the peer ---

    /// Handle one frame from the peer.
    pub fn receive(&self, frame: Frame) {
        match frame {
            Frame::Response { id, result, error } => {
                self.inner
                    .engine
                    .handle_response(id, Frame::into_outcome(result, error));
            }
            Frame::Call { id, method, params } => match method.as_str() {
                SUBSCRIBE_METHOD => self.inner.handle_subscribe(id, &params),
                UNSUBSCRIBE_METHOD => self.inner.handle_unsubscribe(id, &params),
                _ => self.inner.dispatch(id, &method, &params),
            },
        }
    }

    /// Receive everything currently queued in `inbox`.
    pub fn pump(&self, inbox: &Receiver<Frame>) -> usize {
        let mut count = 0;
        while let Ok(frame) = inbox.try_recv() {
            self.receive(frame);
            count += 1;
        }
        count
    }

    /// True if the peer is subscribed to our event at `path`.
    pub fn is_forwarding(&self, path: &str) -> bool {
        self.inner.local.lock().contains(path)
    }

    pub fn local_subscription_count(&self) -> usize {
        self.inner.local.lock().len()
    }

    // --- Connection ---

    /// Fail calls whose deadline passed. Returns how many expired.
    pub fn expire_calls(&self, now: Instant) -> usize {
        self.inner.engine.expire(now)
    }

    /// Tear down the session.
    ///
    /// Every forwarding subscription is closed with `InterfaceRemoved`, the
    /// remote sequence cursor is reset, and every subscription on the peer
    /// is dropped locally with `ConnectionClosed` without further calls.
    pub fn close(&self) {
        let inner = &self.inner;

        let forwarded = inner.local.lock().drain(&inner.interfaces);
        let forwarded_count = forwarded.len();
        for subscription in forwarded {
            subscription.close(RelayError::InterfaceRemoved);
        }

        inner.sequence.lock().reset_remote();

        let failed_calls = inner.engine.close();
        let leftover = inner
            .remote
            .lock()
            .drain(RelayError::ConnectionClosed, &inner.dispatcher);

        debug!(
            forwarded = forwarded_count,
            failed_calls,
            leftover = leftover.len(),
            "relay closed"
        );
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

impl RelayInner {
    fn send_subscribe(self: &Arc<Self>, path: &str, call_id: CallId) {
        let sequence = self.sequence.lock().next_local();
        let weak = Arc::downgrade(self);
        let owned = path.to_string();

        self.engine.call(
            Some(call_id),
            SUBSCRIBE_METHOD,
            vec![json!(sequence), json!(path)],
            Some(Box::new(move |outcome: Result<Value>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_subscribe_response(&owned, call_id, outcome);
                }
            })),
        );
    }

    fn on_subscribe_response(self: &Arc<Self>, path: &str, call_id: CallId, outcome: Result<Value>) {
        let adopted = match outcome {
            Ok(_) => call_id,
            Err(RelayError::SubscriptionExists {
                existing_callback_id,
            }) => {
                debug!(path, %call_id, existing = %existing_callback_id, "joining existing subscription");
                existing_callback_id
            }
            Err(err) => {
                self.remote
                    .lock()
                    .teardown(path, call_id, err, &self.dispatcher);
                return;
            }
        };

        let established = self
            .remote
            .lock()
            .establish(path, call_id, adopted, &self.dispatcher);

        if established {
            self.watch(path, adopted);
        } else {
            debug!(path, %call_id, "answer for a subscription no longer held");
        }
    }

    /// Listen for the peer closing the subscription under `id` later on.
    fn watch(self: &Arc<Self>, path: &str, id: CallId) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let owned = path.to_string();

        self.engine.set_callback(
            id,
            Box::new(move |outcome: Result<Value>| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match outcome {
                    Err(err) => {
                        inner
                            .remote
                            .lock()
                            .teardown(&owned, id, err, &inner.dispatcher);
                    }
                    Ok(_) => {
                        warn!(path = %owned, %id, "unexpected success for an active subscription");
                        inner.watch(&owned, id);
                    }
                }
            }),
        );
    }

    fn handle_subscribe(self: &Arc<Self>, id: Option<CallId>, params: &[Value]) {
        let responder = self.engine.responder(id);
        let (sequence, path) = match parse_control(params) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(?id, error = %err, "malformed subscribe");
                responder.reject(err);
                return;
            }
        };

        if !self.sequence.lock().accept_remote(sequence) {
            trace!(sequence, path = %path, "stale subscribe dropped");
            return;
        }

        let forward = self.forwarder(&path);
        let attached = self
            .local
            .lock()
            .attach(&self.interfaces, &path, responder.clone(), forward)
            .map(|subscription| subscription.call_id());

        match attached {
            Ok(call_id) => {
                debug!(path = %path, %call_id, "peer subscribed");
                responder.respond(Ok(Value::Null));
            }
            Err(err) => {
                debug!(path = %path, error = %err, "peer subscribe refused");
                responder.reject(err);
            }
        }
    }

    fn handle_unsubscribe(&self, id: Option<CallId>, params: &[Value]) {
        let responder = self.engine.responder(id);
        let (sequence, path) = match parse_control(params) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(?id, error = %err, "malformed unsubscribe");
                responder.reject(err);
                return;
            }
        };

        if !self.sequence.lock().accept_remote(sequence) {
            trace!(sequence, path = %path, "stale unsubscribe dropped");
            return;
        }

        let removed = self.local.lock().detach(&self.interfaces, &path);
        debug!(path = %path, removed = removed.is_some(), "peer unsubscribed");
        responder.respond(Ok(json!(removed.is_some())));
    }

    /// Deliver an event the peer forwarded.
    fn dispatch(&self, id: Option<CallId>, method: &str, params: &[Value]) {
        let delivered = self.dispatcher.emit(method, params);
        trace!(path = method, delivered, "event dispatched");

        if id.is_some() {
            let responder = self.engine.responder(id);
            if delivered == 0 {
                responder.reject(RelayError::MethodNotFound(method.to_string()));
            } else {
                responder.respond(Ok(Value::Null));
            }
        }
    }

    /// Listener that re-emits an event to the peer as a call on `path`.
    fn forwarder(self: &Arc<Self>, path: &str) -> Listener {
        let weak = Arc::downgrade(self);
        let path = path.to_string();

        Arc::new(move |args: &[Value]| {
            if let Some(inner) = weak.upgrade() {
                trace!(path = %path, "forwarding event");
                inner.engine.call(None, &path, args.to_vec(), None);
            }
        })
    }

    fn on_interface_removed(&self, path: &str, node: &dyn EventEmitter) {
        let evicted = self.local.lock().evict_interface(path, Some(node));
        if !evicted.is_empty() {
            debug!(path, count = evicted.len(), "closing subscriptions on removed interface");
        }
        for subscription in evicted {
            subscription.close(RelayError::InterfaceRemoved);
        }
    }
}

/// Parse `[sequence, path]` control parameters.
fn parse_control(params: &[Value]) -> Result<(u32, String)> {
    let sequence = params
        .first()
        .and_then(parse_sequence)
        .ok_or_else(|| RelayError::InvalidParams("sequence must be a u32".into()))?;
    let path = params
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::InvalidParams("path must be a string".into()))?;
    Ok((sequence, path.to_string()))
}
