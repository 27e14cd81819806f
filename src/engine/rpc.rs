//! Call-id allocation and the pending-response table.

use super::{Frame, Transport};
use crate::error::{RelayError, Result};
use crate::types::CallId;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Invoked with the outcome of a call.
pub type ResponseCallback = Box<dyn FnOnce(Result<Value>) + Send>;

/// Callback waiting for a response.
struct Pending {
    callback: ResponseCallback,
    /// None for callbacks that wait indefinitely.
    deadline: Option<Instant>,
}

/// Shared handle to the current transport.
#[derive(Default)]
pub(crate) struct Outbound {
    transport: RwLock<Option<Arc<dyn Transport>>>,
}

impl Outbound {
    fn send(&self, frame: Frame) -> Result<()> {
        let transport = self.transport.read().clone();
        match transport {
            Some(transport) => transport.send(frame),
            None => Err(RelayError::Transport("no transport attached".into())),
        }
    }
}

/// Issues calls and routes their responses.
pub struct RpcEngine {
    outbound: Arc<Outbound>,
    pending: Mutex<HashMap<CallId, Pending>>,
    next_id: AtomicU64,
    timeout: Option<Duration>,
}

impl RpcEngine {
    /// Create an engine. Calls with a callback expire after `timeout`.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            outbound: Arc::new(Outbound::default()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn set_transport(&self, transport: Arc<dyn Transport>) {
        *self.outbound.transport.write() = Some(transport);
    }

    pub fn clear_transport(&self) {
        *self.outbound.transport.write() = None;
    }

    pub fn generate_call_id(&self) -> CallId {
        CallId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Send a call.
    ///
    /// With a callback, the call gets an id (the given one or a fresh one) and
    /// the callback waits for its response. Without an id or a callback the
    /// call goes out as a notification. A send failure is delivered to the
    /// callback before this returns.
    pub fn call(
        &self,
        id: Option<CallId>,
        method: &str,
        params: Vec<Value>,
        callback: Option<ResponseCallback>,
    ) -> Option<CallId> {
        let id = match (id, &callback) {
            (Some(id), _) => Some(id),
            (None, Some(_)) => Some(self.generate_call_id()),
            (None, None) => None,
        };

        if let (Some(id), Some(callback)) = (id, callback) {
            let deadline = self.timeout.map(|t| Instant::now() + t);
            self.pending
                .lock()
                .insert(id, Pending { callback, deadline });
        }

        let frame = Frame::Call {
            id,
            method: method.to_string(),
            params,
        };

        if let Err(err) = self.outbound.send(frame) {
            warn!(method, ?id, error = %err, "call not sent");
            if let Some(pending) = id.and_then(|id| self.take(id)) {
                (pending.callback)(Err(err));
            }
        }
        id
    }

    /// Register a callback for responses under `id` without a deadline.
    ///
    /// Used to hear about a call the peer may answer again much later.
    pub fn set_callback(&self, id: CallId, callback: ResponseCallback) {
        self.pending.lock().insert(
            id,
            Pending {
                callback,
                deadline: None,
            },
        );
    }

    /// Drop the callback (and its timer) for `id`.
    pub fn cancel(&self, id: CallId) -> bool {
        self.take(id).is_some()
    }

    pub fn is_pending(&self, id: CallId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Deliver a response. Returns false if nothing was waiting for it.
    pub fn handle_response(&self, id: CallId, outcome: Result<Value>) -> bool {
        match self.take(id) {
            Some(pending) => {
                (pending.callback)(outcome);
                true
            }
            None => {
                debug!(%id, "response with no pending call");
                false
            }
        }
    }

    /// Fail every call whose deadline is at or before `now`.
    pub fn expire(&self, now: Instant) -> usize {
        let expired: Vec<Pending> = {
            let mut pending = self.pending.lock();
            let ids: Vec<CallId> = pending
                .iter()
                .filter(|(_, p)| p.deadline.map_or(false, |d| d <= now))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };

        let count = expired.len();
        for pending in expired {
            (pending.callback)(Err(RelayError::CallTimedOut));
        }
        count
    }

    /// Fail every pending callback with `ConnectionClosed`.
    pub fn close(&self) -> usize {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();

        let count = drained.len();
        for pending in drained {
            (pending.callback)(Err(RelayError::ConnectionClosed));
        }
        count
    }

    /// Handle for answering an incoming call.
    pub fn responder(&self, id: Option<CallId>) -> Responder {
        Responder {
            id,
            outbound: Arc::clone(&self.outbound),
        }
    }

    fn take(&self, id: CallId) -> Option<Pending> {
        self.pending.lock().remove(&id)
    }
}

/// Answers an incoming call. Calls without an id are never answered.
#[derive(Clone)]
pub struct Responder {
    id: Option<CallId>,
    outbound: Arc<Outbound>,
}

impl Responder {
    pub fn id(&self) -> Option<CallId> {
        self.id
    }

    /// Send a response. Returns true if a frame went out.
    pub fn respond(&self, outcome: Result<Value>) -> bool {
        let Some(id) = self.id else {
            return false;
        };

        match self.outbound.send(Frame::response(id, outcome)) {
            Ok(()) => true,
            Err(err) => {
                warn!(%id, error = %err, "response not sent");
                false
            }
        }
    }

    pub fn reject(&self, err: RelayError) -> bool {
        self.respond(Err(err))
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder").field("id", &self.id).finish()
    }
}
