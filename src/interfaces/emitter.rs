//! Listener bookkeeping for interface nodes.

use crate::types::{Listener, ListenerId};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Capability set the relay needs from an interface node.
pub trait EventEmitter: Send + Sync {
    /// Attach a listener for `event`.
    fn on(&self, event: &str, listener: Listener) -> ListenerId;

    /// Detach a listener. Returns false if it was not attached.
    fn remove_listener(&self, event: &str, id: ListenerId) -> bool;

    /// Invoke every listener for `event`. Returns how many were invoked.
    fn emit(&self, event: &str, args: &[Value]) -> usize;

    /// Number of listeners attached for `event`.
    fn listener_count(&self, event: &str) -> usize;
}

/// Default in-process emitter.
pub struct Emitter {
    listeners: RwLock<HashMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Total listeners across all events.
    pub fn total_listeners(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for Emitter {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .write()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(event) else {
            return false;
        };

        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;

        if list.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    fn emit(&self, event: &str, args: &[Value]) -> usize {
        // Snapshot so listeners may attach or detach while running.
        let snapshot: Vec<Listener> = match self.listeners.read().get(event) {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };

        for listener in &snapshot {
            listener(args);
        }
        snapshot.len()
    }

    fn listener_count(&self, event: &str) -> usize {
        self.listeners.read().get(event).map_or(0, Vec::len)
    }
}
