//! Subscriptions the peer holds on our interfaces.

use crate::engine::Responder;
use crate::error::{RelayError, Result};
use crate::interfaces::{EventEmitter, InterfaceTree};
use crate::path::PathResolver;
use crate::types::{CallId, Listener, ListenerId, SubscriptionKey};
use std::collections::HashMap;
use tracing::debug;

/// A forwarding listener attached on behalf of the peer.
#[derive(Debug)]
pub struct LocalSubscription {
    event: String,
    listener: ListenerId,
    /// Id of the `subscribe` call that created this subscription.
    call_id: CallId,
    /// Answers that `subscribe` call, including after it succeeded.
    responder: Responder,
}

impl LocalSubscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Tell the peer the subscription is gone.
    pub fn close(self, err: RelayError) -> bool {
        self.responder.reject(err)
    }
}

/// Local subscriptions grouped by interface path, then event name.
pub struct LocalRegistry {
    resolver: PathResolver,
    interfaces: HashMap<String, HashMap<String, LocalSubscription>>,
}

impl LocalRegistry {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            interfaces: HashMap::new(),
        }
    }

    /// Attach `forward` to the interface `path` names.
    ///
    /// Fails with `InterfaceNotFound` if the interface is missing and with
    /// `SubscriptionExists` (carrying the existing call id) if the event is
    /// already forwarded. Nothing is attached on failure.
    pub fn attach(
        &mut self,
        tree: &InterfaceTree,
        path: &str,
        responder: Responder,
        forward: Listener,
    ) -> Result<&LocalSubscription> {
        let call_id = responder
            .id()
            .ok_or_else(|| RelayError::InvalidParams("subscribe without call id".into()))?;

        let SubscriptionKey { interface, event } = self.resolver.resolve(path);
        let node = self
            .resolver
            .lookup(tree, &interface)
            .ok_or_else(|| RelayError::InterfaceNotFound(path.to_string()))?;

        let events = self.interfaces.entry(interface).or_default();
        if let Some(existing) = events.get(&event) {
            return Err(RelayError::SubscriptionExists {
                existing_callback_id: existing.call_id,
            });
        }

        let listener = node.on(&event, forward);
        debug!(path, %call_id, "forwarding attached");

        let subscription = LocalSubscription {
            event: event.clone(),
            listener,
            call_id,
            responder,
        };
        Ok(events.entry(event).or_insert(subscription))
    }

    /// Remove the subscription for `path` and its listener. No-op if absent.
    pub fn detach(&mut self, tree: &InterfaceTree, path: &str) -> Option<LocalSubscription> {
        let SubscriptionKey { interface, event } = self.resolver.resolve(path);

        let events = self.interfaces.get_mut(&interface)?;
        let subscription = events.remove(&event)?;
        if events.is_empty() {
            self.interfaces.remove(&interface);
        }

        if let Some(node) = tree.get(&interface) {
            node.remove_listener(&event, subscription.listener);
        }
        debug!(path, call_id = %subscription.call_id, "forwarding detached");
        Some(subscription)
    }

    /// Remove every subscription on `interface`.
    ///
    /// Listeners are detached from `node` when it is still reachable. The
    /// caller closes the returned subscriptions.
    pub fn evict_interface(
        &mut self,
        interface: &str,
        node: Option<&dyn EventEmitter>,
    ) -> Vec<LocalSubscription> {
        let Some(events) = self.interfaces.remove(interface) else {
            return Vec::new();
        };

        let evicted: Vec<LocalSubscription> = events.into_values().collect();
        if let Some(node) = node {
            for subscription in &evicted {
                node.remove_listener(&subscription.event, subscription.listener);
            }
        }
        debug!(interface, count = evicted.len(), "interface subscriptions evicted");
        evicted
    }

    /// Remove everything, detaching from whatever nodes are still in `tree`.
    pub fn drain(&mut self, tree: &InterfaceTree) -> Vec<LocalSubscription> {
        let interfaces: Vec<String> = self.interfaces.keys().cloned().collect();
        let mut drained = Vec::new();
        for interface in interfaces {
            let node = tree.get(&interface);
            drained.extend(self.evict_interface(&interface, node.as_deref()));
        }
        drained
    }

    pub fn contains(&self, path: &str) -> bool {
        let (interface, event) = self.resolver.split(path);
        self.interfaces
            .get(interface)
            .map_or(false, |events| events.contains_key(event))
    }

    pub fn len(&self) -> usize {
        self.interfaces.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
