//! Subscriptions this peer holds on the other peer's interfaces.

use super::types::{SubscriptionState, SubscriptionStatus};
use crate::error::RelayError;
use crate::interfaces::EventEmitter;
use crate::path::PathResolver;
use crate::types::{CallId, HandlerId, Listener, ListenerId, SubscriptionKey};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use tracing::debug;

/// One local handler multiplexed onto a remote subscription.
struct HandlerEntry {
    id: HandlerId,
    handler: Listener,
    /// Dispatch registration, made once the handler may receive events.
    listener: Option<ListenerId>,
    status: Sender<SubscriptionStatus>,
}

impl HandlerEntry {
    fn register(&mut self, path: &str, dispatcher: &dyn EventEmitter) {
        if self.listener.is_none() {
            self.listener = Some(dispatcher.on(path, self.handler.clone()));
        }
    }

    fn unregister(&mut self, path: &str, dispatcher: &dyn EventEmitter) {
        if let Some(listener) = self.listener.take() {
            dispatcher.remove_listener(path, listener);
        }
    }

    fn notify(&self, status: SubscriptionStatus) {
        // A dropped or full receiver means nobody is listening.
        let _ = self.status.try_send(status);
    }
}

/// The single remote subscription backing every handler for one key.
pub struct RemoteSubscription {
    /// Call id the peer associates with this subscription.
    id: CallId,
    path: String,
    state: SubscriptionState,
    handlers: Vec<HandlerEntry>,
}

impl RemoteSubscription {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn close(mut self, err: RelayError, dispatcher: &dyn EventEmitter) -> usize {
        for entry in &mut self.handlers {
            entry.unregister(&self.path, dispatcher);
            entry.notify(SubscriptionStatus::Closed(err.clone()));
        }
        self.handlers.len()
    }
}

/// Outcome of removing a handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unsubscribed {
    /// Other handlers still use the subscription.
    Handler,
    /// That was the last handler; the subscription under this id is gone.
    Last(CallId),
}

/// Remote subscriptions keyed by (interface, event).
pub struct RemoteRegistry {
    resolver: PathResolver,
    subscriptions: HashMap<SubscriptionKey, RemoteSubscription>,
    next_handler: u64,
}

impl RemoteRegistry {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            subscriptions: HashMap::new(),
            next_handler: 1,
        }
    }

    /// Add a handler for `path`.
    ///
    /// Returns the handler id and, when no subscription existed yet, the call
    /// id of the `subscribe` the caller must now send. Handlers joining an
    /// active subscription are registered and confirmed at once; handlers
    /// joining an establishing one are registered and wait for the answer.
    pub fn subscribe(
        &mut self,
        path: &str,
        handler: Listener,
        status: Sender<SubscriptionStatus>,
        dispatcher: &dyn EventEmitter,
        new_call_id: impl FnOnce() -> CallId,
    ) -> (HandlerId, Option<CallId>) {
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;

        let mut entry = HandlerEntry {
            id,
            handler,
            listener: None,
            status,
        };

        let key = self.resolver.resolve(path);
        if let Some(subscription) = self.subscriptions.get_mut(&key) {
            entry.register(path, dispatcher);
            if subscription.state == SubscriptionState::Active {
                entry.notify(SubscriptionStatus::Active);
            }
            subscription.handlers.push(entry);
            debug!(path, handler = id.0, state = ?subscription.state, "handler joined subscription");
            return (id, None);
        }

        let call_id = new_call_id();
        self.subscriptions.insert(
            key,
            RemoteSubscription {
                id: call_id,
                path: path.to_string(),
                state: SubscriptionState::Establishing,
                handlers: vec![entry],
            },
        );
        debug!(path, %call_id, "subscription establishing");
        (id, Some(call_id))
    }

    /// Mark the subscription sent as `call_id` active under `adopted`.
    ///
    /// Returns false if the subscription is gone or belongs to another call.
    pub fn establish(
        &mut self,
        path: &str,
        call_id: CallId,
        adopted: CallId,
        dispatcher: &dyn EventEmitter,
    ) -> bool {
        let key = self.resolver.resolve(path);
        let Some(subscription) = self.subscriptions.get_mut(&key) else {
            return false;
        };
        if subscription.id != call_id {
            return false;
        }

        subscription.id = adopted;
        subscription.state = SubscriptionState::Active;
        for entry in &mut subscription.handlers {
            entry.register(&subscription.path, dispatcher);
            entry.notify(SubscriptionStatus::Active);
        }
        debug!(path, %call_id, %adopted, "subscription active");
        true
    }

    /// Drop the subscription for `path` if it is still the one under `id`,
    /// unregistering every handler and delivering `err` to each.
    ///
    /// Returns the number of handlers notified.
    pub fn teardown(
        &mut self,
        path: &str,
        id: CallId,
        err: RelayError,
        dispatcher: &dyn EventEmitter,
    ) -> usize {
        let key = self.resolver.resolve(path);
        match self.subscriptions.get(&key) {
            Some(subscription) if subscription.id == id => {}
            _ => return 0,
        }

        let Some(subscription) = self.subscriptions.remove(&key) else {
            return 0;
        };
        debug!(path, %id, error = %err, "subscription torn down");
        subscription.close(err, dispatcher)
    }

    /// Remove one handler, scanning from the most recent.
    ///
    /// Returns None if the handler is not subscribed to `path`.
    pub fn unsubscribe(
        &mut self,
        path: &str,
        handler: HandlerId,
        dispatcher: &dyn EventEmitter,
    ) -> Option<Unsubscribed> {
        let key = self.resolver.resolve(path);
        let subscription = self.subscriptions.get_mut(&key)?;

        let index = subscription.handlers.iter().rposition(|e| e.id == handler)?;
        let mut entry = subscription.handlers.remove(index);
        entry.unregister(&subscription.path, dispatcher);

        if !subscription.handlers.is_empty() {
            return Some(Unsubscribed::Handler);
        }

        let id = subscription.id;
        self.subscriptions.remove(&key);
        debug!(path, %id, "last handler gone");
        Some(Unsubscribed::Last(id))
    }

    /// Close every subscription with `err`. Returns their call ids.
    pub fn drain(&mut self, err: RelayError, dispatcher: &dyn EventEmitter) -> Vec<CallId> {
        self.subscriptions
            .drain()
            .map(|(_, subscription)| {
                let id = subscription.id;
                subscription.close(err.clone(), dispatcher);
                id
            })
            .collect()
    }

    pub fn get(&self, path: &str) -> Option<&RemoteSubscription> {
        self.subscriptions.get(&self.resolver.resolve(path))
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
