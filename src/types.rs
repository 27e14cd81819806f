//! Core types shared by the relay components.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Default separator between an interface path and its trailing event name.
pub const DEFAULT_PATH_DELIMITER: char = '.';

/// Control method used to open a remote subscription.
pub const SUBSCRIBE_METHOD: &str = "subscribe";

/// Control method used to close a remote subscription.
pub const UNSUBSCRIBE_METHOD: &str = "unsubscribe";

/// Identifier of an outbound call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Debug for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallId({})", self.0)
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token identifying one handler registered through `Relay::subscribe`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({})", self.0)
    }
}

/// Token identifying a listener attached to an emitter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Event handler invoked with the emitted arguments.
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Registry key: the interface a subscription lives on and the event name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub interface: String,
    pub event: String,
}

impl SubscriptionKey {
    pub fn new(interface: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            event: event.into(),
        }
    }

    /// True if the key addresses the root interface.
    pub fn is_root(&self) -> bool {
        self.interface.is_empty()
    }
}
