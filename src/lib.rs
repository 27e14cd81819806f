//! # Event Relay
//!
//! Bidirectional event subscriptions between two peers over a
//! request/response call channel.
//!
//! ## Core Concepts
//!
//! - **Interfaces**: Event emitters attached at dotted paths, owned by the application
//! - **Subscriptions**: A peer subscribes to `interface.event`; the other peer forwards
//!   every emission back as a call
//! - **Multiplexing**: Any number of local handlers share one remote subscription
//! - **Ordering**: Control messages carry wraparound-safe sequence numbers, so
//!   reordered or duplicated ones are dropped
//! - **Teardown**: Removing an interface or closing the connection closes every
//!   affected subscription on both sides
//!
//! ## Example
//!
//! ```ignore
//! use event_relay::{channel_pair, Relay, RelayConfig, SubscriptionStatus};
//!
//! let (a_link, b_link) = channel_pair();
//! let a = Relay::with_transport(RelayConfig::default(), a_link.transport.clone());
//! let b = Relay::with_transport(RelayConfig::default(), b_link.transport.clone());
//!
//! let handle = b.subscribe("event", |args| println!("got {:?}", args));
//! a.pump(&a_link.inbox);
//! b.pump(&b_link.inbox);
//! assert_eq!(handle.try_recv()?, SubscriptionStatus::Active);
//!
//! a.root().unwrap().emit("event", &[json!(42)]);
//! b.pump(&b_link.inbox);
//! ```

pub mod engine;
pub mod error;
pub mod interfaces;
pub mod path;
pub mod relay;
pub mod sequence;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use engine::{channel_pair, ChannelTransport, Frame, Link, Responder, RpcEngine, Transport};
pub use error::{RelayError, Result, RpcError};
pub use interfaces::{Emitter, EventEmitter, InterfaceTree};
pub use path::PathResolver;
pub use relay::{Relay, RelayConfig};
pub use sequence::SequenceGuard;
pub use subscriptions::{
    LocalRegistry, LocalSubscription, RemoteRegistry, RemoteSubscription, SubscriptionHandle,
    SubscriptionState, SubscriptionStatus, Unsubscribed,
};
pub use types::*;
