//! Subscription bookkeeping for both directions of the relay.
//!
//! - [`LocalRegistry`]: events this peer forwards because the other peer
//!   subscribed to them. One forwarding listener per (interface, event).
//! - [`RemoteRegistry`]: events this peer receives because it subscribed on
//!   the other peer. Any number of local handlers share one remote
//!   subscription per (interface, event).
//!
//! # Example
//!
//! ```ignore
//! let handle = relay.subscribe("sensors.temperature", |args| {
//!     println!("reading: {:?}", args);
//! });
//!
//! match handle.recv_timeout(Duration::from_secs(1)) {
//!     Ok(SubscriptionStatus::Active) => println!("subscribed"),
//!     Ok(SubscriptionStatus::Closed(err)) => println!("failed: {}", err),
//!     Err(_) => println!("no answer yet"),
//! }
//!
//! relay.unsubscribe("sensors.temperature", handle.handler);
//! ```

mod local;
mod remote;
mod types;

pub use local::{LocalRegistry, LocalSubscription};
pub use remote::{RemoteRegistry, RemoteSubscription, Unsubscribed};
pub use types::{SubscriptionHandle, SubscriptionState, SubscriptionStatus};
