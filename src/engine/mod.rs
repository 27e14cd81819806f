//! Minimal request/response call engine the relay drives.
//!
//! The relay only needs a handful of things from its call channel:
//! - Allocating call identifiers
//! - Sending calls and notifications through a [`Transport`]
//! - Routing responses back to the callback registered for a call id
//! - Expiring calls that never get an answer
//! - Answering incoming calls, possibly more than once per call id
//!
//! Frames are plain serde values; how they are encoded on a real wire is up
//! to the transport.

mod frame;
mod rpc;
mod transport;

pub use frame::Frame;
pub use rpc::{Responder, ResponseCallback, RpcEngine};
pub use transport::{channel_pair, ChannelTransport, Link, Transport};
