//! Event-emitting interface nodes and the tree that addresses them.
//!
//! The relay never owns an interface node. Nodes are attached and removed by
//! the application; the relay only attaches forwarding listeners to them for
//! as long as a peer is subscribed.

mod emitter;
mod tree;

pub use emitter::{Emitter, EventEmitter};
pub use tree::InterfaceTree;
