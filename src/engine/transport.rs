//! Outbound frame delivery.

use super::Frame;
use crate::error::{RelayError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;

/// Sends frames to the peer.
///
/// Implementations should queue rather than deliver synchronously into the
/// peer's `receive`; the relay may be sending from inside a listener.
pub trait Transport: Send + Sync {
    fn send(&self, frame: Frame) -> Result<()>;
}

/// In-memory transport backed by a crossbeam channel.
#[derive(Clone)]
pub struct ChannelTransport {
    sender: Sender<Frame>,
}

impl ChannelTransport {
    pub fn new(sender: Sender<Frame>) -> Self {
        Self { sender }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, frame: Frame) -> Result<()> {
        self.sender
            .send(frame)
            .map_err(|_| RelayError::Transport("peer inbox disconnected".into()))
    }
}

/// One end of an in-memory link: where to send, and what has arrived.
pub struct Link {
    pub transport: Arc<ChannelTransport>,
    pub inbox: Receiver<Frame>,
}

impl Link {
    /// Frames waiting in the inbox, in arrival order.
    pub fn drain(&self) -> Vec<Frame> {
        self.inbox.try_iter().collect()
    }
}

/// Two connected link ends.
pub fn channel_pair() -> (Link, Link) {
    let (to_a, a_inbox) = unbounded();
    let (to_b, b_inbox) = unbounded();

    let a = Link {
        transport: Arc::new(ChannelTransport::new(to_b)),
        inbox: a_inbox,
    };
    let b = Link {
        transport: Arc::new(ChannelTransport::new(to_a)),
        inbox: b_inbox,
    };
    (a, b)
}
