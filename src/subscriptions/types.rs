//! Subscription types shared by the registries and the relay.

use crate::error::RelayError;
use crate::types::HandlerId;
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::time::Duration;

/// Where a remote subscription is in its handshake.
///
/// A key with no registry entry is absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// `subscribe` sent, no answer yet. Further subscribers queue up.
    Establishing,
    /// The peer confirmed the subscription.
    Active,
}

/// Lifecycle notices delivered to a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum SubscriptionStatus {
    /// The remote subscription is confirmed. Sent at most once.
    Active,
    /// The subscription failed or was torn down. Sent at most once, last.
    Closed(RelayError),
}

/// Handle returned by `Relay::subscribe`.
pub struct SubscriptionHandle {
    pub path: String,
    pub handler: HandlerId,
    /// Channel carrying [`SubscriptionStatus`] notices.
    pub status: Receiver<SubscriptionStatus>,
}

impl SubscriptionHandle {
    /// Receive the next notice (blocking).
    pub fn recv(&self) -> Result<SubscriptionStatus, RecvError> {
        self.status.recv()
    }

    /// Try to receive a notice (non-blocking).
    pub fn try_recv(&self) -> Result<SubscriptionStatus, TryRecvError> {
        self.status.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<SubscriptionStatus, RecvTimeoutError> {
        self.status.recv_timeout(timeout)
    }
}
