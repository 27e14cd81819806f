//! Wraparound-aware sequence numbers for subscribe control messages.
//!
//! Every outbound `subscribe`/`unsubscribe` is tagged with the next local
//! sequence number. The receiving side only acts on a control message whose
//! number is ahead of the last one it accepted, so a reordered or duplicated
//! message cannot resurrect or kill a subscription after the fact.
//!
//! "Ahead" is decided over a half-range window: a value is accepted if it is
//! greater than the cursor, or if it is smaller by more than half the `u32`
//! range (the sender wrapped past `u32::MAX`). Exactly at the half-range
//! boundary the window admits a value that a strict serial-number comparison
//! would reject; that tolerance is part of the protocol and is kept as is.

use serde_json::Value;

/// `round(u32::MAX / 2)`.
pub const HALF_RANGE: i64 = 1 << 31;

/// Local generator plus remote acceptance cursor.
#[derive(Clone, Debug)]
pub struct SequenceGuard {
    local: u32,
    remote: Option<u32>,
}

impl SequenceGuard {
    /// Create a guard with a random local starting point.
    pub fn new() -> Self {
        Self::with_local_seed(rand::random())
    }

    /// Create a guard whose first generated number is `seed + 1`.
    pub fn with_local_seed(seed: u32) -> Self {
        Self {
            local: seed,
            remote: None,
        }
    }

    /// Generate the next local sequence number, wrapping to 0 past `u32::MAX`.
    pub fn next_local(&mut self) -> u32 {
        self.local = self.local.wrapping_add(1);
        self.local
    }

    /// Validate an incoming sequence number, advancing the cursor on success.
    ///
    /// Rejected values leave the cursor untouched.
    pub fn accept_remote(&mut self, i: u32) -> bool {
        let accepted = match self.remote {
            None => true,
            Some(cursor) => cursor < i || i64::from(cursor) - HALF_RANGE > i64::from(i),
        };

        if accepted {
            self.remote = Some(i);
        }
        accepted
    }

    /// Forget the remote cursor (connection closed).
    pub fn reset_remote(&mut self) {
        self.remote = None;
    }

    /// Last accepted remote value.
    pub fn remote_cursor(&self) -> Option<u32> {
        self.remote
    }
}

impl Default for SequenceGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a sequence number off the wire.
///
/// Anything other than a non-negative integer that fits in `u32` is not a
/// valid sequence number.
pub fn parse_sequence(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|n| u32::try_from(n).ok())
}
