//! Error types for the relay.

use crate::types::CallId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Code sent when a subscribe targets an interface that does not exist.
pub const INTERFACE_NOT_FOUND: i64 = -32000;
/// Code sent when a subscribe races an already active subscription.
pub const SUBSCRIPTION_EXISTS: i64 = -32001;
/// Code sent when the interface backing a subscription goes away.
pub const INTERFACE_REMOVED: i64 = -32002;
pub const CALL_TIMED_OUT: i64 = -32003;
pub const CONNECTION_CLOSED: i64 = -32004;
pub const TRANSPORT_ERROR: i64 = -32005;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

/// Main error type for relay operations.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RelayError {
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Subscription exists (call {existing_callback_id})")]
    SubscriptionExists { existing_callback_id: CallId },

    #[error("Interface was removed")]
    InterfaceRemoved,

    #[error("Call timed out")]
    CallTimedOut,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },
}

impl RelayError {
    /// Numeric code carried on the wire.
    pub fn code(&self) -> i64 {
        match self {
            RelayError::InterfaceNotFound(_) => INTERFACE_NOT_FOUND,
            RelayError::SubscriptionExists { .. } => SUBSCRIPTION_EXISTS,
            RelayError::InterfaceRemoved => INTERFACE_REMOVED,
            RelayError::CallTimedOut => CALL_TIMED_OUT,
            RelayError::ConnectionClosed => CONNECTION_CLOSED,
            RelayError::Transport(_) => TRANSPORT_ERROR,
            RelayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RelayError::InvalidParams(_) => INVALID_PARAMS,
            RelayError::Remote { code, .. } => *code,
        }
    }

    /// Encode for a response frame.
    pub fn to_wire(&self) -> RpcError {
        let data = match self {
            RelayError::InterfaceNotFound(path) => Some(json!({ "path": path })),
            RelayError::SubscriptionExists {
                existing_callback_id,
            } => Some(json!({ "existingCallbackId": existing_callback_id })),
            RelayError::Transport(msg) | RelayError::InvalidParams(msg) => {
                Some(json!({ "detail": msg }))
            }
            RelayError::MethodNotFound(method) => Some(json!({ "method": method })),
            RelayError::Remote { data, .. } => data.clone(),
            _ => None,
        };

        let message = match self {
            RelayError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        };

        RpcError {
            code: self.code(),
            message,
            data,
        }
    }

    /// Decode an error received from the peer.
    ///
    /// Unknown codes, and known codes whose payload is malformed, are kept
    /// verbatim as [`RelayError::Remote`].
    pub fn from_wire(err: RpcError) -> Self {
        let field = |name: &str| -> Option<Value> { err.data.as_ref()?.get(name).cloned() };
        let text = |name: &str| field(name).and_then(|v| v.as_str().map(str::to_string));

        let decoded = match err.code {
            INTERFACE_NOT_FOUND => Some(RelayError::InterfaceNotFound(
                text("path").unwrap_or_default(),
            )),
            SUBSCRIPTION_EXISTS => field("existingCallbackId")
                .and_then(|v| v.as_u64())
                .map(|id| RelayError::SubscriptionExists {
                    existing_callback_id: CallId(id),
                }),
            INTERFACE_REMOVED => Some(RelayError::InterfaceRemoved),
            CALL_TIMED_OUT => Some(RelayError::CallTimedOut),
            CONNECTION_CLOSED => Some(RelayError::ConnectionClosed),
            TRANSPORT_ERROR => Some(RelayError::Transport(text("detail").unwrap_or_default())),
            METHOD_NOT_FOUND => Some(RelayError::MethodNotFound(
                text("method").unwrap_or_default(),
            )),
            INVALID_PARAMS => Some(RelayError::InvalidParams(
                text("detail").unwrap_or_default(),
            )),
            _ => None,
        };

        decoded.unwrap_or(RelayError::Remote {
            code: err.code,
            message: err.message,
            data: err.data,
        })
    }
}

/// Error object as carried in a response frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::InvalidParams(e.to_string())
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
