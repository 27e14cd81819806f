//! Frames exchanged between two peers.

use crate::error::{RelayError, Result, RpcError};
use crate::types::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A call (with or without an id) or a response to one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A call expecting a response when `id` is set, a notification otherwise.
    Call {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<CallId>,
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },

    /// Outcome of a call. Exactly one of `result` and `error` is meaningful.
    Response {
        id: CallId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<RpcError>,
    },
}

impl Frame {
    pub fn call(id: CallId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Frame::Call {
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Frame::Call {
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn response(id: CallId, outcome: Result<Value>) -> Self {
        match outcome {
            Ok(value) => Frame::Response {
                id,
                result: Some(value),
                error: None,
            },
            Err(err) => Frame::Response {
                id,
                result: None,
                error: Some(err.to_wire()),
            },
        }
    }

    /// Method name of a call frame.
    pub fn method(&self) -> Option<&str> {
        match self {
            Frame::Call { method, .. } => Some(method),
            Frame::Response { .. } => None,
        }
    }

    /// Decode the outcome carried by a response.
    pub(crate) fn into_outcome(result: Option<Value>, error: Option<RpcError>) -> Result<Value> {
        match error {
            Some(err) => Err(RelayError::from_wire(err)),
            None => Ok(result.unwrap_or(Value::Null)),
        }
    }
}
