//! RPC wire-format types for the device channel.
//!
//! Inbound frames are parsed leniently into [`InboundFrame`]: devices in the
//! field send requests, notifications, and replies to gateway-pushed commands
//! over the same channel, and a malformed frame must never tear it down.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version carried by every outbound message.
pub const JSONRPC_VERSION: &str = "2.0";

/// A method call from a device.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcRequest {
    /// Method name (never empty).
    pub method: String,
    /// Raw `params` value, if present and not null.
    pub params: Option<Value>,
    /// Correlation id. `None` when absent or `null`: the call is a notification.
    pub id: Option<Value>,
}

impl RpcRequest {
    /// Build a request.
    pub fn new(method: impl Into<String>, params: Option<Value>, id: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id,
        }
    }

    /// Whether the sender expects no reply.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Classification of one decoded inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// A frame with a non-empty string `method`.
    Request(RpcRequest),
    /// A method-less frame carrying `result` or `error`: the device answering
    /// a command the gateway pushed earlier.
    Reply {
        /// Echoed correlation id.
        id: Option<Value>,
        /// The `result` value, or the `error` object.
        outcome: Value,
        /// True if the device answered with `error`.
        is_error: bool,
    },
    /// A JSON object with no usable `method` and no reply fields.
    Unrecognized(Value),
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Valid JSON, but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,
}

impl InboundFrame {
    /// Decode and classify a text frame.
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(obj) = value else {
            return Err(FrameError::NotAnObject);
        };
        Ok(Self::classify(obj))
    }

    fn classify(mut obj: Map<String, Value>) -> Self {
        let id = obj.remove("id").filter(|v| !v.is_null());

        let method = match obj.get("method") {
            Some(Value::String(m)) if !m.is_empty() => Some(m.clone()),
            _ => None,
        };

        if let Some(method) = method {
            let params = obj.remove("params").filter(|v| !v.is_null());
            return Self::Request(RpcRequest { method, params, id });
        }

        if let Some(result) = obj.remove("result") {
            return Self::Reply {
                id,
                outcome: result,
                is_error: false,
            };
        }
        if let Some(error) = obj.remove("error") {
            return Self::Reply {
                id,
                outcome: error,
                is_error: true,
            };
        }

        if let Some(id) = id {
            let _ = obj.insert("id".into(), id);
        }
        Self::Unrecognized(Value::Object(obj))
    }
}

/// Outgoing response to a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Echoed request id; serialized as `null` when unknown.
    pub id: Option<Value>,
    /// Result payload (success only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload (failure only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body inside an [`RpcResponse`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Numeric JSON-RPC error code (e.g. `-32601`).
    pub code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self::from_error_body(
            id,
            RpcErrorBody {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    /// Build an error response from a prepared body.
    pub fn from_error_body(id: Option<Value>, body: RpcErrorBody) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(body),
        }
    }

    /// Whether this is a success response.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Format a timestamp the way every reply carries it (RFC 3339, millis, `Z`).
pub fn wire_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
