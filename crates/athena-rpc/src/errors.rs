//! RPC error codes and error type.

use crate::types::RpcErrorBody;

// ── Error code constants (JSON-RPC 2.0) ─────────────────────────────

/// Method not found in the registry.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Unexpected internal error.
pub const INTERNAL_ERROR: i32 = -32603;

/// RPC error type returned by handlers and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// No handler is registered under this name.
    #[error("Method not found: {method}")]
    MethodNotFound {
        /// The requested method.
        method: String,
    },

    /// A parameter is present but has the wrong type or shape.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// Internal failure (including handler timeout).
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },

    /// Application-defined error with an arbitrary code.
    #[error("{message}")]
    Custom {
        /// Numeric code outside the reserved range.
        code: i32,
        /// Human-readable message.
        message: String,
        /// Optional structured details.
        data: Option<serde_json::Value>,
    },
}

impl RpcError {
    /// Numeric error code for this variant.
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound { .. } => METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Internal { .. } => INTERNAL_ERROR,
            Self::Custom { code, .. } => *code,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MethodNotFound { .. } => "method_not_found",
            Self::InvalidParams { .. } => "invalid_params",
            Self::Internal { .. } => "internal",
            Self::Custom { .. } => "custom",
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code(),
            message: self.to_string(),
            data: match self {
                Self::Custom { data, .. } => data.clone(),
                _ => None,
            },
        }
    }
}
