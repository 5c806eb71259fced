//! JSON-RPC error object and the code registry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable JSON-RPC error codes.
///
/// The -32xxx range is reserved by the JSON-RPC spec; tool-level failures
/// are reported inside a successful `tools/call` result (`is_error: true`),
/// not as protocol errors, so the agent can read and react to them.
pub mod error_codes {
    /// Malformed JSON on the wire.
    pub const PARSE_ERROR: i64 = -32700;
    /// Structurally valid JSON that is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Unknown method name.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Params failed validation against the method signature.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Server-side failure while handling a valid request.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// JSON-RPC error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Code from the registry above.
    pub code: i64,
    /// Single-line, human-readable message.
    pub message: String,
    /// Optional machine-readable details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i64, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Malformed JSON on the wire.
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::new(error_codes::PARSE_ERROR, detail)
    }

    /// Not a valid request object.
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_REQUEST, detail)
    }

    /// Unknown method.
    pub fn method_not_found(method: &str) -> Self {
        Self::with_data(
            error_codes::METHOD_NOT_FOUND,
            format!("method not found: {}", method),
            serde_json::json!({ "method": method }),
        )
    }

    /// Params failed validation.
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, detail)
    }

    /// Server-side failure.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, detail)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for JsonRpcError {}
