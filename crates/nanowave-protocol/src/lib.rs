//! Wire types for the nanowave MCP surface.
//!
//! The xcodegen server speaks JSON-RPC 2.0 over stdio, one message per
//! line, following the model-context-protocol framing: `initialize`,
//! `tools/list`, and `tools/call`. This crate holds the envelopes, the
//! tool-surface types, and the stable error codes shared between the
//! server and its tests.

pub mod error;
pub mod methods;
pub mod rpc;
pub mod tools;

pub use error::{JsonRpcError, error_codes};
pub use rpc::{JsonRpcRequest, JsonRpcResponse, RequestId};
pub use tools::{
    CallToolParams, CallToolResult, InitializeResult, ListToolsResult, ServerCapabilities,
    ServerInfo, ToolContent, ToolDefinition,
};

/// MCP protocol revision the server implements.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
