//! MCP tool-surface types: initialize handshake, tool listing, tool calls.

use serde::{Deserialize, Serialize};

/// A tool the server exposes, with its JSON-schema input contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name the agent invokes, e.g. "add_permission".
    pub name: String,

    /// What the tool does and when to use it.
    pub description: String,

    /// JSON schema for the arguments object.
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<ToolDefinition>,
}

/// Params of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name from the listing.
    pub name: String,

    /// Arguments object; defaults to empty.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One content block of a tool result. The server only emits text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
}

/// Result of `tools/call`.
///
/// Tool-level failures set `is_error` so the agent can read the message and
/// retry with corrected inputs; they are not JSON-RPC protocol errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ToolContent>,

    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful text result.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: false,
        }
    }

    /// A tool-level error the agent should read and correct.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Advertised server capabilities. Only `tools` is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
}

/// Server identity reported during initialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// Result of `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    pub capabilities: ServerCapabilities,

    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

impl InitializeResult {
    pub fn new(server_name: &str, server_version: &str) -> Self {
        Self {
            protocol_version: crate::MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(serde_json::json!({})),
            },
            server_info: ServerInfo {
                name: server_name.to_string(),
                version: server_version.to_string(),
            },
        }
    }
}
