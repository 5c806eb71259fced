//! stdio JSON-RPC server loop.
//!
//! Reads one JSON-RPC message per line from stdin, dispatches, and writes
//! one response line to stdout. The agent serializes its tool calls, so
//! requests are handled strictly in order. Notifications produce no
//! output. A malformed line produces a parse-error response and the loop
//! continues; only EOF or an I/O failure ends the server.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use nanowave_protocol::{
    methods, CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult,
};

use crate::handlers::ToolHandler;

/// Fatal server errors. Tool and protocol errors are responses, not errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The MCP server: a tool handler behind the JSON-RPC loop.
pub struct McpServer {
    handler: ToolHandler,
}

impl McpServer {
    pub fn new(handler: ToolHandler) -> Self {
        Self { handler }
    }

    /// Serve stdin/stdout until EOF.
    pub fn run(&self) -> Result<(), ServerError> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run_with_io(&mut stdin.lock(), &mut stdout.lock())
    }

    /// Serve custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<(), ServerError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                return Ok(());
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    let response = JsonRpcResponse::failure(
                        None,
                        JsonRpcError::parse_error(format!("invalid JSON: {}", e)),
                    );
                    self.write_response(writer, &response)?;
                    continue;
                }
            };

            if request.is_notification() {
                log::debug!("notification: {}", request.method);
                continue;
            }

            let response = self.dispatch(&request);
            self.write_response(writer, &response)?;
        }
    }

    fn dispatch(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match request.method.as_str() {
            methods::INITIALIZE => {
                let init = InitializeResult::new("nanowave-xcodegen", env!("CARGO_PKG_VERSION"));
                match serde_json::to_value(init) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::failure(id, JsonRpcError::internal(e.to_string())),
                }
            }
            methods::PING => JsonRpcResponse::success(id, serde_json::json!({})),
            methods::TOOLS_LIST => {
                let listing = ListToolsResult {
                    tools: ToolHandler::tool_definitions(),
                };
                match serde_json::to_value(listing) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::failure(id, JsonRpcError::internal(e.to_string())),
                }
            }
            methods::TOOLS_CALL => {
                let params: CallToolParams = match request
                    .params
                    .clone()
                    .map(serde_json::from_value)
                    .transpose()
                {
                    Ok(Some(p)) => p,
                    Ok(None) => {
                        return JsonRpcResponse::failure(
                            id,
                            JsonRpcError::invalid_params("tools/call requires params"),
                        )
                    }
                    Err(e) => {
                        return JsonRpcResponse::failure(
                            id,
                            JsonRpcError::invalid_params(format!("invalid params: {}", e)),
                        )
                    }
                };

                log::debug!("tool call: {}", params.name);
                let result = self.handler.handle(&params.name, &params.arguments);
                match serde_json::to_value(result) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(e) => JsonRpcResponse::failure(id, JsonRpcError::internal(e.to_string())),
                }
            }
            other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
        }
    }

    fn write_response<W: Write>(
        &self,
        writer: &mut W,
        response: &JsonRpcResponse,
    ) -> Result<(), ServerError> {
        let json = serde_json::to_string(response)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::generator::RecordingGenerator;
    use nanowave_policy::Platform;
    use std::io::Cursor;
    use std::sync::Arc;

    fn server_in(dir: &std::path::Path) -> McpServer {
        let config = ProjectConfig::new("Habits", "com.nanowave.habits", Platform::Ios);
        config.store(dir).unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        McpServer::new(ToolHandler::new(dir, Box::new(generator)))
    }

    fn roundtrip(server: &McpServer, input: &str) -> Vec<JsonRpcResponse> {
        let mut reader = Cursor::new(input.to_string());
        let mut output = Vec::new();
        server.run_with_io(&mut reader, &mut output).unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_initialize_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{}}\n",
        );
        assert_eq!(responses.len(), 1);
        let result = responses[0].result.as_ref().unwrap();
        assert_eq!(result["serverInfo"]["name"], "nanowave-xcodegen");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[test]
    fn test_tools_list_contains_full_surface() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"tools/list\"}\n",
        );
        let tools = responses[0].result.as_ref().unwrap()["tools"]
            .as_array()
            .unwrap()
            .clone();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        for expected in [
            "add_permission",
            "add_extension",
            "add_entitlement",
            "add_localization",
            "add_package",
            "set_build_setting",
            "get_project_config",
            "regenerate_project",
        ] {
            assert!(names.contains(&expected), "missing tool {}", expected);
        }
    }

    #[test]
    fn test_tools_call_success() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {
                "name": "add_permission",
                "arguments": {
                    "key": "NSCameraUsageDescription",
                    "description": "Scan barcodes",
                },
            },
        });
        let responses = roundtrip(&server, &format!("{}\n", request));
        let result = responses[0].result.as_ref().unwrap();
        assert!(result.get("isError").is_none());
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Added permission"));
    }

    #[test]
    fn test_tool_validation_error_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::new("Movies", "com.nanowave.movies", Platform::Tvos);
        config.store(dir.path()).unwrap();
        let generator = Arc::new(RecordingGenerator::new());
        let server = McpServer::new(ToolHandler::new(dir.path(), Box::new(generator)));

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {
                "name": "add_extension",
                "arguments": { "kind": "widget", "purpose": "glance" },
            },
        });
        let responses = roundtrip(&server, &format!("{}\n", request));
        // Tool errors are carried in the result so the agent can retry.
        let result = responses[0].result.as_ref().unwrap();
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn test_notification_produces_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
        );
        assert!(responses.is_empty());
    }

    #[test]
    fn test_invalid_json_keeps_serving() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"ping\"}\n";
        let responses = roundtrip(&server, input);
        assert_eq!(responses.len(), 2);
        assert!(responses[0].is_error());
        assert!(!responses[1].is_error());
    }

    #[test]
    fn test_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_in(dir.path());
        let responses = roundtrip(
            &server,
            "{\"jsonrpc\":\"2.0\",\"id\":6,\"method\":\"tools/uninstall\"}\n",
        );
        assert!(responses[0].is_error());
    }
}
