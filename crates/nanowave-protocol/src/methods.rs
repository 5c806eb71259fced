//! JSON-RPC method names understood by the server.

/// Session handshake; carries the client's protocol version.
pub const INITIALIZE: &str = "initialize";

/// Post-handshake notification; no response is sent.
pub const INITIALIZED: &str = "notifications/initialized";

/// Liveness check; echoes an empty result.
pub const PING: &str = "ping";

/// Enumerate the tool surface with input schemas.
pub const TOOLS_LIST: &str = "tools/list";

/// Invoke a tool by name with JSON arguments.
pub const TOOLS_CALL: &str = "tools/call";
