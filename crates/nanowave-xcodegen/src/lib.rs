//! XcodeGen MCP server for nanowave.
//!
//! A stdio JSON-RPC server the coding agent drives to mutate project
//! configuration through a typed tool surface. Every mutation flows
//! through `project_config.json`, is re-emitted as `project.yml`, and the
//! external `xcodegen` binary regenerates the Xcode project. The server
//! exclusively owns `project_config.json` in its working directory while
//! it runs.

pub mod config;
pub mod emitter;
pub mod generator;
pub mod handlers;
pub mod scaffold;
pub mod server;

pub use config::{
    BuildSetting, ConfigError, Entitlement, ExtensionConfig, PackageDependency, Permission,
    ProjectConfig, PROJECT_CONFIG_FILE,
};
pub use emitter::{emit_project_yaml, EmitError};
pub use generator::{GenerateError, ProjectGenerator, XcodegenCli};
pub use server::{McpServer, ServerError};
