//! nanowave-xcodegen entry point.
//!
//! Launched by the coding agent via its MCP config:
//!
//!   nanowave-xcodegen [project-dir]
//!
//! Serves the tool surface over stdio until the agent closes stdin.

use std::path::PathBuf;
use std::process;

use nanowave_xcodegen::{handlers::ToolHandler, McpServer, XcodegenCli};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let project_dir = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("nanowave-xcodegen: cannot determine working directory: {}", e);
                process::exit(1);
            }
        },
    };

    if !project_dir.is_dir() {
        eprintln!(
            "nanowave-xcodegen: not a directory: {}",
            project_dir.display()
        );
        process::exit(1);
    }

    let handler = ToolHandler::new(project_dir, Box::new(XcodegenCli));
    let server = McpServer::new(handler);

    if let Err(e) = server.run() {
        eprintln!("nanowave-xcodegen: {}", e);
        process::exit(1);
    }
}
