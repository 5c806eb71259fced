//! Client for the external coding agent.
//!
//! Spawns the agent CLI as a subprocess, writes the user message to its
//! stdin, and folds the NDJSON event stream into a final response while
//! forwarding each event to the caller. The subprocess owns any MCP
//! servers named in the config it is given; this client only owns the
//! agent process itself.

pub mod cancel;
pub mod event;
pub mod stream;

use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

pub use cancel::CancelToken;
pub use event::{AgentEvent, EventParseError, ResultEvent, TokenUsage};
use stream::NdjsonReader;

/// Default agent binary; overridable through tool config.
pub const DEFAULT_AGENT_BINARY: &str = "claude";

/// Errors from one agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to spawn agent '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write agent stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("agent stream failed: {0}")]
    Stream(#[source] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] EventParseError),

    #[error("agent exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    #[error("agent reported an error: {0}")]
    AgentReported(String),

    #[error("cancelled")]
    Cancelled,
}

/// One agent invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentRequest {
    /// User message written to stdin.
    pub message: String,

    /// Replacement system prompt.
    pub system_prompt: Option<String>,

    /// Appended system prompt; composes with workspace memory files the
    /// agent discovers on its own.
    pub append_system_prompt: Option<String>,

    /// Session to resume, from a previous response.
    pub resume_session: Option<String>,

    pub model: Option<String>,

    pub max_turns: u32,

    /// MCP server config file for this invocation.
    pub mcp_config: Option<PathBuf>,

    /// Tool allowlist; empty means the agent default.
    pub allowed_tools: Vec<String>,

    /// Image attachments, referenced by absolute path in the rewritten
    /// message.
    pub images: Vec<PathBuf>,

    /// Working directory for the agent (the project workspace).
    pub workdir: Option<PathBuf>,
}

impl AgentRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            max_turns: 16,
            ..Default::default()
        }
    }

    /// The message as sent: image references first, then the text.
    fn rendered_message(&self) -> String {
        if self.images.is_empty() {
            return self.message.clone();
        }
        let mut out = String::from("Attached images (read them before answering):\n");
        for (i, image) in self.images.iter().enumerate() {
            out.push_str(&format!("[Image {}: {}]\n", i + 1, image.display()));
        }
        out.push('\n');
        out.push_str(&self.message);
        out
    }
}

/// Final state of an invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// Response text: the result event's text, or the accumulated stream
    /// text when the result event carried none.
    pub result: String,

    pub session_id: Option<String>,

    pub total_cost_usd: f64,

    pub usage: TokenUsage,
}

/// The seam the pipeline drives. The production implementation spawns the
/// agent CLI; tests substitute a scripted mock.
pub trait CodingAgent {
    fn generate_streaming(
        &self,
        request: &AgentRequest,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentResponse, AgentError>;
}

/// Streaming-state accumulator, factored out so the replace-then-resume
/// semantics are testable without a subprocess.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    session_id: Option<String>,
    result: Option<ResultEvent>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::SessionStarted { session_id } => {
                self.session_id = Some(session_id.clone());
            }
            AgentEvent::TextDelta { text } => self.text.push_str(text),
            // A full message is authoritative: replace, then keep
            // accumulating subsequent deltas on top of it.
            AgentEvent::AssistantText { text } => {
                self.text = text.clone();
            }
            AgentEvent::ToolUse { .. } => {}
            AgentEvent::Completed(result) => {
                if self.session_id.is_none() {
                    self.session_id = result.session_id.clone();
                }
                self.result = Some(result.clone());
            }
        }
    }

    /// Fold into the final response. A missing result event degrades to
    /// the accumulated text with zero cost rather than failing the turn.
    pub fn finish(self) -> Result<AgentResponse, AgentError> {
        let session_id = self.session_id;
        match self.result {
            Some(result) => {
                if result.is_error {
                    let message = result.result.unwrap_or_else(|| self.text.clone());
                    return Err(AgentError::AgentReported(message));
                }
                Ok(AgentResponse {
                    result: result.result.unwrap_or(self.text),
                    session_id,
                    total_cost_usd: result.total_cost_usd,
                    usage: result.usage,
                })
            }
            None => Ok(AgentResponse {
                result: self.text,
                session_id,
                total_cost_usd: 0.0,
                usage: TokenUsage::default(),
            }),
        }
    }
}

/// Drives the agent CLI over stdio.
pub struct ClaudeCli {
    binary: String,
    cancel: CancelToken,
}

impl ClaudeCli {
    pub fn new(binary: impl Into<String>, cancel: CancelToken) -> Self {
        Self {
            binary: binary.into(),
            cancel,
        }
    }

    fn build_command(&self, request: &AgentRequest) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-p")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--include-partial-messages")
            .arg("--max-turns")
            .arg(request.max_turns.to_string());

        if let Some(ref system_prompt) = request.system_prompt {
            cmd.arg("--system-prompt").arg(system_prompt);
        }
        if let Some(ref append) = request.append_system_prompt {
            cmd.arg("--append-system-prompt").arg(append);
        }
        if let Some(ref session) = request.resume_session {
            cmd.arg("--resume").arg(session);
        }
        if let Some(ref model) = request.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(ref mcp_config) = request.mcp_config {
            cmd.arg("--mcp-config").arg(mcp_config);
        }
        if !request.allowed_tools.is_empty() {
            cmd.arg("--allowedTools");
            for tool in &request.allowed_tools {
                cmd.arg(tool);
            }
        }
        if let Some(ref workdir) = request.workdir {
            cmd.current_dir(workdir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn kill_quietly(child: &mut Child) {
        let _ = child.kill();
        let _ = child.wait();
    }
}

impl CodingAgent for ClaudeCli {
    fn generate_streaming(
        &self,
        request: &AgentRequest,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentResponse, AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let mut cmd = self.build_command(request);
        log::debug!("spawning agent: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|source| AgentError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        // Stdin closes once the message is written; the agent treats EOF
        // as end of user input.
        {
            let mut stdin = child.stdin.take().expect("stdin was piped");
            stdin
                .write_all(request.rendered_message().as_bytes())
                .map_err(AgentError::Stdin)?;
        }

        // Drain stderr on a side thread so a chatty agent cannot fill the
        // pipe and deadlock the event loop.
        let stderr = child.stderr.take().expect("stderr was piped");
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = String::new();
            let mut stderr = stderr;
            let _ = stderr.read_to_string(&mut buf);
            buf
        });

        let stdout = child.stdout.take().expect("stdout was piped");
        let mut reader = NdjsonReader::new(BufReader::new(stdout));
        let mut accumulator = ResponseAccumulator::new();

        loop {
            if self.cancel.is_cancelled() {
                Self::kill_quietly(&mut child);
                let _ = stderr_thread.join();
                return Err(AgentError::Cancelled);
            }

            let line = match reader.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    Self::kill_quietly(&mut child);
                    let _ = stderr_thread.join();
                    return Err(AgentError::Stream(e));
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let events = match event::parse_line(&line) {
                Ok(events) => events,
                Err(e) => {
                    // Protocol skew is fatal; do not leave the child running.
                    Self::kill_quietly(&mut child);
                    let _ = stderr_thread.join();
                    return Err(e.into());
                }
            };
            for agent_event in events {
                accumulator.observe(&agent_event);
                on_event(&agent_event);
            }
        }

        let status = child.wait().map_err(AgentError::Stream)?;
        let stderr_output = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            return Err(AgentError::NonZeroExit {
                status: status.to_string(),
                stderr: stderr_output.trim().to_string(),
            });
        }

        accumulator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(text: &str) -> AgentEvent {
        AgentEvent::TextDelta {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_accumulator_concatenates_deltas() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&delta("Hel"));
        acc.observe(&delta("lo"));
        let response = acc.finish().unwrap();
        assert_eq!(response.result, "Hello");
    }

    #[test]
    fn test_full_message_replaces_then_accumulation_resumes() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&delta("Hel"));
        acc.observe(&AgentEvent::AssistantText {
            text: "Hello there.".to_string(),
        });
        acc.observe(&delta(" And more."));
        let response = acc.finish().unwrap();
        assert_eq!(response.result, "Hello there. And more.");
    }

    #[test]
    fn test_result_event_text_wins() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&delta("partial"));
        acc.observe(&AgentEvent::Completed(ResultEvent {
            result: Some("final".to_string()),
            total_cost_usd: 0.25,
            ..Default::default()
        }));
        let response = acc.finish().unwrap();
        assert_eq!(response.result, "final");
        assert!((response.total_cost_usd - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_result_event_degrades_to_accumulated_text() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&AgentEvent::SessionStarted {
            session_id: "s-1".to_string(),
        });
        acc.observe(&delta("all I got"));
        let response = acc.finish().unwrap();
        assert_eq!(response.result, "all I got");
        assert_eq!(response.session_id.as_deref(), Some("s-1"));
        assert_eq!(response.total_cost_usd, 0.0);
    }

    #[test]
    fn test_is_error_result_becomes_typed_error() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&AgentEvent::Completed(ResultEvent {
            result: Some("rate limited".to_string()),
            is_error: true,
            ..Default::default()
        }));
        match acc.finish() {
            Err(AgentError::AgentReported(message)) => assert_eq!(message, "rate limited"),
            other => panic!("expected AgentReported, got {:?}", other),
        }
    }

    #[test]
    fn test_session_id_from_init_preferred_over_result() {
        let mut acc = ResponseAccumulator::new();
        acc.observe(&AgentEvent::SessionStarted {
            session_id: "init-id".to_string(),
        });
        acc.observe(&AgentEvent::Completed(ResultEvent {
            session_id: Some("result-id".to_string()),
            ..Default::default()
        }));
        let response = acc.finish().unwrap();
        assert_eq!(response.session_id.as_deref(), Some("init-id"));
    }

    #[test]
    fn test_image_message_rewrite() {
        let mut request = AgentRequest::new("What does this mock show?");
        request.images = vec![PathBuf::from("/tmp/mock.png")];
        let rendered = request.rendered_message();
        assert!(rendered.starts_with("Attached images"));
        assert!(rendered.contains("[Image 1: /tmp/mock.png]"));
        assert!(rendered.ends_with("What does this mock show?"));
    }

    #[test]
    fn test_command_arguments() {
        let cli = ClaudeCli::new("claude", CancelToken::new());
        let mut request = AgentRequest::new("hello");
        request.max_turns = 40;
        request.resume_session = Some("sess-9".to_string());
        request.model = Some("opus".to_string());
        request.allowed_tools = vec!["Write".to_string(), "Edit".to_string()];
        let cmd = cli.build_command(&request);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert!(args.contains(&"--output-format".to_string()));
        assert!(args.contains(&"stream-json".to_string()));
        assert!(args.contains(&"--include-partial-messages".to_string()));
        assert!(args.contains(&"--resume".to_string()));
        assert!(args.contains(&"sess-9".to_string()));
        assert!(args.contains(&"--max-turns".to_string()));
        assert!(args.contains(&"40".to_string()));
        assert!(args.contains(&"--allowedTools".to_string()));
        assert!(args.contains(&"Edit".to_string()));
    }
}
