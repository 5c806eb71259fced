//! Typed view of the agent's NDJSON event stream.
//!
//! The wire protocol (one JSON object per line):
//! - `system` / `init` announces the session id.
//! - `stream_event` wraps Anthropic streaming events; only
//!   `content_block_delta` with a `text_delta` matters here.
//! - `assistant` carries a complete message; its text is authoritative
//!   and replaces whatever deltas accumulated so far. Tool invocations
//!   arrive as `tool_use` blocks of the same message.
//! - `result` closes the turn with the assembled text, cost, and token
//!   usage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token usage reported on the result event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,

    #[serde(default)]
    pub output_tokens: u64,

    #[serde(default)]
    pub cache_read_input_tokens: u64,

    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
    }
}

/// Final event of a turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultEvent {
    /// Assembled response text, when the agent provides one.
    pub result: Option<String>,

    pub total_cost_usd: f64,

    pub usage: TokenUsage,

    pub is_error: bool,

    pub session_id: Option<String>,
}

/// One semantic event from the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// `system/init`: the session is live and resumable under this id.
    SessionStarted { session_id: String },

    /// Token-level text increment.
    TextDelta { text: String },

    /// Full assistant message text; replaces accumulated deltas.
    AssistantText { text: String },

    /// The assistant invoked a tool.
    ToolUse {
        name: String,
        input: serde_json::Value,
    },

    /// Terminal event carrying cost and usage.
    Completed(ResultEvent),
}

/// Errors decoding a stream line. Any invalid JSON is protocol skew and
/// fails the whole stream.
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("invalid JSON in stream: {source}; line starts: {prefix}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        prefix: String,
    },
}

/// Parse one NDJSON line into zero or more events.
///
/// Unknown event types parse successfully and produce nothing; new event
/// kinds appearing upstream must not break existing pipelines.
pub fn parse_line(line: &str) -> Result<Vec<AgentEvent>, EventParseError> {
    let value: serde_json::Value =
        serde_json::from_str(line).map_err(|source| EventParseError::InvalidJson {
            source,
            prefix: line.chars().take(120).collect(),
        })?;

    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("");
    match kind {
        "system" => {
            let subtype = value.get("subtype").and_then(|s| s.as_str()).unwrap_or("");
            if subtype != "init" {
                return Ok(Vec::new());
            }
            match value.get("session_id").and_then(|s| s.as_str()) {
                Some(session_id) => Ok(vec![AgentEvent::SessionStarted {
                    session_id: session_id.to_string(),
                }]),
                None => Ok(Vec::new()),
            }
        }
        "stream_event" => {
            let delta = value
                .get("event")
                .filter(|e| e.get("type").and_then(|t| t.as_str()) == Some("content_block_delta"))
                .and_then(|e| e.get("delta"));
            match delta {
                Some(delta)
                    if delta.get("type").and_then(|t| t.as_str()) == Some("text_delta") =>
                {
                    let text = delta
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default();
                    Ok(vec![AgentEvent::TextDelta {
                        text: text.to_string(),
                    }])
                }
                _ => Ok(Vec::new()),
            }
        }
        "assistant" => {
            let blocks = value
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_array())
                .cloned()
                .unwrap_or_default();

            let mut events = Vec::new();
            let mut text = String::new();
            for block in &blocks {
                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                            text.push_str(t);
                        }
                    }
                    Some("tool_use") => {
                        events.push(AgentEvent::ToolUse {
                            name: block
                                .get("name")
                                .and_then(|n| n.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            input: block.get("input").cloned().unwrap_or_default(),
                        });
                    }
                    _ => {}
                }
            }
            if !text.is_empty() {
                events.insert(0, AgentEvent::AssistantText { text });
            }
            Ok(events)
        }
        "result" => {
            let usage = value
                .get("usage")
                .map(|u| serde_json::from_value(u.clone()).unwrap_or_default())
                .unwrap_or_default();
            Ok(vec![AgentEvent::Completed(ResultEvent {
                result: value
                    .get("result")
                    .and_then(|r| r.as_str())
                    .map(|s| s.to_string()),
                total_cost_usd: value
                    .get("total_cost_usd")
                    .and_then(|c| c.as_f64())
                    .unwrap_or(0.0),
                usage,
                is_error: value
                    .get("is_error")
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false),
                session_id: value
                    .get("session_id")
                    .and_then(|s| s.as_str())
                    .map(|s| s.to_string()),
            })])
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_system_init() {
        let events = parse_line(r#"{"type":"system","subtype":"init","session_id":"abc-123"}"#)
            .unwrap();
        assert_eq!(
            events,
            vec![AgentEvent::SessionStarted {
                session_id: "abc-123".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_text_delta() {
        let line = r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}}"#;
        let events = parse_line(line).unwrap();
        assert_eq!(
            events,
            vec![AgentEvent::TextDelta {
                text: "Hel".to_string()
            }]
        );
    }

    #[test]
    fn test_parse_assistant_message_with_tool_use() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"On it."},{"type":"tool_use","name":"add_permission","input":{"key":"NSCameraUsageDescription"}}]}}"#;
        let events = parse_line(line).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            AgentEvent::AssistantText {
                text: "On it.".to_string()
            }
        );
        match &events[1] {
            AgentEvent::ToolUse { name, input } => {
                assert_eq!(name, "add_permission");
                assert_eq!(input["key"], "NSCameraUsageDescription");
            }
            other => panic!("expected tool use, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_result_event() {
        let line = r#"{"type":"result","result":"{\"ok\":true}","total_cost_usd":0.42,"is_error":false,"session_id":"abc","usage":{"input_tokens":100,"output_tokens":50,"cache_read_input_tokens":10,"cache_creation_input_tokens":5}}"#;
        let events = parse_line(line).unwrap();
        match &events[0] {
            AgentEvent::Completed(result) => {
                assert_eq!(result.result.as_deref(), Some("{\"ok\":true}"));
                assert!((result.total_cost_usd - 0.42).abs() < f64::EPSILON);
                assert_eq!(result.usage.input_tokens, 100);
                assert_eq!(result.usage.cache_read_input_tokens, 10);
                assert!(!result.is_error);
            }
            other => panic!("expected completed, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_type_is_skipped() {
        let events = parse_line(r#"{"type":"user","message":{}}"#).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let err = parse_line("{not json").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_token_usage_add() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage {
            input_tokens: 10,
            output_tokens: 20,
            cache_read_input_tokens: 5,
            cache_creation_input_tokens: 1,
        });
        total.add(&TokenUsage {
            input_tokens: 1,
            ..Default::default()
        });
        assert_eq!(total.input_tokens, 11);
        assert_eq!(total.output_tokens, 20);
    }
}
