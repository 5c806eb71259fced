//! A scripted coding agent.
//!
//! Each invocation consumes the next [`ScriptedCall`]: files land in the
//! request's working directory, events stream through the callback, and
//! the response carries the scripted text, session id, and cost. Every
//! request is recorded so tests can assert on resumed sessions, prompts,
//! and tool allowlists.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use crate::agent::{
    AgentError, AgentEvent, AgentRequest, AgentResponse, CodingAgent, ResultEvent, TokenUsage,
};

/// One scripted invocation.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCall {
    /// Response text (a phase contract, or free text).
    pub result: String,

    /// Session id announced via system/init.
    pub session_id: Option<String>,

    pub cost_usd: f64,

    pub usage: TokenUsage,

    /// Files written into the request workdir before responding, as
    /// (relative path, content).
    pub files: Vec<(String, String)>,

    /// Extra events streamed before the result event.
    pub events: Vec<AgentEvent>,
}

impl ScriptedCall {
    pub fn text(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_cost(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd;
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((path.into(), content.into()));
        self
    }
}

/// The scripted agent. Single-threaded by design, like the pipeline.
#[derive(Default)]
pub struct MockAgent {
    calls: RefCell<VecDeque<ScriptedCall>>,

    /// Every request, in invocation order.
    pub requests: RefCell<Vec<AgentRequest>>,

    /// Workdir fallback when a request carries none.
    pub base_dir: Option<PathBuf>,
}

impl MockAgent {
    pub fn new(calls: Vec<ScriptedCall>) -> Self {
        Self {
            calls: RefCell::new(calls.into()),
            requests: RefCell::new(Vec::new()),
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Number of invocations made so far.
    pub fn call_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// The resume ids of every request, for session-continuity checks.
    pub fn resumed_sessions(&self) -> Vec<Option<String>> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.resume_session.clone())
            .collect()
    }
}

impl CodingAgent for MockAgent {
    fn generate_streaming(
        &self,
        request: &AgentRequest,
        on_event: &mut dyn FnMut(&AgentEvent),
    ) -> Result<AgentResponse, AgentError> {
        self.requests.borrow_mut().push(request.clone());

        let call = self.calls.borrow_mut().pop_front().ok_or_else(|| {
            AgentError::AgentReported("mock agent script exhausted".to_string())
        })?;

        let workdir = request
            .workdir
            .clone()
            .or_else(|| self.base_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        for (path, content) in &call.files {
            let full = workdir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).map_err(AgentError::Stdin)?;
            }
            fs::write(&full, content).map_err(AgentError::Stdin)?;
        }

        if let Some(ref session_id) = call.session_id {
            on_event(&AgentEvent::SessionStarted {
                session_id: session_id.clone(),
            });
        }
        for event in &call.events {
            on_event(event);
        }
        let completed = AgentEvent::Completed(ResultEvent {
            result: Some(call.result.clone()),
            total_cost_usd: call.cost_usd,
            usage: call.usage,
            is_error: false,
            session_id: call.session_id.clone(),
        });
        on_event(&completed);

        Ok(AgentResponse {
            result: call.result,
            session_id: call.session_id,
            total_cost_usd: call.cost_usd,
            usage: call.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_writes_files_and_replies() {
        let dir = tempfile::tempdir().unwrap();
        let agent = MockAgent::new(vec![ScriptedCall::text("done")
            .with_session("s-1")
            .with_file("Habits/App.swift", "@main struct A {}")]);

        let mut request = AgentRequest::new("build it");
        request.workdir = Some(dir.path().to_path_buf());

        let mut seen = Vec::new();
        let response = agent
            .generate_streaming(&request, &mut |e| seen.push(e.clone()))
            .unwrap();

        assert_eq!(response.result, "done");
        assert_eq!(response.session_id.as_deref(), Some("s-1"));
        assert!(dir.path().join("Habits/App.swift").is_file());
        assert!(matches!(seen[0], AgentEvent::SessionStarted { .. }));
        assert!(matches!(seen.last(), Some(AgentEvent::Completed(_))));
    }

    #[test]
    fn test_exhausted_script_errors() {
        let agent = MockAgent::new(vec![]);
        let request = AgentRequest::new("anything");
        let err = agent.generate_streaming(&request, &mut |_| {}).unwrap_err();
        assert!(matches!(err, AgentError::AgentReported(_)));
    }
}
