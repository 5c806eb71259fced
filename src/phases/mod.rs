//! The generation phases and their shared plumbing.
//!
//! Each phase is one agent call with a typed contract. Session identity
//! and cumulative cost live in [`SessionState`]: the id captured by the
//! first call of a user turn is resumed by every later call of that turn,
//! so the agent keeps its in-context memory across analyze, plan, build,
//! and fix.

pub mod analyzer;
pub mod builder;
pub mod fixer;
pub mod gate;
pub mod planner;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::agent::{AgentError, AgentEvent, AgentRequest, AgentResponse, CodingAgent, TokenUsage};
use crate::structured::{self, StructuredError, JSON_ONLY_REMINDER};

/// Session identity and cumulative accounting for one pipeline turn.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// The id every call of this turn resumes. Set from the stored
    /// project record, or captured from the turn's first agent call.
    resume_id: Option<String>,

    /// The most recent id the agent returned; persisted at turn end.
    latest_id: Option<String>,

    pub total_cost_usd: f64,

    pub usage: TokenUsage,
}

impl SessionState {
    /// Start a turn, optionally resuming a stored session.
    pub fn begin(stored_session: Option<String>) -> Self {
        Self {
            resume_id: stored_session.clone(),
            latest_id: stored_session,
            total_cost_usd: 0.0,
            usage: TokenUsage::default(),
        }
    }

    /// The session id calls of this turn should resume.
    pub fn resume_id(&self) -> Option<&str> {
        self.resume_id.as_deref()
    }

    /// The id to persist in the project record.
    pub fn latest_id(&self) -> Option<&str> {
        self.latest_id.as_deref()
    }

    /// Fold one response into the turn's accounting.
    pub fn absorb(&mut self, response: &AgentResponse) {
        if let Some(ref id) = response.session_id {
            if self.resume_id.is_none() {
                self.resume_id = Some(id.clone());
            }
            self.latest_id = Some(id.clone());
        }
        self.total_cost_usd += response.total_cost_usd;
        self.usage.add(&response.usage);
    }
}

/// Errors shared by the structured phases.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("phase returned no usable contract: {0}")]
    Structured(#[from] StructuredError),
}

/// Run one structured-output phase call: resume the turn session, decode
/// the typed contract, and on a parse failure retry once with a JSON-only
/// reminder. Cost and session id are absorbed for every call made,
/// including the failed first attempt.
pub fn call_structured<T: DeserializeOwned>(
    agent: &dyn CodingAgent,
    session: &mut SessionState,
    mut request: AgentRequest,
    contract: &'static str,
    on_event: &mut dyn FnMut(&AgentEvent),
) -> Result<T, PhaseError> {
    request.resume_session = session.resume_id().map(|s| s.to_string());

    let response = agent.generate_streaming(&request, on_event)?;
    session.absorb(&response);

    match structured::decode::<T>(&response.result, contract) {
        Ok(value) => Ok(value),
        Err(first_error) => {
            log::warn!("{} parse failed, retrying once: {}", contract, first_error);
            let mut retry = request.clone();
            retry.message = format!("{}\n\n{}", retry.message, JSON_ONLY_REMINDER);
            retry.resume_session = session.resume_id().map(|s| s.to_string());

            let response = agent.generate_streaming(&retry, on_event)?;
            session.absorb(&response);
            Ok(structured::decode::<T>(&response.result, contract)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentResponse;

    fn response_with_session(id: &str, cost: f64) -> AgentResponse {
        AgentResponse {
            result: String::new(),
            session_id: Some(id.to_string()),
            total_cost_usd: cost,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_first_session_id_is_captured_for_resume() {
        let mut session = SessionState::begin(None);
        session.absorb(&response_with_session("first", 0.1));
        session.absorb(&response_with_session("second", 0.2));

        // Resume stays pinned to the first id; latest tracks the newest.
        assert_eq!(session.resume_id(), Some("first"));
        assert_eq!(session.latest_id(), Some("second"));
    }

    #[test]
    fn test_stored_session_is_resumed() {
        let mut session = SessionState::begin(Some("stored".to_string()));
        session.absorb(&response_with_session("fresh", 0.1));
        assert_eq!(session.resume_id(), Some("stored"));
        assert_eq!(session.latest_id(), Some("fresh"));
    }

    #[test]
    fn test_cost_and_usage_accumulate() {
        let mut session = SessionState::begin(None);
        session.absorb(&response_with_session("a", 0.10));
        session.absorb(&response_with_session("a", 0.15));
        assert!((session.total_cost_usd - 0.25).abs() < 1e-9);
        assert_eq!(session.usage.input_tokens, 20);
        assert_eq!(session.usage.output_tokens, 10);
    }
}
