//! Phase 1: analysis.
//!
//! Normalizes the raw description into the app's canonical intent: name,
//! features, core flow. The first agent call of a build turn, so the
//! session id it returns anchors the whole turn.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentEvent, AgentRequest, CodingAgent};
use crate::phases::{call_structured, PhaseError, SessionState};
use crate::prompt::PromptComposer;
use crate::skills::Phase;

/// One extracted feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// The normalized analysis contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub app_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub features: Vec<FeatureSummary>,

    #[serde(default)]
    pub core_flow: String,

    #[serde(default)]
    pub deferred_items: Vec<String>,
}

impl AnalysisResult {
    /// PascalCase the app name; the agent is prompted to do this but the
    /// contract normalizes anyway so downstream paths are dependable.
    pub fn normalized_app_name(&self) -> String {
        let cleaned: String = self
            .app_name
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();
        cleaned
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }
}

/// Inputs to an analysis call.
pub struct AnalyzeInput<'a> {
    pub description: &'a str,

    /// Prior analysis, present on edit turns.
    pub prior: Option<&'a AnalysisResult>,

    pub images: Vec<PathBuf>,

    pub model: Option<String>,
}

/// Run the analysis phase.
pub fn analyze(
    agent: &dyn CodingAgent,
    composer: &PromptComposer<'_>,
    session: &mut SessionState,
    input: AnalyzeInput<'_>,
    on_event: &mut dyn FnMut(&AgentEvent),
) -> Result<AnalysisResult, PhaseError> {
    let mut message = String::new();
    if let Some(prior) = input.prior {
        message.push_str("Previous analysis of this project:\n");
        message.push_str(&serde_json::to_string_pretty(prior).unwrap_or_default());
        message.push_str("\n\nNew request:\n");
    }
    message.push_str(input.description);

    let mut request = AgentRequest::new(message);
    request.append_system_prompt = Some(composer.compose(Phase::Analyzer, None, &[], &[]));
    request.model = input.model;
    request.images = input.images;
    request.max_turns = 1;

    let mut analysis: AnalysisResult =
        call_structured(agent, session, request, "AnalysisResult", on_event)?;
    analysis.app_name = analysis.normalized_app_name();
    Ok(analysis)
}
