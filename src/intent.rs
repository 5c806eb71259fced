//! Intent routing.
//!
//! Classifies a user utterance into build, edit, fix, or ask. The clear
//! cases are decided from heuristics alone; only when the signals
//! disagree is the agent asked, with the intent skill loaded. Fix is
//! never routed from text; the pipeline enters it programmatically
//! after a failed build.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::{AgentError, AgentRequest, CodingAgent};
use crate::prompt::PromptComposer;
use crate::skills::Phase;
use crate::structured::{self, StructuredError, JSON_ONLY_REMINDER};

/// The four pipeline entry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Build,
    Edit,
    Fix,
    Ask,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Build => "build",
            Operation::Edit => "edit",
            Operation::Fix => "fix",
            Operation::Ask => "ask",
        };
        f.write_str(s)
    }
}

/// A routing decision with its one-line justification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDecision {
    pub operation: Operation,
    pub rationale: String,
}

/// Routing errors. Heuristic routing cannot fail; only the agent path can.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("agent error during intent routing: {0}")]
    Agent(#[from] AgentError),

    #[error("intent response was not valid JSON: {0}")]
    Parse(#[from] StructuredError),
}

const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "where", "when", "which", "who", "whose", "does", "do", "is", "are",
    "can", "could", "will", "would", "should",
];

/// Verbs that make a request an instruction even when phrased as a
/// question ("can you add dark mode?").
const IMPERATIVE_VERBS: &str = "add|make|create|change|remove|delete|fix|update|rename|implement|build|set|move|replace|refactor|redesign|improve|switch|enable|disable|translate|integrate|install|adjust|increase|decrease|swap";

fn starts_with_question_word(text: &str) -> bool {
    let first = text
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    QUESTION_WORDS.contains(&first.as_str())
}

fn contains_imperative_verb(text: &str) -> bool {
    let pattern = format!(r"(?i)\b({})\b", IMPERATIVE_VERBS);
    Regex::new(&pattern)
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

/// Classify from heuristics alone. None means the signals disagree and
/// the agent should decide.
pub fn route_heuristic(text: &str, project_present: bool) -> Option<IntentDecision> {
    if !project_present {
        return Some(IntentDecision {
            operation: Operation::Build,
            rationale: "no active project, so the request starts a build".to_string(),
        });
    }

    let question_start = starts_with_question_word(text);
    let question_mark = text.trim_end().ends_with('?');
    let imperative = contains_imperative_verb(text);

    if imperative {
        return Some(IntentDecision {
            operation: Operation::Edit,
            rationale: "the request contains an instruction".to_string(),
        });
    }
    if question_start && question_mark {
        return Some(IntentDecision {
            operation: Operation::Ask,
            rationale: "question-shaped request with no instruction".to_string(),
        });
    }
    if !question_start && !question_mark {
        return Some(IntentDecision {
            operation: Operation::Edit,
            rationale: "statement about an active project".to_string(),
        });
    }

    // One question signal without the other: ambiguous.
    None
}

/// Classify, falling back to the agent for the ambiguous middle.
pub fn route(
    agent: &dyn CodingAgent,
    composer: &PromptComposer<'_>,
    model: Option<&str>,
    text: &str,
    project_present: bool,
) -> Result<IntentDecision, IntentError> {
    if let Some(decision) = route_heuristic(text, project_present) {
        return Ok(decision);
    }

    let prompt = composer.compose(Phase::Intent, None, &[], &[]);
    let message = format!("Active project: yes.\n\nRequest:\n{}", text);

    let mut request = AgentRequest::new(message);
    request.append_system_prompt = Some(prompt);
    request.model = model.map(|m| m.to_string());
    request.max_turns = 1;

    let response = agent.generate_streaming(&request, &mut |_| {})?;
    match structured::decode::<IntentDecision>(&response.result, "IntentDecision") {
        Ok(decision) => Ok(decision),
        Err(first_error) => {
            log::warn!("intent parse failed, retrying: {}", first_error);
            let mut retry = request.clone();
            retry.message = format!("{}\n\n{}", retry.message, JSON_ONLY_REMINDER);
            let response = agent.generate_streaming(&retry, &mut |_| {})?;
            match structured::decode::<IntentDecision>(&response.result, "IntentDecision") {
                Ok(decision) => Ok(decision),
                // The safe default for an ambiguous request against an
                // existing project is edit.
                Err(e) => {
                    log::warn!("intent retry failed, defaulting to edit: {}", e);
                    Ok(IntentDecision {
                        operation: Operation::Edit,
                        rationale: "classification fell back to edit".to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_project_is_always_build() {
        let decision = route_heuristic("what is the meaning of life?", false).unwrap();
        assert_eq!(decision.operation, Operation::Build);
    }

    #[test]
    fn test_clear_question_is_ask() {
        let decision = route_heuristic("what does the settings screen do?", true).unwrap();
        assert_eq!(decision.operation, Operation::Ask);
    }

    #[test]
    fn test_imperative_question_is_edit() {
        let decision = route_heuristic("can you add a dark mode toggle?", true).unwrap();
        assert_eq!(decision.operation, Operation::Edit);
    }

    #[test]
    fn test_plain_statement_is_edit() {
        let decision = route_heuristic("the header should be larger on iPad", true).unwrap();
        assert_eq!(decision.operation, Operation::Edit);
    }

    #[test]
    fn test_question_word_without_mark_is_ambiguous() {
        assert!(route_heuristic("how the streak counter works", true).is_none());
    }

    #[test]
    fn test_trailing_mark_without_question_word_is_ambiguous() {
        assert!(route_heuristic("dark mode?", true).is_none());
    }

    #[test]
    fn test_never_routes_fix_from_text() {
        for text in [
            "the app is broken",
            "why does it crash?",
            "it will not compile",
        ] {
            if let Some(decision) = route_heuristic(text, true) {
                assert_ne!(decision.operation, Operation::Fix, "routed fix for: {}", text);
            }
        }
    }
}
