//! Phase 4: the fix loop.
//!
//! Compiles the generated project with a fixed simulator destination and
//! a per-project derived-data path. On failure the diagnostics are fed to
//! the agent on the resumed session, then the compile runs again, up to a
//! bounded number of attempts. The completion gate does not re-run here;
//! files already exist and only their contents change.

use std::path::{Path, PathBuf};
use std::process::Command;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nanowave_policy::Platform;

use crate::agent::{AgentEvent, AgentRequest, CodingAgent};
use crate::phases::{PhaseError, SessionState};
use crate::prompt::PromptComposer;
use crate::skills::Phase;
use crate::workspace::Workspace;

/// Compile-fix rounds before giving up.
pub const MAX_FIX_ATTEMPTS: u32 = 3;

/// Turn budget for one fixing pass.
pub const FIX_MAX_TURNS: u32 = 40;

/// Default simulator when the project record has none.
pub fn default_simulator(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => "iPhone 16",
        Platform::Watchos => "Apple Watch Series 10 (46mm)",
        Platform::Tvos => "Apple TV",
        Platform::Visionos => "Apple Vision Pro",
        Platform::Macos => "My Mac",
    }
}

/// One extracted compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerDiagnostic {
    pub file: Option<String>,

    pub line: Option<u32>,

    pub message: String,
}

impl std::fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

/// One compile run's result.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,

    pub diagnostics: Vec<CompilerDiagnostic>,

    /// Full combined output, surfaced verbatim on unparseable failures.
    pub raw_output: String,
}

/// A compile request against a workspace.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub project_dir: PathBuf,

    pub app_name: String,

    pub platform: Platform,

    pub simulator: String,
}

/// Errors launching the compiler itself (not compile failures).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to spawn xcodebuild: {0}")]
    Spawn(#[source] std::io::Error),
}

/// The compiler seam; tests script it, production shells out.
pub trait ProjectCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome, CompileError>;
}

/// Extract `file:line:col: error: message` diagnostics, with a fallback
/// for bare `error: message` lines.
pub fn parse_diagnostics(output: &str) -> Vec<CompilerDiagnostic> {
    let located =
        Regex::new(r"(?m)^(.+?\.swift):(\d+):(?:\d+:)?\s*error:\s*(.+)$").expect("static regex");
    let bare = Regex::new(r"(?m)^\s*error:\s*(.+)$").expect("static regex");

    let mut diagnostics = Vec::new();
    for captures in located.captures_iter(output) {
        diagnostics.push(CompilerDiagnostic {
            file: Some(captures[1].to_string()),
            line: captures[2].parse().ok(),
            message: captures[3].trim().to_string(),
        });
    }
    if diagnostics.is_empty() {
        for captures in bare.captures_iter(output) {
            diagnostics.push(CompilerDiagnostic {
                file: None,
                line: None,
                message: captures[1].trim().to_string(),
            });
        }
    }
    // The same diagnostic appears once per architecture; dedupe.
    diagnostics.dedup();
    diagnostics
}

/// Shells out to xcodebuild.
pub struct XcodebuildCompiler;

impl ProjectCompiler for XcodebuildCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome, CompileError> {
        let workspace = Workspace::new(&request.project_dir);
        let destination = format!(
            "platform={},name={}",
            request.platform.simulator_destination(),
            request.simulator
        );
        let project = format!("{}.xcodeproj", request.app_name);

        log::debug!("xcodebuild build -project {} -destination {}", project, destination);
        let output = Command::new("xcodebuild")
            .arg("build")
            .arg("-project")
            .arg(&project)
            .arg("-scheme")
            .arg(&request.app_name)
            .arg("-destination")
            .arg(&destination)
            .arg("-derivedDataPath")
            .arg(workspace.derived_data_dir())
            .arg("-quiet")
            .current_dir(&request.project_dir)
            .output()
            .map_err(CompileError::Spawn)?;

        let mut raw_output = String::from_utf8_lossy(&output.stdout).to_string();
        raw_output.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CompileOutcome {
            success: output.status.success(),
            diagnostics: parse_diagnostics(&raw_output),
            raw_output,
        })
    }
}

/// Outcome of the fix loop.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// Compile succeeded.
    pub green: bool,

    /// Fix passes run (0 when the first compile was already green).
    pub fix_attempts: u32,

    /// Diagnostics still standing when the budget ran out.
    pub remaining: Vec<CompilerDiagnostic>,
}

/// The fix message: diagnostics first, raw tail as context when nothing
/// parsed.
fn fix_message(outcome: &CompileOutcome) -> String {
    let mut out = String::from("The build failed. Fix these compile errors:\n\n");
    if outcome.diagnostics.is_empty() {
        let tail: String = outcome
            .raw_output
            .lines()
            .rev()
            .take(40)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        out.push_str(&tail);
    } else {
        for diagnostic in &outcome.diagnostics {
            out.push_str(&format!("- {}\n", diagnostic));
        }
    }
    out.push_str("\nFix the causes; the project will be compiled again after you finish.");
    out
}

/// Run compile-fix-compile until green or the attempt budget is spent.
#[allow(clippy::too_many_arguments)]
pub fn run_fix_loop(
    agent: &dyn CodingAgent,
    compiler: &dyn ProjectCompiler,
    composer: &PromptComposer<'_>,
    session: &mut SessionState,
    request: &CompileRequest,
    rule_keys: &[String],
    model: Option<&str>,
    max_attempts: u32,
    on_event: &mut dyn FnMut(&AgentEvent),
) -> Result<FixOutcome, FixError> {
    let mut outcome = compiler.compile(request)?;
    if outcome.success {
        return Ok(FixOutcome {
            green: true,
            fix_attempts: 0,
            remaining: Vec::new(),
        });
    }

    let system_prompt = composer.compose(Phase::Fixer, Some(request.platform), rule_keys, &[]);
    let mut attempts = 0u32;

    while attempts < max_attempts {
        attempts += 1;
        log::debug!(
            "fix attempt {} of {} ({} diagnostic(s))",
            attempts,
            max_attempts,
            outcome.diagnostics.len()
        );

        let mut agent_request = AgentRequest::new(fix_message(&outcome));
        agent_request.append_system_prompt = Some(system_prompt.clone());
        agent_request.model = model.map(|m| m.to_string());
        agent_request.max_turns = FIX_MAX_TURNS;
        agent_request.allowed_tools = vec![
            "Read".to_string(),
            "Edit".to_string(),
            "Write".to_string(),
            "Bash".to_string(),
        ];
        agent_request.workdir = Some(request.project_dir.clone());
        agent_request.resume_session = session.resume_id().map(|s| s.to_string());

        let response = agent
            .generate_streaming(&agent_request, on_event)
            .map_err(PhaseError::Agent)?;
        session.absorb(&response);

        outcome = compiler.compile(request)?;
        if outcome.success {
            return Ok(FixOutcome {
                green: true,
                fix_attempts: attempts,
                remaining: Vec::new(),
            });
        }
    }

    Ok(FixOutcome {
        green: false,
        fix_attempts: attempts,
        remaining: outcome.diagnostics,
    })
}

/// Fix-loop errors.
#[derive(Debug, Error)]
pub enum FixError {
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A scripted compiler for tests: a queue of outcomes, then green.
#[cfg(test)]
pub(crate) struct ScriptedCompiler {
    outcomes: std::cell::RefCell<Vec<CompileOutcome>>,
    pub compile_count: std::cell::Cell<u32>,
}

#[cfg(test)]
impl ScriptedCompiler {
    pub fn failing_then_green(failures: Vec<CompileOutcome>) -> Self {
        Self {
            outcomes: std::cell::RefCell::new(failures),
            compile_count: std::cell::Cell::new(0),
        }
    }
}

#[cfg(test)]
impl ProjectCompiler for ScriptedCompiler {
    fn compile(&self, _request: &CompileRequest) -> Result<CompileOutcome, CompileError> {
        self.compile_count.set(self.compile_count.get() + 1);
        let mut outcomes = self.outcomes.borrow_mut();
        if outcomes.is_empty() {
            Ok(CompileOutcome {
                success: true,
                diagnostics: Vec::new(),
                raw_output: String::new(),
            })
        } else {
            Ok(outcomes.remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_located_diagnostics() {
        let output = "\
CompileSwift normal arm64\n\
/proj/Habits/GridView.swift:42:13: error: cannot find type 'Habit' in scope\n\
/proj/Habits/GridView.swift:50:2: warning: unused variable\n";
        let diagnostics = parse_diagnostics(output);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("/proj/Habits/GridView.swift"));
        assert_eq!(diagnostics[0].line, Some(42));
        assert!(diagnostics[0].message.contains("cannot find type"));
    }

    #[test]
    fn test_parse_bare_error_fallback() {
        let output = "error: unable to resolve product type 'com.apple.bogus'\n";
        let diagnostics = parse_diagnostics(output);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].file.is_none());
    }

    #[test]
    fn test_duplicate_diagnostics_deduped() {
        let line = "/p/A.swift:1:1: error: boom\n";
        let diagnostics = parse_diagnostics(&format!("{}{}", line, line));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_fix_message_lists_diagnostics() {
        let outcome = CompileOutcome {
            success: false,
            diagnostics: vec![CompilerDiagnostic {
                file: Some("Habits/GridView.swift".to_string()),
                line: Some(42),
                message: "cannot find type 'Habit' in scope".to_string(),
            }],
            raw_output: String::new(),
        };
        let message = fix_message(&outcome);
        assert!(message.contains("Habits/GridView.swift:42"));
    }

    #[test]
    fn test_fix_message_falls_back_to_raw_tail() {
        let outcome = CompileOutcome {
            success: false,
            diagnostics: Vec::new(),
            raw_output: "mysterious linker explosion\n".to_string(),
        };
        assert!(fix_message(&outcome).contains("mysterious linker explosion"));
    }

    #[test]
    fn test_default_simulators() {
        assert_eq!(default_simulator(Platform::Ios), "iPhone 16");
        assert!(default_simulator(Platform::Watchos).contains("Watch"));
    }
}
