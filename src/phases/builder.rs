//! Phase 3: the builder loop.
//!
//! Stages the workspace, then drives the agent to write every planned
//! file. After each pass the completion gate audits the tree; when files
//! are missing or empty, the agent is re-invoked on the same session with
//! a continuation prompt naming exactly the shortfall. Progress is
//! cumulative across passes. One extra continuation is granted when a
//! missing file looks renamed rather than unwritten.

use std::collections::BTreeMap;

use thiserror::Error;

use nanowave_xcodegen::{emit_project_yaml, ProjectConfig};

use crate::agent::{AgentEvent, AgentRequest, CodingAgent};
use crate::phases::analyzer::AnalysisResult;
use crate::phases::gate::{
    audit, continuation_prompt, find_rename_candidate, FileCompletionReport,
};
use crate::phases::planner::PlannerResult;
use crate::phases::{PhaseError, SessionState};
use crate::prompt::PromptComposer;
use crate::skills::Phase;
use crate::workspace::{default_bundle_id, McpServerSpec, Workspace};

/// Continuation passes after the initial one. The gate gives up and
/// reports partial success beyond this.
pub const MAX_CONTINUATION_PASSES: u32 = 6;

/// Turn budget for one agent writing pass.
pub const BUILD_MAX_TURNS: u32 = 80;

/// File tools plus the xcodegen tool surface.
pub fn build_tool_allowlist() -> Vec<String> {
    let mut tools: Vec<String> = ["Write", "Edit", "Read", "Bash"]
        .iter()
        .map(|t| t.to_string())
        .collect();
    for tool in [
        "add_permission",
        "add_extension",
        "add_entitlement",
        "add_localization",
        "add_package",
        "set_build_setting",
        "get_project_config",
        "regenerate_project",
    ] {
        tools.push(format!("mcp__xcodegen__{}", tool));
    }
    tools
}

/// Builder errors beyond the shared phase errors.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("failed to stage workspace: {0}")]
    Staging(#[from] std::io::Error),

    #[error("failed to seed project config: {0}")]
    Seed(String),
}

/// Outcome of the builder loop.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Agent passes run, including the initial one.
    pub passes: u32,

    /// Final gate report.
    pub report: FileCompletionReport,

    /// Every planned file exists with content and the project file was
    /// regenerated.
    pub complete: bool,
}

/// Knobs for one builder run.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub model: Option<String>,

    pub max_turns: u32,

    pub max_continuation_passes: u32,

    /// Extra MCP servers from integrations.
    pub extra_servers: BTreeMap<String, McpServerSpec>,

    /// Extra allowed tools from integrations.
    pub extra_tools: Vec<String>,

    /// Integration prompt contributions.
    pub contributions: Vec<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_turns: BUILD_MAX_TURNS,
            max_continuation_passes: MAX_CONTINUATION_PASSES,
            extra_servers: BTreeMap::new(),
            extra_tools: Vec::new(),
            contributions: Vec::new(),
        }
    }
}

/// Stage the workspace for a build: memory file, MCP config, seeded
/// project config, and the initial project.yml.
pub fn stage_workspace(
    workspace: &Workspace,
    analysis: &AnalysisResult,
    plan: &PlannerResult,
    extra_servers: &BTreeMap<String, McpServerSpec>,
) -> Result<std::path::PathBuf, BuildError> {
    workspace.ensure_layout()?;
    workspace.write_memory_file(analysis, plan)?;

    let mut servers = extra_servers.clone();
    servers.insert("xcodegen".to_string(), workspace.xcodegen_server_spec());
    let mcp_config = workspace.write_mcp_config(&servers)?;

    // Seed project_config.json before the session starts; once the agent
    // is running, the MCP server owns it.
    let config = seed_project_config(analysis, plan);
    config
        .store(workspace.root())
        .map_err(|e| BuildError::Seed(e.to_string()))?;
    let yaml = emit_project_yaml(&config).map_err(|e| BuildError::Seed(e.to_string()))?;
    std::fs::write(workspace.project_yaml_path(), yaml)?;

    Ok(mcp_config)
}

/// Build the initial MCP-server config from the accepted plan.
fn seed_project_config(analysis: &AnalysisResult, plan: &PlannerResult) -> ProjectConfig {
    let mut config = ProjectConfig::new(
        analysis.app_name.clone(),
        default_bundle_id(&analysis.app_name),
        plan.platform,
    );
    config.platforms = plan
        .platforms
        .iter()
        .copied()
        .filter(|p| *p != plan.platform)
        .collect();
    config.device_family = plan.device_family;
    config.watch_project_shape = plan.watch_project_shape;
    for permission in &plan.permissions {
        config.add_permission(nanowave_xcodegen::Permission {
            key: permission.key.clone(),
            description: permission.description.clone(),
            framework: permission.framework.clone(),
        });
    }
    if !plan.localizations.is_empty() {
        config.add_localizations(&plan.localizations);
    }
    config
}

/// The initial build message: what to make, in what order.
fn build_message(analysis: &AnalysisResult, plan: &PlannerResult, user_prompt: &str) -> String {
    let mut out = format!(
        "Build {} ({}), a {} app.\n\nOriginal request:\n{}\n\n",
        analysis.app_name,
        default_bundle_id(&analysis.app_name),
        plan.platform,
        user_prompt,
    );
    if !analysis.features.is_empty() {
        out.push_str("Features:\n");
        for feature in &analysis.features {
            out.push_str(&format!("- {}: {}\n", feature.name, feature.description));
        }
        out.push('\n');
    }
    out.push_str("Write every file below, in this order:\n");
    for path in &plan.build_order {
        let file = plan.files.iter().find(|f| &f.path == path);
        match file {
            Some(file) => out.push_str(&format!("- {}: {}\n", path, file.purpose)),
            None => out.push_str(&format!("- {}\n", path)),
        }
    }
    out.push_str("\nWhen every file is written, call the regenerate_project tool.");
    out
}

/// Run the builder loop against a staged workspace.
#[allow(clippy::too_many_arguments)]
pub fn run_build(
    agent: &dyn CodingAgent,
    composer: &PromptComposer<'_>,
    session: &mut SessionState,
    workspace: &Workspace,
    analysis: &AnalysisResult,
    plan: &PlannerResult,
    user_prompt: &str,
    config: &BuilderConfig,
    on_event: &mut dyn FnMut(&AgentEvent),
) -> Result<BuildOutcome, BuildError> {
    let mcp_config = stage_workspace(workspace, analysis, plan, &config.extra_servers)?;

    let system_prompt = composer.compose(
        Phase::Coder,
        Some(plan.platform),
        &plan.rule_keys,
        &config.contributions,
    );
    let mut allowed_tools = build_tool_allowlist();
    allowed_tools.extend(config.extra_tools.iter().cloned());

    let make_request = |message: String, session: &SessionState| {
        let mut request = AgentRequest::new(message);
        request.append_system_prompt = Some(system_prompt.clone());
        request.model = config.model.clone();
        request.max_turns = config.max_turns;
        request.mcp_config = Some(mcp_config.clone());
        request.allowed_tools = allowed_tools.clone();
        request.workdir = Some(workspace.root().to_path_buf());
        request.resume_session = session.resume_id().map(|s| s.to_string());
        request
    };

    let mut passes = 0u32;
    let mut continuations = 0u32;
    let mut alias_pass_used = false;
    let mut message = build_message(analysis, plan, user_prompt);

    loop {
        let request = make_request(message.clone(), session);
        let response = agent
            .generate_streaming(&request, on_event)
            .map_err(PhaseError::Agent)?;
        session.absorb(&response);
        passes += 1;

        let report = audit(workspace.root(), &plan.build_order);
        let project_regenerated = workspace.project_yaml_exists();

        if report.is_complete() && project_regenerated {
            return Ok(BuildOutcome {
                passes,
                report,
                complete: true,
            });
        }

        // Rename detection: grant one extra pass that asks for the moves
        // instead of rewrites.
        if !alias_pass_used {
            let renames: Vec<(String, String)> = report
                .missing
                .iter()
                .filter_map(|missing| {
                    find_rename_candidate(workspace.root(), missing)
                        .map(|found| (missing.clone(), found))
                })
                .collect();
            if !renames.is_empty() {
                alias_pass_used = true;
                let mut prompt = String::from(
                    "Some planned files exist under different paths. Move them to the \
planned paths (keep the content):\n",
                );
                for (wanted, found) in &renames {
                    prompt.push_str(&format!("- move {} to {}\n", found, wanted));
                }
                log::debug!("builder: requesting {} rename(s)", renames.len());
                message = prompt;
                continue;
            }
        }

        if continuations >= config.max_continuation_passes {
            log::warn!(
                "builder: continuation budget exhausted with {} file(s) short",
                report.shortfall().len()
            );
            return Ok(BuildOutcome {
                passes,
                report,
                complete: false,
            });
        }
        continuations += 1;

        if report.is_complete() && !project_regenerated {
            message = "Every planned file is written, but the project was not regenerated. \
Call the regenerate_project tool now."
                .to_string();
        } else {
            message = continuation_prompt(&report);
        }
        log::debug!(
            "builder: pass {} incomplete ({} missing, {} empty), continuing",
            passes,
            report.missing.len(),
            report.empty.len()
        );
    }
}
