//! The pipeline orchestrator.
//!
//! Connects the phases into the build, edit, fix, and ask entry points:
//!
//! ```text
//! Build: Analyzing -> Planning -> policy gate -> Building -> Fixing -> Done/Partial
//! Edit:  Editing -> Fixing -> Done
//! Fix:   Fixing -> Done/Partial
//! Ask:   one read-only agent turn
//! ```
//!
//! The orchestrator owns the in-flight session and its phase outputs.
//! The session id captured by the turn's first agent call is resumed by
//! every later call; cumulative cost and tokens roll into the usage
//! store. A plan that fails validation or policy aborts before the
//! workspace is touched, so a rejected project leaves no state behind.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use nanowave_policy::{DeviceFamily, Platform};

use crate::agent::{AgentError, AgentEvent, AgentRequest, CodingAgent, TokenUsage};
use crate::config::ToolConfig;
use crate::integrations::{IntegrationError, IntegrationManager};
use crate::intent::{self, IntentDecision, IntentError, Operation};
use crate::phases::analyzer::{analyze, AnalysisResult, AnalyzeInput};
use crate::phases::builder::{run_build, BuildError, BuilderConfig};
use crate::phases::fixer::{
    default_simulator, run_fix_loop, CompileRequest, FixError, ProjectCompiler,
};
use crate::phases::gate::FileCompletionReport;
use crate::phases::planner::{plan as run_planner, PlanError, PlanInput, PlannerResult};
use crate::phases::{PhaseError, SessionState};
use crate::prompt::PromptComposer;
use crate::skills::{Phase, SkillRegistry};
use crate::state::{
    HistoryMessage, HistoryStore, Project, ProjectStatus, StateError, UsageStore,
};
use crate::structured::StructuredError;
use crate::workspace::{default_bundle_id, Workspace};

/// Progress events for the terminal UI.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    PhaseStarted(PipelinePhase),

    /// Token-level text from the agent.
    AgentText(String),

    /// The agent invoked a tool.
    ToolUse(String),

    /// One builder pass finished with this shortfall.
    BuilderPass {
        pass: u32,
        missing: usize,
        empty: usize,
    },

    /// One fix round finished.
    FixAttempt { attempt: u32 },
}

/// Pipeline states, reported through [`PipelineEvent::PhaseStarted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Routing,
    Analyzing,
    Planning,
    Building,
    Editing,
    Fixing,
    Asking,
    Done,
}

/// Errors for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("plan rejected: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fix(#[from] FixError),

    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no project in this directory; build one first")]
    NoProject,

    #[error("daily budget exhausted: ${spent:.2} of ${budget:.2} spent today")]
    BudgetExceeded { spent: f64, budget: f64 },
}

impl PipelineError {
    /// Process exit code: 130 for interrupts, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_cancelled() {
            130
        } else {
            1
        }
    }

    fn is_cancelled(&self) -> bool {
        fn agent_cancelled(error: &PhaseError) -> bool {
            matches!(error, PhaseError::Agent(AgentError::Cancelled))
        }
        match self {
            PipelineError::Phase(e) => agent_cancelled(e),
            PipelineError::Build(BuildError::Phase(e)) => agent_cancelled(e),
            PipelineError::Fix(FixError::Phase(e)) => agent_cancelled(e),
            PipelineError::Intent(IntentError::Agent(AgentError::Cancelled)) => true,
            _ => false,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// The build summary handed back to the CLI.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub app_name: String,

    pub bundle_id: String,

    pub project_dir: PathBuf,

    pub platform: Platform,

    pub platforms: Vec<Platform>,

    pub device_family: Option<DeviceFamily>,

    pub completed_files: usize,

    pub description: String,

    pub features: Vec<String>,

    pub total_cost_usd: f64,

    pub usage: TokenUsage,

    pub session_id: Option<String>,

    pub builder_passes: u32,

    pub fix_attempts: u32,

    /// Planned files still missing or empty when the gate gave up.
    pub shortfall: Vec<String>,

    /// The final compile was green.
    pub green: bool,
}

impl BuildResult {
    /// Every planned file written and the project compiles.
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_empty() && self.green
    }
}

/// Summary of an edit or fix turn.
#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub app_name: String,

    pub total_cost_usd: f64,

    pub fix_attempts: u32,

    pub green: bool,

    pub session_id: Option<String>,
}

/// The pipeline, wired to its external seams.
pub struct Pipeline<'a> {
    agent: &'a dyn CodingAgent,
    compiler: &'a dyn ProjectCompiler,
    registry: &'a SkillRegistry,
    integrations: &'a IntegrationManager,
    config: ToolConfig,
    workspace: Workspace,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        agent: &'a dyn CodingAgent,
        compiler: &'a dyn ProjectCompiler,
        registry: &'a SkillRegistry,
        integrations: &'a IntegrationManager,
        config: ToolConfig,
        workspace: Workspace,
    ) -> Self {
        Self {
            agent,
            compiler,
            registry,
            integrations,
            config,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Route a raw utterance and run the matching entry point. Returns
    /// the assistant-facing summary line.
    pub fn dispatch(
        &mut self,
        prompt: &str,
        images: Vec<PathBuf>,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> PipelineResult<String> {
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Routing));
        let composer = PromptComposer::new(self.registry);
        let decision: IntentDecision = intent::route(
            self.agent,
            &composer,
            self.config.model.as_deref(),
            prompt,
            self.workspace.has_project(),
        )?;
        log::debug!("routed '{}' as {}", prompt, decision.operation);

        match decision.operation {
            Operation::Build => {
                let result = self.build(prompt, images, on_event)?;
                Ok(format!(
                    "Built {} ({} files, ${:.2})",
                    result.app_name, result.completed_files, result.total_cost_usd
                ))
            }
            Operation::Edit => {
                let result = self.edit(prompt, images, on_event)?;
                Ok(format!(
                    "Updated {} (${:.2})",
                    result.app_name, result.total_cost_usd
                ))
            }
            Operation::Fix => {
                let result = self.fix(on_event)?;
                Ok(format!(
                    "Fixed {} in {} attempt(s)",
                    result.app_name, result.fix_attempts
                ))
            }
            Operation::Ask => self.ask(prompt, on_event),
        }
    }

    /// Build a new project from a description.
    pub fn build(
        &mut self,
        prompt: &str,
        images: Vec<PathBuf>,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> PipelineResult<BuildResult> {
        self.check_daily_budget()?;

        let composer = PromptComposer::new(self.registry);
        let mut session = SessionState::begin(None);

        // Phase 1: analyze.
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Analyzing));
        let analysis = {
            let mut forward = forward_agent_events(on_event);
            analyze(
                self.agent,
                &composer,
                &mut session,
                AnalyzeInput {
                    description: prompt,
                    prior: None,
                    images: images.clone(),
                    model: self.config.model.clone(),
                },
                &mut forward,
            )?
        };

        // Phase 2: plan, then validate. Policy rejection aborts here,
        // before anything is written under the project directory.
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Planning));
        let plan: PlannerResult = {
            let mut forward = forward_agent_events(on_event);
            run_planner(
                self.agent,
                &composer,
                &mut session,
                PlanInput {
                    analysis: &analysis,
                    description: prompt,
                    images,
                    model: self.config.model.clone(),
                },
                &mut forward,
            )?
        };
        plan.validate(&analysis.app_name)?;

        // Phase 3: build with the completion gate.
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Building));
        let session_integrations = self.integrations.prepare_session(
            &plan.integrations,
            &self.workspace,
            &analysis.app_name,
            Phase::Coder,
        )?;
        let builder_config = BuilderConfig {
            model: self.config.model.clone(),
            max_turns: self.config.max_turns,
            max_continuation_passes: self.config.max_continuation_passes,
            extra_servers: session_integrations.servers,
            extra_tools: session_integrations.allowed_tools,
            contributions: session_integrations.contributions,
        };
        let build_outcome = {
            let mut forward = forward_agent_events(on_event);
            run_build(
                self.agent,
                &composer,
                &mut session,
                &self.workspace,
                &analysis,
                &plan,
                prompt,
                &builder_config,
                &mut forward,
            )?
        };
        on_event(PipelineEvent::BuilderPass {
            pass: build_outcome.passes,
            missing: build_outcome.report.missing.len(),
            empty: build_outcome.report.empty.len(),
        });

        // Phase 4: compile and fix.
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Fixing));
        let simulator = default_simulator(plan.platform).to_string();
        let fix_outcome = {
            let mut forward = forward_agent_events(on_event);
            run_fix_loop(
                self.agent,
                self.compiler,
                &composer,
                &mut session,
                &CompileRequest {
                    project_dir: self.workspace.root().to_path_buf(),
                    app_name: analysis.app_name.clone(),
                    platform: plan.platform,
                    simulator: simulator.clone(),
                },
                &plan.rule_keys,
                self.config.model.as_deref(),
                self.config.max_fix_attempts,
                &mut forward,
            )?
        };
        on_event(PipelineEvent::FixAttempt {
            attempt: fix_outcome.fix_attempts,
        });

        // Persist: project record, history, usage.
        let result = self.persist_build(
            prompt,
            &analysis,
            &plan,
            &session,
            &build_outcome.report,
            build_outcome.passes,
            build_outcome.complete,
            fix_outcome.green,
            fix_outcome.fix_attempts,
            simulator,
        )?;

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Done));
        Ok(result)
    }

    /// Apply a change to the existing project.
    pub fn edit(
        &mut self,
        prompt: &str,
        images: Vec<PathBuf>,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> PipelineResult<ChangeResult> {
        let mut project = self.load_project()?;
        let composer = PromptComposer::new(self.registry);
        let mut session = SessionState::begin(project.session_id.clone());

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Editing));
        let session_integrations = self.integrations.prepare_session(
            &project.integrations,
            &self.workspace,
            &project.name,
            Phase::Editor,
        )?;
        let mut servers = session_integrations.servers;
        servers.insert("xcodegen".to_string(), self.workspace.xcodegen_server_spec());
        let mcp_config = self.workspace.write_mcp_config(&servers)?;

        let mut message = String::new();
        let history = HistoryStore::new(self.workspace.history_path());
        let recent = history.recent(6)?;
        if !recent.is_empty() {
            message.push_str("Recent conversation:\n");
            for entry in &recent {
                let role = match entry.role {
                    crate::state::Role::User => "user",
                    crate::state::Role::Assistant => "assistant",
                };
                message.push_str(&format!("[{}] {}\n", role, entry.content));
            }
            message.push('\n');
        }
        message.push_str("Change request:\n");
        message.push_str(prompt);

        let mut request = AgentRequest::new(message);
        request.append_system_prompt = Some(composer.compose(
            Phase::Editor,
            Some(project.platform),
            &project.rule_keys,
            &session_integrations.contributions,
        ));
        request.model = self.config.model.clone();
        request.max_turns = self.config.max_turns;
        request.mcp_config = Some(mcp_config);
        let mut tools = crate::phases::builder::build_tool_allowlist();
        tools.extend(session_integrations.allowed_tools);
        request.allowed_tools = tools;
        request.images = images;
        request.workdir = Some(self.workspace.root().to_path_buf());
        request.resume_session = session.resume_id().map(|s| s.to_string());

        let response = {
            let mut forward = forward_agent_events(on_event);
            self.agent
                .generate_streaming(&request, &mut forward)
                .map_err(PhaseError::Agent)?
        };
        session.absorb(&response);

        // Recompile and repair.
        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Fixing));
        let fix_outcome = {
            let mut forward = forward_agent_events(on_event);
            run_fix_loop(
                self.agent,
                self.compiler,
                &composer,
                &mut session,
                &self.compile_request(&project),
                &project.rule_keys,
                self.config.model.as_deref(),
                self.config.max_fix_attempts,
                &mut forward,
            )?
        };

        history.append(HistoryMessage::user(prompt))?;
        history.append(HistoryMessage::assistant(clip(&response.result, 2000)))?;
        UsageStore::new(self.workspace.usage_path())
            .record(session.total_cost_usd, &session.usage)?;

        project.session_id = session.latest_id().map(|s| s.to_string());
        project.status = if fix_outcome.green {
            ProjectStatus::Active
        } else {
            ProjectStatus::Partial
        };
        project.store(&self.workspace.project_record_path())?;

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Done));
        Ok(ChangeResult {
            app_name: project.name,
            total_cost_usd: session.total_cost_usd,
            fix_attempts: fix_outcome.fix_attempts,
            green: fix_outcome.green,
            session_id: project.session_id,
        })
    }

    /// Compile and repair the existing project.
    pub fn fix(
        &mut self,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> PipelineResult<ChangeResult> {
        let mut project = self.load_project()?;
        let composer = PromptComposer::new(self.registry);
        let mut session = SessionState::begin(project.session_id.clone());

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Fixing));
        let fix_outcome = {
            let mut forward = forward_agent_events(on_event);
            run_fix_loop(
                self.agent,
                self.compiler,
                &composer,
                &mut session,
                &self.compile_request(&project),
                &project.rule_keys,
                self.config.model.as_deref(),
                self.config.max_fix_attempts,
                &mut forward,
            )?
        };
        on_event(PipelineEvent::FixAttempt {
            attempt: fix_outcome.fix_attempts,
        });

        if session.total_cost_usd > 0.0 {
            UsageStore::new(self.workspace.usage_path())
                .record(session.total_cost_usd, &session.usage)?;
        }
        project.session_id = session
            .latest_id()
            .map(|s| s.to_string())
            .or(project.session_id);
        project.status = if fix_outcome.green {
            ProjectStatus::Active
        } else {
            ProjectStatus::Partial
        };
        project.store(&self.workspace.project_record_path())?;

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Done));
        Ok(ChangeResult {
            app_name: project.name,
            total_cost_usd: session.total_cost_usd,
            fix_attempts: fix_outcome.fix_attempts,
            green: fix_outcome.green,
            session_id: project.session_id,
        })
    }

    /// Answer a question about the project without changing it.
    pub fn ask(
        &mut self,
        prompt: &str,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> PipelineResult<String> {
        let project = self.load_project()?;
        let mut session = SessionState::begin(project.session_id.clone());

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Asking));
        let mut request = AgentRequest::new(prompt.to_string());
        request.model = self.config.model.clone();
        request.max_turns = 8;
        request.allowed_tools = vec!["Read".to_string(), "Bash".to_string()];
        request.workdir = Some(self.workspace.root().to_path_buf());
        request.resume_session = session.resume_id().map(|s| s.to_string());

        let response = {
            let mut forward = forward_agent_events(on_event);
            self.agent
                .generate_streaming(&request, &mut forward)
                .map_err(PhaseError::Agent)?
        };
        session.absorb(&response);

        let history = HistoryStore::new(self.workspace.history_path());
        history.append(HistoryMessage::user(prompt))?;
        history.append(HistoryMessage::assistant(clip(&response.result, 2000)))?;
        UsageStore::new(self.workspace.usage_path())
            .record(session.total_cost_usd, &session.usage)?;

        on_event(PipelineEvent::PhaseStarted(PipelinePhase::Done));
        Ok(response.result)
    }

    fn load_project(&self) -> PipelineResult<Project> {
        Project::load(&self.workspace.project_record_path())?.ok_or(PipelineError::NoProject)
    }

    fn compile_request(&self, project: &Project) -> CompileRequest {
        CompileRequest {
            project_dir: self.workspace.root().to_path_buf(),
            app_name: project.name.clone(),
            platform: project.platform,
            simulator: project
                .simulator
                .clone()
                .unwrap_or_else(|| default_simulator(project.platform).to_string()),
        }
    }

    fn check_daily_budget(&self) -> PipelineResult<()> {
        let Some(budget) = self.config.daily_budget_usd else {
            return Ok(());
        };
        // The usage store may not exist yet for a fresh directory; that
        // reads as zero spend.
        let spent = UsageStore::new(self.workspace.usage_path())
            .spent_today()
            .unwrap_or(0.0);
        if spent >= budget {
            return Err(PipelineError::BudgetExceeded { spent, budget });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn persist_build(
        &self,
        prompt: &str,
        analysis: &AnalysisResult,
        plan: &PlannerResult,
        session: &SessionState,
        report: &FileCompletionReport,
        builder_passes: u32,
        build_complete: bool,
        green: bool,
        fix_attempts: u32,
        simulator: String,
    ) -> PipelineResult<BuildResult> {
        let bundle_id = default_bundle_id(&analysis.app_name);

        let mut project = Project::new(
            analysis.app_name.clone(),
            self.workspace.root(),
            bundle_id.clone(),
            plan.platform,
        );
        project.platforms = plan.all_platforms();
        project.device_family = plan.device_family;
        project.session_id = session.latest_id().map(|s| s.to_string());
        project.simulator = Some(simulator);
        project.rule_keys = plan.rule_keys.clone();
        project.integrations = plan.integrations.clone();
        project.status = if build_complete && green {
            ProjectStatus::Active
        } else {
            ProjectStatus::Partial
        };
        project.store(&self.workspace.project_record_path())?;

        let history = HistoryStore::new(self.workspace.history_path());
        history.append(HistoryMessage::user(prompt))?;
        history.append(HistoryMessage::assistant(format!(
            "Built {} with {} of {} planned files.",
            analysis.app_name,
            report.completed_count(),
            plan.files.len(),
        )))?;
        UsageStore::new(self.workspace.usage_path())
            .record(session.total_cost_usd, &session.usage)?;

        Ok(BuildResult {
            app_name: analysis.app_name.clone(),
            bundle_id,
            project_dir: self.workspace.root().to_path_buf(),
            platform: plan.platform,
            platforms: plan.all_platforms(),
            device_family: plan.device_family,
            completed_files: report.completed_count(),
            description: analysis.description.clone(),
            features: analysis.features.iter().map(|f| f.name.clone()).collect(),
            total_cost_usd: session.total_cost_usd,
            usage: session.usage,
            session_id: session.latest_id().map(|s| s.to_string()),
            builder_passes,
            fix_attempts,
            shortfall: report.shortfall(),
            green,
        })
    }
}

/// Adapt agent stream events into pipeline events.
fn forward_agent_events(
    on_event: &mut dyn FnMut(PipelineEvent),
) -> impl FnMut(&AgentEvent) + '_ {
    move |event: &AgentEvent| match event {
        AgentEvent::TextDelta { text } => on_event(PipelineEvent::AgentText(text.clone())),
        AgentEvent::ToolUse { name, .. } => on_event(PipelineEvent::ToolUse(name.clone())),
        _ => {}
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

impl From<StructuredError> for PipelineError {
    fn from(error: StructuredError) -> Self {
        PipelineError::Phase(PhaseError::Structured(error))
    }
}
