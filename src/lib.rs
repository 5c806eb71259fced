//! Nanowave - natural language to a running Xcode project.
//!
//! This crate implements the multi-phase generation pipeline: an intent
//! router, structured analyze and plan phases, a builder loop with a
//! file-completion gate, a compile-fix loop, and the state stores and
//! integration registry around them. The agent doing the actual code
//! writing is an external subprocess driven over a streaming NDJSON
//! protocol; nanowave constrains and validates it, it never generates
//! Swift itself.

pub mod agent;
pub mod config;
pub mod conformance;
pub mod integrations;
pub mod intent;
pub mod mock;
pub mod phases;
pub mod pipeline;
pub mod prompt;
pub mod simulator;
pub mod skills;
pub mod state;
pub mod structured;
pub mod workspace;

pub use agent::{
    AgentError, AgentEvent, AgentRequest, AgentResponse, CancelToken, ClaudeCli, CodingAgent,
    ResultEvent, TokenUsage,
};
pub use config::{ConfigError, ToolConfig};
pub use integrations::{
    Integration, IntegrationError, IntegrationManager, McpCapable, PromptCapable,
    ProvisionCapable, SessionIntegrations, SetupCapable,
};
pub use intent::{route_heuristic, IntentDecision, IntentError, Operation};
pub use mock::{MockAgent, ScriptedCall};
pub use phases::analyzer::{AnalysisResult, FeatureSummary};
pub use phases::builder::{BuildError, BuildOutcome, BuilderConfig, MAX_CONTINUATION_PASSES};
pub use phases::fixer::{
    CompileOutcome, CompileRequest, CompilerDiagnostic, FixError, FixOutcome, ProjectCompiler,
    XcodebuildCompiler, MAX_FIX_ATTEMPTS,
};
pub use phases::gate::{FileCompletionReport, PlannedFileStatus};
pub use phases::planner::{
    DesignSpec, ExtensionPlan, FilePlan, ModelPlan, PackagePlan, PermissionPlan, PlanError,
    PlannerResult,
};
pub use phases::{PhaseError, SessionState};
pub use pipeline::{
    BuildResult, ChangeResult, Pipeline, PipelineError, PipelineEvent, PipelinePhase,
    PipelineResult,
};
pub use prompt::PromptComposer;
pub use simulator::SimulatorError;
pub use skills::{Phase, Skill, SkillError, SkillRegistry};
pub use state::{
    HistoryMessage, HistoryStore, Project, ProjectStatus, Role, StateError, UsageRecord,
    UsageStore,
};
pub use structured::{StructuredError, JSON_ONLY_REMINDER};
pub use workspace::{default_bundle_id, McpServerSpec, Workspace};
