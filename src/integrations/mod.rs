//! Backend integration providers.
//!
//! A provider is polymorphic over a capability set; the manager
//! discovers what each one supports through the `as_*` accessors rather
//! than a monolithic trait, so a provider implements only what it has.
//! The planner names integrations by id; the manager resolves those ids
//! into active providers for the session and aggregates their MCP
//! servers, tool allowlists, and prompt contributions.

pub mod supabase;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::skills::Phase;
use crate::workspace::{McpServerSpec, Workspace};

/// Integration failures surface with the provider id attached.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("integration '{id}' setup failed: {reason}")]
    Setup { id: String, reason: String },

    #[error("integration '{id}' provisioning failed: {reason}")]
    Provision { id: String, reason: String },
}

/// A provider the planner can select by id.
pub trait Integration {
    /// Stable id used in plans, e.g. "supabase".
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn as_setup(&self) -> Option<&dyn SetupCapable> {
        None
    }

    fn as_prompt(&self) -> Option<&dyn PromptCapable> {
        None
    }

    fn as_mcp(&self) -> Option<&dyn McpCapable> {
        None
    }

    fn as_provisioning(&self) -> Option<&dyn ProvisionCapable> {
        None
    }
}

/// One-time workspace preparation before the agent session.
pub trait SetupCapable {
    fn setup(&self, workspace: &Workspace) -> Result<(), IntegrationError>;
}

/// Contributes a fragment to phase prompts.
pub trait PromptCapable {
    fn prompt_contribution(&self, phase: Phase) -> Option<String>;
}

/// Exposes an MCP server and its tool allowlist to the agent session.
pub trait McpCapable {
    /// Server name and spec for the agent's MCP config.
    fn mcp_server(&self, workspace: &Workspace) -> (String, McpServerSpec);

    /// Tools the agent may call on that server.
    fn tool_allowlist(&self) -> Vec<String>;
}

/// Provisions backend resources for a new app.
pub trait ProvisionCapable {
    fn provision(&self, app_name: &str) -> Result<(), IntegrationError>;
}

/// Everything a session needs from the resolved providers.
#[derive(Debug, Default)]
pub struct SessionIntegrations {
    pub servers: BTreeMap<String, McpServerSpec>,

    pub allowed_tools: Vec<String>,

    pub contributions: Vec<String>,
}

/// Registry of known providers.
pub struct IntegrationManager {
    providers: Vec<Box<dyn Integration>>,
}

impl IntegrationManager {
    /// The built-in provider set.
    pub fn new() -> Self {
        Self {
            providers: vec![Box::new(supabase::Supabase::new())],
        }
    }

    /// Registry for tests or embedding.
    pub fn with_providers(providers: Vec<Box<dyn Integration>>) -> Self {
        Self { providers }
    }

    pub fn get(&self, id: &str) -> Option<&dyn Integration> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .map(|p| p.as_ref())
    }

    /// Resolve planned ids into providers. Unknown ids are skipped with
    /// a warning rather than failing the build.
    pub fn resolve(&self, ids: &[String]) -> Vec<&dyn Integration> {
        let mut resolved = Vec::new();
        for id in ids {
            match self.get(id) {
                Some(provider) => resolved.push(provider),
                None => log::warn!("unknown integration '{}' in plan; skipping", id),
            }
        }
        resolved
    }

    /// Resolve, run setup and provisioning where supported, and collect
    /// the session surface for the agent.
    pub fn prepare_session(
        &self,
        ids: &[String],
        workspace: &Workspace,
        app_name: &str,
        phase: Phase,
    ) -> Result<SessionIntegrations, IntegrationError> {
        let mut session = SessionIntegrations::default();
        for provider in self.resolve(ids) {
            if let Some(setup) = provider.as_setup() {
                setup.setup(workspace)?;
            }
            if let Some(provisioning) = provider.as_provisioning() {
                provisioning.provision(app_name)?;
            }
            if let Some(mcp) = provider.as_mcp() {
                let (name, spec) = mcp.mcp_server(workspace);
                session.servers.insert(name, spec);
                session.allowed_tools.extend(mcp.tool_allowlist());
            }
            if let Some(prompt) = provider.as_prompt() {
                if let Some(contribution) = prompt.prompt_contribution(phase) {
                    session.contributions.push(contribution);
                }
            }
        }
        Ok(session)
    }
}

impl Default for IntegrationManager {
    fn default() -> Self {
        Self::new()
    }
}
