//! Supabase provider: hosted Postgres, auth, and storage.
//!
//! Contributes build-prompt guidance, the Supabase MCP server, and its
//! tool allowlist. Setup verifies the access token is present; the MCP
//! server itself handles the network side.

use std::collections::BTreeMap;

use crate::skills::Phase;
use crate::workspace::{McpServerSpec, Workspace};

use super::{Integration, IntegrationError, McpCapable, PromptCapable, SetupCapable};

/// Environment variable carrying the Supabase access token.
pub const ACCESS_TOKEN_VAR: &str = "SUPABASE_ACCESS_TOKEN";

pub struct Supabase {
    token_var: &'static str,
}

impl Supabase {
    pub fn new() -> Self {
        Self {
            token_var: ACCESS_TOKEN_VAR,
        }
    }
}

impl Default for Supabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Integration for Supabase {
    fn id(&self) -> &str {
        "supabase"
    }

    fn name(&self) -> &str {
        "Supabase"
    }

    fn as_setup(&self) -> Option<&dyn SetupCapable> {
        Some(self)
    }

    fn as_prompt(&self) -> Option<&dyn PromptCapable> {
        Some(self)
    }

    fn as_mcp(&self) -> Option<&dyn McpCapable> {
        Some(self)
    }
}

impl SetupCapable for Supabase {
    fn setup(&self, _workspace: &Workspace) -> Result<(), IntegrationError> {
        if std::env::var(self.token_var).is_err() {
            return Err(IntegrationError::Setup {
                id: "supabase".to_string(),
                reason: format!("{} is not set", self.token_var),
            });
        }
        Ok(())
    }
}

impl PromptCapable for Supabase {
    fn prompt_contribution(&self, phase: Phase) -> Option<String> {
        match phase {
            Phase::Coder | Phase::Editor => Some(
                "## supabase\n\n\
- Data that syncs across devices lives in Supabase tables; local-only UI state stays in SwiftData.\n\
- Use the supabase-swift package; one SupabaseClient configured in a SupabaseService type.\n\
- Schema changes go through the supabase MCP tools, not raw SQL strings in app code.\n\
- Auth flows use Supabase Auth with the ASWebAuthenticationSession provider."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

impl McpCapable for Supabase {
    fn mcp_server(&self, _workspace: &Workspace) -> (String, McpServerSpec) {
        let mut env = BTreeMap::new();
        if let Ok(token) = std::env::var(self.token_var) {
            env.insert(self.token_var.to_string(), token);
        }
        (
            "supabase".to_string(),
            McpServerSpec {
                command: "npx".to_string(),
                args: vec![
                    "-y".to_string(),
                    "@supabase/mcp-server-supabase".to_string(),
                ],
                env,
            },
        )
    }

    fn tool_allowlist(&self) -> Vec<String> {
        [
            "list_projects",
            "list_tables",
            "apply_migration",
            "execute_sql",
            "get_project_url",
            "get_anon_key",
        ]
        .iter()
        .map(|tool| format!("mcp__supabase__{}", tool))
        .collect()
    }
}
