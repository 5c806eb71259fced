//! The project workspace.
//!
//! Owns the on-disk layout the agent works inside:
//!
//! ```text
//! <root>/
//! ├── .nanowave/            tool state (project, history, usage, DerivedData)
//! ├── CLAUDE.md             memory file the agent discovers on its own
//! ├── project.yml           emitted project spec
//! ├── project_config.json   MCP server state
//! ├── <AppName>/            primary platform sources
//! ├── Shared/               cross-target types
//! └── Targets/<ExtName>/    extension sources
//! ```
//!
//! Everything the builder stages lands here before the agent session
//! starts; while the session runs, `project_config.json` belongs to the
//! MCP server alone.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::phases::analyzer::AnalysisResult;
use crate::phases::planner::PlannerResult;

/// Name of the tool-state directory.
pub const STATE_DIR: &str = ".nanowave";

/// Memory file the agent reads automatically.
pub const MEMORY_FILE: &str = "CLAUDE.md";

/// One MCP server entry in the agent's MCP config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerSpec {
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Derive the default bundle id from an app name.
pub fn default_bundle_id(app_name: &str) -> String {
    let segment: String = app_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    format!("com.nanowave.{}", segment)
}

/// A project directory and its derived paths.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn project_record_path(&self) -> PathBuf {
        self.state_dir().join("project.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.state_dir().join("history.json")
    }

    pub fn usage_path(&self) -> PathBuf {
        self.state_dir().join("usage.json")
    }

    pub fn derived_data_dir(&self) -> PathBuf {
        self.state_dir().join("DerivedData")
    }

    pub fn mcp_config_path(&self) -> PathBuf {
        self.state_dir().join("mcp.json")
    }

    pub fn memory_path(&self) -> PathBuf {
        self.root.join(MEMORY_FILE)
    }

    pub fn project_yaml_path(&self) -> PathBuf {
        self.root.join("project.yml")
    }

    pub fn xcodeproj_path(&self, app_name: &str) -> PathBuf {
        self.root.join(format!("{}.xcodeproj", app_name))
    }

    pub fn project_yaml_exists(&self) -> bool {
        self.project_yaml_path().is_file()
    }

    /// True when a nanowave project exists here.
    pub fn has_project(&self) -> bool {
        self.project_record_path().is_file()
    }

    /// Create the state directory.
    pub fn ensure_layout(&self) -> io::Result<()> {
        fs::create_dir_all(self.state_dir())
    }

    /// Write the memory file: project conventions plus the plan summary,
    /// so the agent rediscovers them in every session.
    pub fn write_memory_file(
        &self,
        analysis: &AnalysisResult,
        plan: &PlannerResult,
    ) -> io::Result<()> {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", analysis.app_name));
        out.push_str(&format!("{}\n\n", analysis.description));

        out.push_str("## Design\n\n");
        out.push_str(&format!("- Palette: {}\n", plan.design.palette.join(", ")));
        out.push_str(&format!("- Font design: {}\n", plan.design.font_design));
        out.push_str(&format!("- Corner radius: {}\n", plan.design.corner_radius));
        out.push_str(&format!("- Density: {}\n", plan.design.density));
        out.push_str(&format!("- Mood: {}\n\n", plan.design.app_mood));

        out.push_str("## Conventions\n\n");
        out.push_str(&format!(
            "- Primary sources live in {}/; shared types in Shared/.\n",
            analysis.app_name
        ));
        out.push_str("- Theme colors come from AppTheme.swift; never inline hex values.\n");
        out.push_str(
            "- Project changes go through the xcodegen tools; project.yml is tool-owned.\n\n",
        );

        out.push_str("## Planned files (build order)\n\n");
        for path in &plan.build_order {
            let purpose = plan
                .files
                .iter()
                .find(|f| &f.path == path)
                .map(|f| f.purpose.as_str())
                .unwrap_or("");
            out.push_str(&format!("- {}: {}\n", path, purpose));
        }

        fs::write(self.memory_path(), out)
    }

    /// Write the agent's MCP config naming the xcodegen server and any
    /// integration servers.
    pub fn write_mcp_config(
        &self,
        servers: &BTreeMap<String, McpServerSpec>,
    ) -> io::Result<PathBuf> {
        self.ensure_layout()?;
        let config = serde_json::json!({ "mcpServers": servers });
        let path = self.mcp_config_path();
        fs::write(
            &path,
            serde_json::to_string_pretty(&config).map_err(io::Error::other)?,
        )?;
        Ok(path)
    }

    /// The xcodegen MCP server spec for this workspace.
    pub fn xcodegen_server_spec(&self) -> McpServerSpec {
        McpServerSpec {
            command: "nanowave-xcodegen".to_string(),
            args: vec![self.root.to_string_lossy().to_string()],
            env: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::planner::test_fixtures::valid_plan;

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            app_name: "Habits".to_string(),
            description: "Tracks daily habits.".to_string(),
            features: Vec::new(),
            core_flow: String::new(),
            deferred_items: Vec::new(),
        }
    }

    #[test]
    fn test_default_bundle_id() {
        assert_eq!(default_bundle_id("Habits"), "com.nanowave.habits");
        assert_eq!(default_bundle_id("My App 2"), "com.nanowave.myapp2");
    }

    #[test]
    fn test_memory_file_lists_plan_in_build_order() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let plan = valid_plan(&["Habits/AppTheme.swift", "Habits/HabitsApp.swift"]);
        workspace.write_memory_file(&analysis(), &plan).unwrap();

        let memory = fs::read_to_string(workspace.memory_path()).unwrap();
        assert!(memory.contains("# Habits"));
        assert!(memory.contains("AppTheme.swift"));
        let theme_pos = memory.find("Habits/AppTheme.swift").unwrap();
        let app_pos = memory.find("Habits/HabitsApp.swift").unwrap();
        assert!(theme_pos < app_pos);
    }

    #[test]
    fn test_mcp_config_shape() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let mut servers = BTreeMap::new();
        servers.insert("xcodegen".to_string(), workspace.xcodegen_server_spec());
        let path = workspace.write_mcp_config(&servers).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            json["mcpServers"]["xcodegen"]["command"],
            "nanowave-xcodegen"
        );
    }

    #[test]
    fn test_has_project_requires_record() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        assert!(!workspace.has_project());
        workspace.ensure_layout().unwrap();
        fs::write(workspace.project_record_path(), "{}").unwrap();
        assert!(workspace.has_project());
    }
}
