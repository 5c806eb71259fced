//! Typed tool handlers.
//!
//! Every mutating tool follows the same sequence: load
//! `project_config.json`, validate the input against the platform policy,
//! mutate the config, store it, re-emit `project.yml`, and regenerate the
//! Xcode project. Validation failures come back as tool errors the agent
//! can read and correct; they never abort the server.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use nanowave_policy::{check_extension_kind, check_rule_key, ExtensionKind};
use nanowave_protocol::{CallToolResult, ToolDefinition};

use crate::config::{
    BuildSetting, Entitlement, ExtensionConfig, PackageDependency, Permission, ProjectConfig,
};
use crate::emitter::emit_project_yaml;
use crate::generator::ProjectGenerator;
use crate::scaffold::scaffold_extension;

/// Maps well-known usage-description keys to policy rule keys, so
/// unsupported hardware is rejected at the tool boundary too.
fn permission_rule_key(permission_key: &str) -> Option<&'static str> {
    match permission_key {
        "NSCameraUsageDescription" => Some("camera"),
        "NSMicrophoneUsageDescription" => Some("audio"),
        "NSLocationWhenInUseUsageDescription"
        | "NSLocationAlwaysAndWhenInUseUsageDescription" => Some("location"),
        "NSHealthShareUsageDescription" | "NSHealthUpdateUsageDescription" => Some("health"),
        _ => None,
    }
}

/// Dispatches tool calls against a project directory.
pub struct ToolHandler {
    project_dir: PathBuf,
    generator: Box<dyn ProjectGenerator>,
}

impl ToolHandler {
    pub fn new(project_dir: impl Into<PathBuf>, generator: Box<dyn ProjectGenerator>) -> Self {
        Self {
            project_dir: project_dir.into(),
            generator,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// The advertised tool surface.
    pub fn tool_definitions() -> Vec<ToolDefinition> {
        let string = |desc: &str| serde_json::json!({ "type": "string", "description": desc });
        vec![
            ToolDefinition {
                name: "add_permission".to_string(),
                description: "Add a usage-description permission to the app's Info.plist and regenerate the project.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "key": string("Info.plist key, e.g. NSCameraUsageDescription"),
                        "description": string("User-facing reason the app needs this access"),
                        "framework": string("Framework the permission belongs to, e.g. AVFoundation"),
                    },
                    "required": ["key", "description"],
                }),
            },
            ToolDefinition {
                name: "add_extension".to_string(),
                description: "Add an app extension target (widget, live_activity, share, notification_service, safari, app_clip, tv_top_shelf), scaffold its sources, and regenerate the project.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "kind": string("Extension kind"),
                        "name": string("Target name; defaults to a kind-derived name"),
                        "purpose": string("What the extension is for"),
                    },
                    "required": ["kind", "purpose"],
                }),
            },
            ToolDefinition {
                name: "add_entitlement".to_string(),
                description: "Set an entitlement on the main app or a named target and regenerate the project.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "target": string("Target name; omit for the main app"),
                        "key": string("Entitlement key"),
                        "value": { "description": "Entitlement value (string, boolean, or array)" },
                    },
                    "required": ["key", "value"],
                }),
            },
            ToolDefinition {
                name: "add_localization".to_string(),
                description: "Add localization language codes. English (en) always stays first.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "languages": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Language codes, e.g. [\"fr\", \"ja\"]",
                        },
                    },
                    "required": ["languages"],
                }),
            },
            ToolDefinition {
                name: "add_package".to_string(),
                description: "Add a Swift package dependency and regenerate the project.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": string("Package name"),
                        "url": string("Repository URL"),
                        "min_version": string("Minimum version, e.g. 5.0.0"),
                        "products": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Products to link; defaults to the package name",
                        },
                    },
                    "required": ["name", "url", "min_version"],
                }),
            },
            ToolDefinition {
                name: "set_build_setting".to_string(),
                description: "Set a build setting on all targets or a named target and regenerate the project.".to_string(),
                input_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "target": string("Target name; omit to apply to all targets"),
                        "key": string("Build setting name, e.g. DEVELOPMENT_TEAM"),
                        "value": string("Build setting value"),
                    },
                    "required": ["key", "value"],
                }),
            },
            ToolDefinition {
                name: "get_project_config".to_string(),
                description: "Read the current project configuration.".to_string(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            },
            ToolDefinition {
                name: "regenerate_project".to_string(),
                description: "Re-emit project.yml from the configuration and regenerate the Xcode project.".to_string(),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            },
        ]
    }

    /// Handle one tool call. Unknown names and input problems come back as
    /// tool errors, not protocol errors.
    pub fn handle(&self, name: &str, args: &serde_json::Value) -> CallToolResult {
        let result = match name {
            "add_permission" => self.add_permission(args),
            "add_extension" => self.add_extension(args),
            "add_entitlement" => self.add_entitlement(args),
            "add_localization" => self.add_localization(args),
            "add_package" => self.add_package(args),
            "set_build_setting" => self.set_build_setting(args),
            "get_project_config" => self.get_project_config(),
            "regenerate_project" => self.regenerate_project(),
            other => Err(format!("unknown tool: {}", other)),
        };

        match result {
            Ok(message) => CallToolResult::text(message),
            Err(message) => CallToolResult::error(message),
        }
    }

    fn load(&self) -> Result<ProjectConfig, String> {
        ProjectConfig::load(&self.project_dir).map_err(|e| e.to_string())
    }

    /// Persist the config, re-emit project.yml, and run xcodegen.
    fn store_and_regenerate(&self, config: &ProjectConfig) -> Result<(), String> {
        config.store(&self.project_dir).map_err(|e| e.to_string())?;
        let yaml = emit_project_yaml(config).map_err(|e| e.to_string())?;
        fs::write(self.project_dir.join("project.yml"), yaml).map_err(|e| e.to_string())?;
        self.generator
            .generate(&self.project_dir)
            .map_err(|e| e.to_string())
    }

    fn add_permission(&self, args: &serde_json::Value) -> Result<String, String> {
        let key = require_str(args, "key")?;
        let description = require_str(args, "description")?;
        let framework = optional_str(args, "framework").unwrap_or_default();

        let mut config = self.load()?;
        if let Some(rule_key) = permission_rule_key(key) {
            check_rule_key(config.platform, rule_key).map_err(|v| v.to_string())?;
        }

        let added = config.add_permission(Permission {
            key: key.to_string(),
            description: description.to_string(),
            framework: framework.to_string(),
        });
        if !added {
            return Ok(format!("Permission {} already present", key));
        }
        self.store_and_regenerate(&config)?;
        Ok(format!("Added permission {} and regenerated the project", key))
    }

    fn add_extension(&self, args: &serde_json::Value) -> Result<String, String> {
        let kind_str = require_str(args, "kind")?;
        let purpose = require_str(args, "purpose")?;

        let kind = ExtensionKind::from_str(kind_str)?;
        let mut config = self.load()?;
        check_extension_kind(config.platform, kind).map_err(|v| v.to_string())?;

        let name = optional_str(args, "name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| kind.default_target_name(&config.app_name));
        if name.contains('/') || name.contains(char::is_whitespace) {
            return Err(format!("invalid extension target name: {}", name));
        }

        let extension = ExtensionConfig {
            kind,
            name: name.clone(),
            purpose: purpose.to_string(),
            info_plist: Default::default(),
            entitlements: Default::default(),
        };
        let added = config.add_extension(extension.clone());
        if !added {
            return Ok(format!("Extension {} ({}) already present", name, kind));
        }

        scaffold_extension(&self.project_dir, &extension).map_err(|e| e.to_string())?;
        self.store_and_regenerate(&config)?;
        Ok(format!(
            "Added {} extension {} with sources under Targets/{} and regenerated the project",
            kind, name, name
        ))
    }

    fn add_entitlement(&self, args: &serde_json::Value) -> Result<String, String> {
        let key = require_str(args, "key")?;
        let value = args
            .get("value")
            .cloned()
            .ok_or_else(|| "missing required argument: value".to_string())?;
        let target = optional_str(args, "target").map(|s| s.to_string());

        let mut config = self.load()?;
        if let Some(ref target_name) = target {
            if !target_exists(&config, target_name) {
                return Err(format!("unknown target: {}", target_name));
            }
        }

        let changed = config.set_entitlement(Entitlement {
            target: target.clone(),
            key: key.to_string(),
            value,
        });
        if !changed {
            return Ok(format!("Entitlement {} already present", key));
        }
        self.store_and_regenerate(&config)?;
        let scope = target.as_deref().unwrap_or("the main app");
        Ok(format!(
            "Set entitlement {} on {} and regenerated the project",
            key, scope
        ))
    }

    fn add_localization(&self, args: &serde_json::Value) -> Result<String, String> {
        let languages = args
            .get("languages")
            .and_then(|v| v.as_array())
            .ok_or_else(|| "missing required argument: languages".to_string())?;
        let languages: Vec<String> = languages
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.to_string())
            .collect();
        if languages.is_empty() {
            return Err("languages must be a non-empty array of strings".to_string());
        }

        let mut config = self.load()?;
        let added = config.add_localizations(&languages);
        self.store_and_regenerate(&config)?;
        Ok(format!(
            "Added {} localization(s); active: [{}]",
            added,
            config.localizations.join(", ")
        ))
    }

    fn add_package(&self, args: &serde_json::Value) -> Result<String, String> {
        let name = require_str(args, "name")?;
        let url = require_str(args, "url")?;
        let min_version = require_str(args, "min_version")?;
        let products: Vec<String> = args
            .get("products")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mut config = self.load()?;
        let added = config.add_package(PackageDependency {
            name: name.to_string(),
            url: url.to_string(),
            min_version: min_version.to_string(),
            products,
        });
        if !added {
            return Ok(format!("Package {} already present", name));
        }
        self.store_and_regenerate(&config)?;
        Ok(format!("Added package {} and regenerated the project", name))
    }

    fn set_build_setting(&self, args: &serde_json::Value) -> Result<String, String> {
        let key = require_str(args, "key")?;
        let value = require_str(args, "value")?;
        let target = optional_str(args, "target").map(|s| s.to_string());

        let mut config = self.load()?;
        if let Some(ref target_name) = target {
            if !target_exists(&config, target_name) {
                return Err(format!("unknown target: {}", target_name));
            }
        }

        let changed = config.set_build_setting(BuildSetting {
            target: target.clone(),
            key: key.to_string(),
            value: value.to_string(),
        });
        if !changed {
            return Ok(format!("Build setting {} already set to {}", key, value));
        }
        self.store_and_regenerate(&config)?;
        let scope = target.as_deref().unwrap_or("all targets");
        Ok(format!(
            "Set {} = {} on {} and regenerated the project",
            key, value, scope
        ))
    }

    fn get_project_config(&self) -> Result<String, String> {
        let config = self.load()?;
        let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
        Ok(format!("{}\n\n{}", config.summary(), json))
    }

    fn regenerate_project(&self) -> Result<String, String> {
        let config = self.load()?;
        self.store_and_regenerate(&config)?;
        Ok("Regenerated project.yml and the Xcode project".to_string())
    }
}

fn require_str<'a>(args: &'a serde_json::Value, key: &str) -> Result<&'a str, String> {
    match args.get(key).and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(format!("missing required argument: {}", key)),
    }
}

fn optional_str<'a>(args: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Targets the tools may reference: the main app, companion watch
/// targets, and extension targets.
fn target_exists(config: &ProjectConfig, name: &str) -> bool {
    name == config.app_name
        || name == format!("{}Watch", config.app_name)
        || name == format!("{}WatchExtension", config.app_name)
        || config.extensions.iter().any(|e| e.name == name)
}
