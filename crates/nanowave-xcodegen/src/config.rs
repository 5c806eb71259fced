//! The project configuration the MCP tools mutate.
//!
//! `project_config.json` is the source of truth for project shape while the
//! server runs; `project.yml` is always re-derived from it, never edited.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nanowave_policy::{DeviceFamily, ExtensionKind, Platform, WatchProjectShape};

/// File name of the config in the project root.
pub const PROJECT_CONFIG_FILE: &str = "project_config.json";

/// A usage-description permission entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Info.plist key, e.g. NSCameraUsageDescription.
    pub key: String,

    /// User-facing usage description.
    pub description: String,

    /// Framework the permission belongs to, e.g. AVFoundation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub framework: String,
}

/// A planned or added app extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub kind: ExtensionKind,

    /// Target name, e.g. HabitsWidget.
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub purpose: String,

    /// Extra Info.plist properties for the extension target.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub info_plist: BTreeMap<String, serde_json::Value>,

    /// Extra entitlements for the extension target.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entitlements: BTreeMap<String, serde_json::Value>,
}

/// An entitlement assigned to a target (main app when `target` is None).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub key: String,

    pub value: serde_json::Value,
}

/// A build setting assigned to a target (all targets when `target` is None).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    pub key: String,

    pub value: String,
}

/// A Swift package dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Package name as referenced from target dependencies.
    pub name: String,

    pub url: String,

    /// Minimum version, emitted as `from:`.
    pub min_version: String,

    /// Product names to link; defaults to the package name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
}

/// Everything the emitter needs to produce project.yml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub app_name: String,

    pub bundle_id: String,

    pub platform: Platform,

    /// Additional platforms for multi-platform projects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_project_shape: Option<WatchProjectShape>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_family: Option<DeviceFamily>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<Permission>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<ExtensionConfig>,

    /// Language codes; `en` is always kept first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub localizations: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlements: Vec<Entitlement>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_settings: Vec<BuildSetting>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageDependency>,
}

/// Errors for config load/store operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("project config not found at {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProjectConfig {
    /// Create a config for a fresh project.
    pub fn new(app_name: impl Into<String>, bundle_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            app_name: app_name.into(),
            bundle_id: bundle_id.into(),
            platform,
            platforms: Vec::new(),
            watch_project_shape: None,
            device_family: None,
            permissions: Vec::new(),
            extensions: Vec::new(),
            localizations: Vec::new(),
            entitlements: Vec::new(),
            build_settings: Vec::new(),
            packages: Vec::new(),
        }
    }

    /// Path of the config inside a project directory.
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(PROJECT_CONFIG_FILE)
    }

    /// Load from a project directory.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(project_dir);
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write atomically into a project directory (write-then-rename).
    pub fn store(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let path = Self::path_in(project_dir);
        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Add a permission. Returns false when the key is already present.
    pub fn add_permission(&mut self, permission: Permission) -> bool {
        if self.permissions.iter().any(|p| p.key == permission.key) {
            return false;
        }
        self.permissions.push(permission);
        true
    }

    /// Add an extension. Returns false when a same-kind, same-name
    /// extension is already present.
    pub fn add_extension(&mut self, extension: ExtensionConfig) -> bool {
        if self
            .extensions
            .iter()
            .any(|e| e.kind == extension.kind && e.name == extension.name)
        {
            return false;
        }
        self.extensions.push(extension);
        true
    }

    /// Add or replace an entitlement for a target.
    pub fn set_entitlement(&mut self, entitlement: Entitlement) -> bool {
        if let Some(existing) = self
            .entitlements
            .iter_mut()
            .find(|e| e.target == entitlement.target && e.key == entitlement.key)
        {
            let changed = existing.value != entitlement.value;
            existing.value = entitlement.value;
            return changed;
        }
        self.entitlements.push(entitlement);
        true
    }

    /// Add or replace a build setting for a target.
    pub fn set_build_setting(&mut self, setting: BuildSetting) -> bool {
        if let Some(existing) = self
            .build_settings
            .iter_mut()
            .find(|s| s.target == setting.target && s.key == setting.key)
        {
            let changed = existing.value != setting.value;
            existing.value = setting.value;
            return changed;
        }
        self.build_settings.push(setting);
        true
    }

    /// Merge localization codes, keeping `en` first and dropping
    /// duplicates while preserving insertion order.
    pub fn add_localizations(&mut self, languages: &[String]) -> usize {
        let mut added = 0;
        for lang in languages {
            let lang = lang.trim();
            if lang.is_empty() || self.localizations.iter().any(|l| l == lang) {
                continue;
            }
            self.localizations.push(lang.to_string());
            added += 1;
        }
        if let Some(pos) = self.localizations.iter().position(|l| l == "en") {
            if pos != 0 {
                let en = self.localizations.remove(pos);
                self.localizations.insert(0, en);
            }
        } else if !self.localizations.is_empty() {
            self.localizations.insert(0, "en".to_string());
        }
        added
    }

    /// Add a package. Returns false when the name is already present.
    pub fn add_package(&mut self, package: PackageDependency) -> bool {
        if self.packages.iter().any(|p| p.name == package.name) {
            return false;
        }
        self.packages.push(package);
        true
    }

    /// True when the project builds a paired iOS + watch target graph.
    pub fn is_paired_watch(&self) -> bool {
        self.watch_project_shape == Some(WatchProjectShape::PairedIosWatch)
    }

    /// One-line summary for get_project_config.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}, {}): {} permission(s), {} extension(s), {} package(s)",
            self.app_name,
            self.bundle_id,
            self.platform,
            self.permissions.len(),
            self.extensions.len(),
            self.packages.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProjectConfig {
        ProjectConfig::new("Habits", "com.nanowave.habits", Platform::Ios)
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config();
        cfg.add_permission(Permission {
            key: "NSCameraUsageDescription".to_string(),
            description: "Scan barcodes".to_string(),
            framework: "AVFoundation".to_string(),
        });
        cfg.store(dir.path()).unwrap();

        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.app_name, "Habits");
        assert_eq!(loaded.permissions.len(), 1);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_add_permission_is_idempotent() {
        let mut cfg = config();
        let p = Permission {
            key: "NSCameraUsageDescription".to_string(),
            description: "Scan barcodes".to_string(),
            framework: String::new(),
        };
        assert!(cfg.add_permission(p.clone()));
        assert!(!cfg.add_permission(p));
        assert_eq!(cfg.permissions.len(), 1);
    }

    #[test]
    fn test_set_build_setting_replaces() {
        let mut cfg = config();
        assert!(cfg.set_build_setting(BuildSetting {
            target: None,
            key: "SWIFT_VERSION".to_string(),
            value: "5.9".to_string(),
        }));
        assert!(cfg.set_build_setting(BuildSetting {
            target: None,
            key: "SWIFT_VERSION".to_string(),
            value: "6.0".to_string(),
        }));
        assert_eq!(cfg.build_settings.len(), 1);
        assert_eq!(cfg.build_settings[0].value, "6.0");
    }

    #[test]
    fn test_localizations_keep_en_first() {
        let mut cfg = config();
        cfg.add_localizations(&["fr".to_string(), "de".to_string()]);
        assert_eq!(cfg.localizations[0], "en");

        cfg.add_localizations(&["en".to_string(), "ja".to_string()]);
        assert_eq!(cfg.localizations, vec!["en", "fr", "de", "ja"]);
    }

    #[test]
    fn test_add_extension_dedupes_by_kind_and_name() {
        let mut cfg = config();
        let ext = ExtensionConfig {
            kind: ExtensionKind::Widget,
            name: "HabitsWidget".to_string(),
            purpose: "Weekly grid".to_string(),
            info_plist: BTreeMap::new(),
            entitlements: BTreeMap::new(),
        };
        assert!(cfg.add_extension(ext.clone()));
        assert!(!cfg.add_extension(ext));
    }
}
