//! The persisted project record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nanowave_policy::{DeviceFamily, Platform};

use super::{read_json, write_json_atomic, StateError};

/// Lifecycle status of a project. The core never deletes projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Created but the first build did not finish.
    Draft,
    /// Built; the normal working state.
    Active,
    /// Built with a recorded shortfall (gate or fix budget exhausted).
    Partial,
}

/// The project record stored at `.nanowave/project.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable project id (ULID).
    pub id: String,

    pub name: String,

    pub status: ProjectStatus,

    pub project_path: PathBuf,

    pub bundle_id: String,

    pub platform: Platform,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_family: Option<DeviceFamily>,

    /// Agent session to resume on the next edit or fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Chosen simulator for compile, run, and fix destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator: Option<String>,

    /// Rule keys from the accepted plan; reloaded into edit and fix
    /// prompts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_keys: Vec<String>,

    /// Active integration ids from the accepted plan.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integrations: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a draft record for a new build.
    pub fn new(
        name: impl Into<String>,
        project_path: impl Into<PathBuf>,
        bundle_id: impl Into<String>,
        platform: Platform,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            name: name.into(),
            status: ProjectStatus::Draft,
            project_path: project_path.into(),
            bundle_id: bundle_id.into(),
            platform,
            platforms: Vec::new(),
            device_family: None,
            session_id: None,
            simulator: None,
            rule_keys: Vec::new(),
            integrations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Load from `.nanowave/project.json`, when present.
    pub fn load(path: &Path) -> Result<Option<Self>, StateError> {
        read_json(path)
    }

    /// Store atomically, refreshing `updated_at`.
    pub fn store(&mut self, path: &Path) -> Result<(), StateError> {
        self.updated_at = Utc::now();
        write_json_atomic(path, self)
    }
}
