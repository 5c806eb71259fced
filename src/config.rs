//! User-level tool configuration.
//!
//! Loaded from `~/.config/nanowave/config.toml`; every field has a
//! compiled-in default and CLI flags override the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent::DEFAULT_AGENT_BINARY;
use crate::phases::builder::{BUILD_MAX_TURNS, MAX_CONTINUATION_PASSES};
use crate::phases::fixer::MAX_FIX_ATTEMPTS;

/// Config load errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The tool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Model passed to the agent; None uses the agent default.
    pub model: Option<String>,

    /// Agent binary name or path.
    pub agent_binary: String,

    /// Turn budget for build and edit passes.
    pub max_turns: u32,

    /// Completion-gate continuation budget.
    pub max_continuation_passes: u32,

    /// Compile-fix round budget.
    pub max_fix_attempts: u32,

    /// Soft daily spend ceiling; a new build refuses to start past it.
    pub daily_budget_usd: Option<f64>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            model: None,
            agent_binary: DEFAULT_AGENT_BINARY.to_string(),
            max_turns: BUILD_MAX_TURNS,
            max_continuation_passes: MAX_CONTINUATION_PASSES,
            max_fix_attempts: MAX_FIX_ATTEMPTS,
            daily_budget_usd: None,
        }
    }
}

impl ToolConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("nanowave")
                .join("config.toml"),
        )
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the default file when present; defaults otherwise. A broken
    /// config file is an error, not a silent fallback.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = ToolConfig::default();
        assert_eq!(config.agent_binary, "claude");
        assert_eq!(config.max_continuation_passes, 6);
        assert_eq!(config.max_fix_attempts, 3);
        assert!(config.daily_budget_usd.is_none());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "model = \"opus\"\ndaily_budget_usd = 25.0\n").unwrap();

        let config = ToolConfig::from_file(&path).unwrap();
        assert_eq!(config.model.as_deref(), Some("opus"));
        assert_eq!(config.daily_budget_usd, Some(25.0));
        // Untouched fields keep their defaults.
        assert_eq!(config.max_turns, BUILD_MAX_TURNS);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_turns = \"not a number\"\n").unwrap();
        assert!(matches!(
            ToolConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
