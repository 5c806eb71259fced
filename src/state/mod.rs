//! On-disk state stores.
//!
//! Three JSON files under `.nanowave/`: the project record, the
//! append-only conversation history, and the rolling daily usage. All
//! writes are write-temp-then-rename so a crash never leaves a torn
//! file. Stores are loaded per pipeline call; nothing is cached in
//! package-level state.

pub mod history;
pub mod project;
pub mod usage;

use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use history::{HistoryMessage, HistoryStore, Role};
pub use project::{Project, ProjectStatus};
pub use usage::{UsageRecord, UsageStore};

/// Errors for store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write a JSON document atomically (write-then-rename).
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load a JSON document, or None when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StateError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}
