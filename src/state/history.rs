//! Append-only conversation history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{read_json, write_json_atomic, StateError};

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,

    pub content: String,

    pub timestamp: DateTime<Utc>,
}

impl HistoryMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The history file. Append-only: entries are never rewritten or
/// dropped by the core.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<HistoryMessage>, StateError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    /// Append one message.
    pub fn append(&self, message: HistoryMessage) -> Result<(), StateError> {
        let mut messages = self.load()?;
        messages.push(message);
        write_json_atomic(&self.path, &messages)
    }

    /// The most recent `count` messages, oldest first. Fed back into
    /// edit prompts so conversational context survives process restarts.
    pub fn recent(&self, count: usize) -> Result<Vec<HistoryMessage>, StateError> {
        let messages = self.load()?;
        let start = messages.len().saturating_sub(count);
        Ok(messages[start..].to_vec())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));

        store.append(HistoryMessage::user("build a habit tracker")).unwrap();
        store.append(HistoryMessage::assistant("Built Habits.")).unwrap();
        store.append(HistoryMessage::user("add dark mode")).unwrap();

        let messages = store.load().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[2].content.contains("dark mode"));
    }

    #[test]
    fn test_recent_returns_tail() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        for i in 0..5 {
            store.append(HistoryMessage::user(format!("message {}", i))).unwrap();
        }
        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "message 3");
        assert_eq!(recent[1].content, "message 4");
    }

    #[test]
    fn test_empty_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        assert!(store.load().unwrap().is_empty());
    }
}
