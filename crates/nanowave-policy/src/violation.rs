//! Structured rejection surface.

use std::fmt;

use crate::matrix::{extension_alternative, feature_alternative};
use crate::{ExtensionKind, Platform, Support};

/// What kind of request the matrix rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Feature,
    Extension,
}

/// A rejected (platform, key) pair, with the status that caused the
/// rejection and a recommended alternative where one exists. Nothing is
/// silently downgraded; the caller surfaces this to the user or the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    pub kind: ViolationKind,
    pub key: String,
    pub platform: Platform,
    pub status: &'static str,
    pub suggestion: Option<&'static str>,
}

impl PolicyViolation {
    pub(crate) fn feature(platform: Platform, key: &str, status: Support) -> Self {
        Self {
            kind: ViolationKind::Feature,
            key: key.to_string(),
            platform,
            status: status.as_str(),
            suggestion: feature_alternative(platform, key),
        }
    }

    pub(crate) fn extension(platform: Platform, kind: ExtensionKind, status: Support) -> Self {
        Self {
            kind: ViolationKind::Extension,
            key: kind.as_str().to_string(),
            platform,
            status: status.as_str(),
            suggestion: extension_alternative(platform, kind),
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = match self.kind {
            ViolationKind::Feature => "feature",
            ViolationKind::Extension => "extension kind",
        };
        write!(
            f,
            "{} '{}' is {} on {}",
            noun, self.key, self.status, self.platform
        )?;
        if let Some(suggestion) = self.suggestion {
            write!(f, "; {}", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for PolicyViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check_extension_kind;

    #[test]
    fn test_display_names_key_platform_status() {
        let err = check_extension_kind(Platform::Watchos, ExtensionKind::Share).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("share"));
        assert!(msg.contains("watchos"));
        assert!(msg.contains("unsupported"));
    }

    #[test]
    fn test_suggestion_included_when_present() {
        let err = check_extension_kind(Platform::Tvos, ExtensionKind::LiveActivity).unwrap_err();
        assert!(err.to_string().contains("tv_top_shelf"));
    }
}
