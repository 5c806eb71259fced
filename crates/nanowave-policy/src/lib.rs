//! Reject-before-generate compatibility matrix.
//!
//! Declares which feature areas and extension kinds each Apple platform
//! supports, so invalid plans are rejected before any code is generated.
//! Enforced twice: on the accepted plan, and again inside the xcodegen MCP
//! server's mutation handlers.

mod matrix;
mod violation;

pub use matrix::{
    extension_alternative, extension_support, feature_alternative, feature_support,
    KNOWN_RULE_KEYS,
};
pub use violation::{PolicyViolation, ViolationKind};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Apple platforms nanowave can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Watchos,
    Tvos,
    Visionos,
    Macos,
}

impl Platform {
    /// Lowercase identifier used in plans and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Watchos => "watchos",
            Platform::Tvos => "tvos",
            Platform::Visionos => "visionos",
            Platform::Macos => "macos",
        }
    }

    /// Vendor spelling used in project.yml and destination strings.
    pub fn xcode_name(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS",
            Platform::Watchos => "watchOS",
            Platform::Tvos => "tvOS",
            Platform::Visionos => "visionOS",
            Platform::Macos => "macOS",
        }
    }

    /// Simulator destination platform string for xcodebuild.
    pub fn simulator_destination(&self) -> &'static str {
        match self {
            Platform::Ios => "iOS Simulator",
            Platform::Watchos => "watchOS Simulator",
            Platform::Tvos => "tvOS Simulator",
            Platform::Visionos => "visionOS Simulator",
            Platform::Macos => "macOS",
        }
    }

    /// Default deployment target emitted into project.yml.
    pub fn default_deployment_target(&self) -> &'static str {
        match self {
            Platform::Ios => "17.0",
            Platform::Watchos => "10.0",
            Platform::Tvos => "17.0",
            Platform::Visionos => "1.0",
            Platform::Macos => "14.0",
        }
    }

    pub fn all() -> &'static [Platform] {
        &[
            Platform::Ios,
            Platform::Watchos,
            Platform::Tvos,
            Platform::Visionos,
            Platform::Macos,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "watchos" => Ok(Platform::Watchos),
            "tvos" => Ok(Platform::Tvos),
            "visionos" => Ok(Platform::Visionos),
            "macos" => Ok(Platform::Macos),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// App-extension kinds with generated target templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    Widget,
    LiveActivity,
    Share,
    NotificationService,
    Safari,
    AppClip,
    TvTopShelf,
}

impl ExtensionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionKind::Widget => "widget",
            ExtensionKind::LiveActivity => "live_activity",
            ExtensionKind::Share => "share",
            ExtensionKind::NotificationService => "notification_service",
            ExtensionKind::Safari => "safari",
            ExtensionKind::AppClip => "app_clip",
            ExtensionKind::TvTopShelf => "tv_top_shelf",
        }
    }

    /// Bundle-id suffix for the extension target. Never contains
    /// underscores; bundle-id segments with underscores fail code signing.
    pub fn bundle_suffix(&self) -> &'static str {
        match self {
            ExtensionKind::Widget => "widget",
            ExtensionKind::LiveActivity => "liveactivity",
            ExtensionKind::Share => "share",
            ExtensionKind::NotificationService => "notificationservice",
            ExtensionKind::Safari => "safari",
            ExtensionKind::AppClip => "clip",
            ExtensionKind::TvTopShelf => "topshelf",
        }
    }

    /// Default target name when the plan does not provide one.
    pub fn default_target_name(&self, app_name: &str) -> String {
        match self {
            ExtensionKind::Widget => format!("{}Widget", app_name),
            ExtensionKind::LiveActivity => format!("{}LiveActivity", app_name),
            ExtensionKind::Share => format!("{}Share", app_name),
            ExtensionKind::NotificationService => format!("{}NotificationService", app_name),
            ExtensionKind::Safari => format!("{}Safari", app_name),
            ExtensionKind::AppClip => format!("{}Clip", app_name),
            ExtensionKind::TvTopShelf => format!("{}TopShelf", app_name),
        }
    }

    pub fn all() -> &'static [ExtensionKind] {
        &[
            ExtensionKind::Widget,
            ExtensionKind::LiveActivity,
            ExtensionKind::Share,
            ExtensionKind::NotificationService,
            ExtensionKind::Safari,
            ExtensionKind::AppClip,
            ExtensionKind::TvTopShelf,
        ]
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "widget" => Ok(ExtensionKind::Widget),
            "live_activity" => Ok(ExtensionKind::LiveActivity),
            "share" => Ok(ExtensionKind::Share),
            "notification_service" => Ok(ExtensionKind::NotificationService),
            "safari" => Ok(ExtensionKind::Safari),
            "app_clip" => Ok(ExtensionKind::AppClip),
            "tv_top_shelf" => Ok(ExtensionKind::TvTopShelf),
            other => Err(format!("unknown extension kind: {}", other)),
        }
    }
}

/// iOS device families a plan may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Iphone,
    Ipad,
    Universal,
}

impl DeviceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFamily::Iphone => "iphone",
            DeviceFamily::Ipad => "ipad",
            DeviceFamily::Universal => "universal",
        }
    }

    /// Value for the TARGETED_DEVICE_FAMILY build setting.
    pub fn targeted_device_family(&self) -> &'static str {
        match self {
            DeviceFamily::Iphone => "1",
            DeviceFamily::Ipad => "2",
            DeviceFamily::Universal => "1,2",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "iphone" => Ok(DeviceFamily::Iphone),
            "ipad" => Ok(DeviceFamily::Ipad),
            "universal" => Ok(DeviceFamily::Universal),
            other => Err(format!("unknown device family: {}", other)),
        }
    }
}

/// Target graph for a watchOS project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchProjectShape {
    /// Watch app with a thin container; no iPhone experience.
    WatchOnly,
    /// Full iOS app with a companion watch app.
    PairedIosWatch,
}

impl WatchProjectShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchProjectShape::WatchOnly => "watch_only",
            WatchProjectShape::PairedIosWatch => "paired_ios_watch",
        }
    }
}

impl fmt::Display for WatchProjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchProjectShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "watch_only" => Ok(WatchProjectShape::WatchOnly),
            "paired_ios_watch" => Ok(WatchProjectShape::PairedIosWatch),
            other => Err(format!("unknown watch project shape: {}", other)),
        }
    }
}

/// Support status for a (platform, feature) or (platform, extension) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Supported,
    /// Works with a caveat the build prompt must carry.
    Conditional(&'static str),
    Unsupported,
    /// Not exercised yet; treated as unsupported at plan time.
    Unverified,
}

impl Support {
    /// Whether a plan carrying this pair is accepted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Support::Supported | Support::Conditional(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Support::Supported => "supported",
            Support::Conditional(_) => "conditional",
            Support::Unsupported => "unsupported",
            Support::Unverified => "unverified",
        }
    }

    /// The caveat note, for conditional statuses.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            Support::Conditional(note) => Some(note),
            _ => None,
        }
    }
}

impl fmt::Display for Support {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check one rule key against the matrix.
pub fn check_rule_key(platform: Platform, key: &str) -> Result<Support, PolicyViolation> {
    let support = feature_support(platform, key);
    if support.is_allowed() {
        Ok(support)
    } else {
        Err(PolicyViolation::feature(platform, key, support))
    }
}

/// Check one extension kind against the matrix.
pub fn check_extension_kind(
    platform: Platform,
    kind: ExtensionKind,
) -> Result<Support, PolicyViolation> {
    let support = extension_support(platform, kind);
    if support.is_allowed() {
        Ok(support)
    } else {
        Err(PolicyViolation::extension(platform, kind, support))
    }
}

/// Collect the conditional-use notes for a set of rule keys, for inclusion
/// in the build prompt.
pub fn conditional_notes(platform: Platform, rule_keys: &[String]) -> Vec<(String, &'static str)> {
    rule_keys
        .iter()
        .filter_map(|key| {
            feature_support(platform, key)
                .note()
                .map(|note| (key.clone(), note))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_round_trip() {
        for platform in Platform::all() {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), *platform);
        }
    }

    #[test]
    fn test_extension_kind_round_trip() {
        for kind in ExtensionKind::all() {
            assert_eq!(kind.as_str().parse::<ExtensionKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_bundle_suffixes_have_no_underscores() {
        for kind in ExtensionKind::all() {
            assert!(
                !kind.bundle_suffix().contains('_'),
                "suffix for {} contains an underscore",
                kind
            );
        }
    }

    #[test]
    fn test_widget_rejected_on_tvos() {
        let err = check_extension_kind(Platform::Tvos, ExtensionKind::Widget).unwrap_err();
        assert_eq!(err.platform, Platform::Tvos);
        assert!(err.suggestion.is_some());
        assert!(err.to_string().contains("tv_top_shelf"));
    }

    #[test]
    fn test_top_shelf_allowed_on_tvos() {
        assert!(check_extension_kind(Platform::Tvos, ExtensionKind::TvTopShelf).is_ok());
    }

    #[test]
    fn test_conditional_passes_with_note() {
        let support = check_rule_key(Platform::Watchos, "haptics").unwrap();
        assert!(matches!(support, Support::Conditional(_)));
        assert!(support.note().unwrap().contains("preset"));
    }

    #[test]
    fn test_conditional_notes_collected() {
        let keys = vec!["haptics".to_string(), "swiftdata".to_string()];
        let notes = conditional_notes(Platform::Watchos, &keys);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "haptics");
    }
}
