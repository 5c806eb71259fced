//! The support tables.
//!
//! Rule keys name feature areas the planner can tag; each key also selects
//! a prompt skill. Unknown keys are Unverified, which plan validation
//! treats as unsupported rather than guessing.

use crate::{ExtensionKind, Platform, Support};

/// Rule keys the planner may emit.
pub const KNOWN_RULE_KEYS: &[&str] = &[
    "swiftdata",
    "networking",
    "charts",
    "maps",
    "camera",
    "haptics",
    "notifications",
    "location",
    "health",
    "audio",
    "watch-connectivity",
    "widgets",
    "app-intents",
    "sharing",
];

/// Feature support by platform.
pub fn feature_support(platform: Platform, key: &str) -> Support {
    use Platform::*;
    use Support::*;

    match (platform, key) {
        // Available everywhere.
        (_, "swiftdata") | (_, "networking") | (_, "charts") | (_, "app-intents") => Supported,

        (Ios, "maps") => Supported,
        (Watchos, "maps") => {
            Conditional("use static map snapshots; interactive maps drain the watch battery")
        }
        (Tvos, "maps") | (Visionos, "maps") | (Macos, "maps") => Supported,

        (Ios, "camera") | (Macos, "camera") => Supported,
        (Watchos, "camera") => Unsupported,
        (Tvos, "camera") => Unsupported,
        (Visionos, "camera") => {
            Conditional("main-camera access needs an enterprise entitlement; prefer photo pickers")
        }

        (Ios, "haptics") => Supported,
        (Watchos, "haptics") => {
            Conditional("use preset WKHaptic types, not custom Core Haptics patterns")
        }
        (Tvos, "haptics") | (Visionos, "haptics") => Unsupported,
        (Macos, "haptics") => Conditional("force-touch trackpad feedback only"),

        (Ios, "notifications") | (Watchos, "notifications") | (Macos, "notifications")
        | (Visionos, "notifications") => Supported,
        (Tvos, "notifications") => Unsupported,

        (Ios, "location") | (Watchos, "location") | (Macos, "location")
        | (Visionos, "location") => Supported,
        (Tvos, "location") => Unsupported,

        (Ios, "health") | (Watchos, "health") => Supported,
        (Visionos, "health") => Unverified,
        (Tvos, "health") | (Macos, "health") => Unsupported,

        (Ios, "audio") | (Macos, "audio") | (Tvos, "audio") | (Visionos, "audio") => Supported,
        (Watchos, "audio") => {
            Conditional("background audio on watchOS requires a workout or audio session type")
        }

        (Ios, "watch-connectivity") | (Watchos, "watch-connectivity") => Supported,
        (Tvos, "watch-connectivity") | (Visionos, "watch-connectivity")
        | (Macos, "watch-connectivity") => Unsupported,

        (Ios, "widgets") | (Watchos, "widgets") | (Visionos, "widgets") | (Macos, "widgets") => {
            Supported
        }
        (Tvos, "widgets") => Unsupported,

        (Ios, "sharing") | (Macos, "sharing") | (Visionos, "sharing") => Supported,
        (Watchos, "sharing") | (Tvos, "sharing") => Unsupported,

        // Unknown key: never guess.
        _ => Unverified,
    }
}

/// Extension-kind support by platform.
pub fn extension_support(platform: Platform, kind: ExtensionKind) -> Support {
    use ExtensionKind::*;
    use Platform::*;
    use Support::*;

    match (platform, kind) {
        (Ios, Widget) | (Ios, LiveActivity) | (Ios, Share) | (Ios, NotificationService)
        | (Ios, Safari) | (Ios, AppClip) => Supported,
        (Ios, TvTopShelf) => Unsupported,

        // Watch complications are WidgetKit widgets.
        (Watchos, Widget) => Supported,
        (Watchos, _) => Unsupported,

        (Tvos, TvTopShelf) => Supported,
        (Tvos, _) => Unsupported,

        (Visionos, Widget) | (Visionos, Share) => Supported,
        (Visionos, _) => Unsupported,

        (Macos, Widget) | (Macos, Share) | (Macos, Safari) | (Macos, NotificationService) => {
            Supported
        }
        (Macos, _) => Unsupported,
    }
}

/// Suggested alternative for a rejected feature, when one exists.
pub fn feature_alternative(platform: Platform, key: &str) -> Option<&'static str> {
    use Platform::*;

    match (platform, key) {
        (Watchos, "camera") => Some("capture on the paired iPhone and sync via watch-connectivity"),
        (Tvos, "widgets") => Some("use a tv_top_shelf extension for glanceable content"),
        (Tvos, "notifications") => Some("surface updates inside the app on launch"),
        (Tvos, "haptics") => Some("use focus-driven sound and motion cues"),
        (Visionos, "haptics") => Some("use spatial audio cues"),
        (Watchos, "sharing") => Some("share from the paired iPhone app"),
        _ => None,
    }
}

/// Suggested alternative for a rejected extension kind, when one exists.
pub fn extension_alternative(platform: Platform, kind: ExtensionKind) -> Option<&'static str> {
    use ExtensionKind::*;
    use Platform::*;

    match (platform, kind) {
        (Tvos, Widget) | (Tvos, LiveActivity) => {
            Some("tv_top_shelf is the only extension kind on tvOS")
        }
        (Watchos, LiveActivity) => Some("live activities render on the paired iPhone; add them to the iOS target"),
        (Ios, TvTopShelf) => Some("tv_top_shelf only exists on tvOS; use widget on iOS"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_key_resolves_on_every_platform() {
        // The matrix must have an explicit answer for every registered key;
        // (visionos, health) is the one deliberately unverified pair.
        for platform in Platform::all() {
            for key in KNOWN_RULE_KEYS {
                let support = feature_support(*platform, key);
                if *platform == Platform::Visionos && *key == "health" {
                    assert_eq!(support, Support::Unverified);
                } else {
                    assert_ne!(
                        support,
                        Support::Unverified,
                        "no explicit entry for ({}, {})",
                        platform,
                        key
                    );
                }
            }
        }
    }

    #[test]
    fn test_unknown_key_is_unverified() {
        assert_eq!(
            feature_support(Platform::Ios, "quantum-teleport"),
            Support::Unverified
        );
    }

    #[test]
    fn test_ios_supports_all_extensions_but_top_shelf() {
        for kind in ExtensionKind::all() {
            let support = extension_support(Platform::Ios, *kind);
            if *kind == ExtensionKind::TvTopShelf {
                assert!(!support.is_allowed());
            } else {
                assert!(support.is_allowed(), "{} should be allowed on ios", kind);
            }
        }
    }

    #[test]
    fn test_watchos_only_allows_widget() {
        for kind in ExtensionKind::all() {
            let allowed = extension_support(Platform::Watchos, *kind).is_allowed();
            assert_eq!(allowed, *kind == ExtensionKind::Widget);
        }
    }

    #[test]
    fn test_health_unverified_on_visionos() {
        assert_eq!(
            feature_support(Platform::Visionos, "health"),
            Support::Unverified
        );
    }
}
