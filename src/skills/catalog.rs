//! The embedded skill catalog.
//!
//! Skills ship inside the binary so a nanowave install has no loose
//! prompt files to drift. Rule-keyed skills are named after the policy
//! rule keys; the registry cross-checks that mapping on load.

use super::Phase;

/// Where a skill slots into prompt composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillSource {
    /// Loaded for exactly one phase.
    Phase(Phase),
    /// Loaded into every phase prompt.
    Always,
    /// Loaded when the plan carries the matching rule key.
    Rule(&'static str),
}

/// Every embedded skill with its raw file contents.
pub fn catalog() -> Vec<(SkillSource, &'static str)> {
    vec![
        (
            SkillSource::Phase(Phase::Intent),
            include_str!("../../skills/phases/intent.md"),
        ),
        (
            SkillSource::Phase(Phase::Analyzer),
            include_str!("../../skills/phases/analyzer.md"),
        ),
        (
            SkillSource::Phase(Phase::Planner),
            include_str!("../../skills/phases/planner.md"),
        ),
        (
            SkillSource::Phase(Phase::Coder),
            include_str!("../../skills/phases/coder.md"),
        ),
        (
            SkillSource::Phase(Phase::Editor),
            include_str!("../../skills/phases/editor.md"),
        ),
        (
            SkillSource::Phase(Phase::Fixer),
            include_str!("../../skills/phases/fixer.md"),
        ),
        (
            SkillSource::Always,
            include_str!("../../skills/always/swift-conventions.md"),
        ),
        (
            SkillSource::Always,
            include_str!("../../skills/always/project-layout.md"),
        ),
        (
            SkillSource::Rule("swiftdata"),
            include_str!("../../skills/rules/swiftdata.md"),
        ),
        (
            SkillSource::Rule("networking"),
            include_str!("../../skills/rules/networking.md"),
        ),
        (
            SkillSource::Rule("charts"),
            include_str!("../../skills/rules/charts.md"),
        ),
        (
            SkillSource::Rule("maps"),
            include_str!("../../skills/rules/maps.md"),
        ),
        (
            SkillSource::Rule("camera"),
            include_str!("../../skills/rules/camera.md"),
        ),
        (
            SkillSource::Rule("haptics"),
            include_str!("../../skills/rules/haptics.md"),
        ),
        (
            SkillSource::Rule("notifications"),
            include_str!("../../skills/rules/notifications.md"),
        ),
        (
            SkillSource::Rule("location"),
            include_str!("../../skills/rules/location.md"),
        ),
        (
            SkillSource::Rule("health"),
            include_str!("../../skills/rules/health.md"),
        ),
        (
            SkillSource::Rule("audio"),
            include_str!("../../skills/rules/audio.md"),
        ),
        (
            SkillSource::Rule("watch-connectivity"),
            include_str!("../../skills/rules/watch-connectivity.md"),
        ),
        (
            SkillSource::Rule("widgets"),
            include_str!("../../skills/rules/widgets.md"),
        ),
        (
            SkillSource::Rule("app-intents"),
            include_str!("../../skills/rules/app-intents.md"),
        ),
        (
            SkillSource::Rule("sharing"),
            include_str!("../../skills/rules/sharing.md"),
        ),
    ]
}
