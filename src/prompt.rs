//! Phase prompt composition.
//!
//! A phase system prompt is the phase base prompt, the always-on skills,
//! the phase skill, and (for the phases that write code) the rule-keyed
//! skills the plan selected, plus any integration contributions. The
//! output goes to the agent as append-system-prompt so it layers on top
//! of the workspace memory file the agent discovers itself.

use nanowave_policy::{conditional_notes, Platform};

use crate::skills::{Phase, Skill, SkillRegistry};

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Phases whose prompts carry rule-keyed skills.
fn phase_uses_rule_skills(phase: Phase) -> bool {
    matches!(phase, Phase::Coder | Phase::Editor | Phase::Fixer)
}

fn base_prompt(phase: Phase) -> &'static str {
    match phase {
        Phase::Intent => {
            "You are nanowave's intent router. Classify the request; do not answer it."
        }
        Phase::Analyzer => {
            "You are nanowave's analyzer. Normalize the app description into the analysis contract."
        }
        Phase::Planner => {
            "You are nanowave's planner. Produce a complete, valid build plan for the described app."
        }
        Phase::Coder => {
            "You are nanowave's builder, working inside the project workspace. Write the planned files and configure the project through the provided tools."
        }
        Phase::Editor => {
            "You are nanowave's editor, working inside an existing project workspace. Apply the requested change."
        }
        Phase::Fixer => {
            "You are nanowave's fixer, working inside an existing project workspace. Repair the reported compile errors."
        }
    }
}

fn render_skill(out: &mut String, skill: &Skill) {
    out.push_str(SECTION_SEPARATOR);
    out.push_str(&format!("## {}\n\n", skill.name));
    out.push_str(&skill.body);
}

/// Composes phase prompts from the registry.
pub struct PromptComposer<'a> {
    registry: &'a SkillRegistry,
}

impl<'a> PromptComposer<'a> {
    pub fn new(registry: &'a SkillRegistry) -> Self {
        Self { registry }
    }

    /// Build the append-system-prompt for a phase.
    ///
    /// `rule_keys` come from the accepted plan and only apply to the
    /// code-writing phases. `contributions` are integration-provided
    /// prompt fragments, appended last.
    pub fn compose(
        &self,
        phase: Phase,
        platform: Option<Platform>,
        rule_keys: &[String],
        contributions: &[String],
    ) -> String {
        let mut out = String::from(base_prompt(phase));

        for skill in self.registry.always() {
            render_skill(&mut out, skill);
        }

        if let Some(skill) = self.registry.phase(phase) {
            render_skill(&mut out, skill);
        }

        if phase_uses_rule_skills(phase) {
            for key in rule_keys {
                match self.registry.rule(key) {
                    Some(skill) => render_skill(&mut out, skill),
                    None => log::warn!("plan rule key '{}' has no skill; skipping", key),
                }
            }
            if let Some(platform) = platform {
                let notes = conditional_notes(platform, rule_keys);
                if !notes.is_empty() {
                    out.push_str(SECTION_SEPARATOR);
                    out.push_str("## platform caveats\n");
                    for (key, note) in notes {
                        out.push_str(&format!("\n- {}: {}", key, note));
                    }
                }
            }
        }

        for contribution in contributions {
            out.push_str(SECTION_SEPARATOR);
            out.push_str(contribution);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composer_fixture() -> SkillRegistry {
        SkillRegistry::load_embedded().unwrap()
    }

    #[test]
    fn test_planner_prompt_has_phase_and_always_skills() {
        let registry = composer_fixture();
        let composer = PromptComposer::new(&registry);
        let prompt = composer.compose(Phase::Planner, None, &[], &[]);
        assert!(prompt.contains("nanowave's planner"));
        assert!(prompt.contains("## planner"));
        assert!(prompt.contains("## swift-conventions"));
        assert!(prompt.contains("## project-layout"));
    }

    #[test]
    fn test_rule_skills_only_in_code_phases() {
        let registry = composer_fixture();
        let composer = PromptComposer::new(&registry);
        let keys = vec!["haptics".to_string()];

        let planner = composer.compose(Phase::Planner, Some(Platform::Ios), &keys, &[]);
        assert!(!planner.contains("## haptics"));

        let coder = composer.compose(Phase::Coder, Some(Platform::Ios), &keys, &[]);
        assert!(coder.contains("## haptics"));
    }

    #[test]
    fn test_conditional_note_surfaces_in_coder_prompt() {
        let registry = composer_fixture();
        let composer = PromptComposer::new(&registry);
        let keys = vec!["haptics".to_string()];
        let prompt = composer.compose(Phase::Coder, Some(Platform::Watchos), &keys, &[]);
        assert!(prompt.contains("platform caveats"));
        assert!(prompt.contains("preset WKHaptic"));
    }

    #[test]
    fn test_unknown_rule_key_is_skipped() {
        let registry = composer_fixture();
        let composer = PromptComposer::new(&registry);
        let keys = vec!["not-a-key".to_string()];
        let prompt = composer.compose(Phase::Coder, Some(Platform::Ios), &keys, &[]);
        assert!(!prompt.contains("not-a-key"));
    }

    #[test]
    fn test_contributions_appended() {
        let registry = composer_fixture();
        let composer = PromptComposer::new(&registry);
        let prompt = composer.compose(
            Phase::Coder,
            Some(Platform::Ios),
            &[],
            &["## supabase\nUse the supabase client.".to_string()],
        );
        assert!(prompt.ends_with("Use the supabase client."));
    }
}
