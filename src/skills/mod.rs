//! Skill registry.
//!
//! A skill is a metadata-headed prompt fragment:
//!
//! ```text
//! ---
//! name: kebab-case-name
//! description: What it covers. Use when <situation>.
//! ---
//! body (at most 500 lines)
//! ```
//!
//! Skills are organized by phase, an always set loaded into every phase,
//! and rule-keyed skills selected by the plan. The whole catalog is
//! validated on load; a malformed skill is a packaging defect, caught by
//! the catalog test before it can ship.

pub mod catalog;

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use catalog::{catalog, SkillSource};

/// Maximum body length for one skill.
pub const MAX_SKILL_BODY_LINES: usize = 500;

/// Pipeline phases with a dedicated skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Intent,
    Analyzer,
    Planner,
    Coder,
    Editor,
    Fixer,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Intent => "intent",
            Phase::Analyzer => "analyzer",
            Phase::Planner => "planner",
            Phase::Coder => "coder",
            Phase::Editor => "editor",
            Phase::Fixer => "fixer",
        }
    }

    pub fn all() -> &'static [Phase] {
        &[
            Phase::Intent,
            Phase::Analyzer,
            Phase::Planner,
            Phase::Coder,
            Phase::Editor,
            Phase::Fixer,
        ]
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed, validated skill.
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub body: String,
}

/// Skill format violations.
#[derive(Debug, Error)]
pub enum SkillError {
    #[error("skill is missing its metadata header")]
    MissingHeader,

    #[error("skill header is missing field '{0}'")]
    MissingField(&'static str),

    #[error("skill name '{0}' is not kebab-case")]
    InvalidName(String),

    #[error("skill '{0}' description has no 'Use when' clause")]
    MissingUseWhen(String),

    #[error("skill '{name}' body is {lines} lines; the limit is {limit}")]
    BodyTooLong {
        name: String,
        lines: usize,
        limit: usize,
    },

    #[error("duplicate skill for phase {0}")]
    DuplicatePhase(Phase),

    #[error("duplicate rule skill '{0}'")]
    DuplicateRule(String),
}

fn is_kebab_case(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Parse and validate one skill file.
pub fn parse_skill(raw: &str) -> Result<Skill, SkillError> {
    let raw = raw.trim_start_matches('\u{feff}');
    let rest = raw.strip_prefix("---\n").ok_or(SkillError::MissingHeader)?;
    let (header, body) = rest.split_once("\n---").ok_or(SkillError::MissingHeader)?;

    let mut name = None;
    let mut description = None;
    for line in header.lines() {
        if let Some(value) = line.strip_prefix("name:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("description:") {
            description = Some(value.trim().to_string());
        }
    }
    let name = name.filter(|n| !n.is_empty()).ok_or(SkillError::MissingField("name"))?;
    let description = description
        .filter(|d| !d.is_empty())
        .ok_or(SkillError::MissingField("description"))?;

    if !is_kebab_case(&name) {
        return Err(SkillError::InvalidName(name));
    }
    if !description.contains("Use when") {
        return Err(SkillError::MissingUseWhen(name));
    }

    let body = body.trim_start_matches('\n').trim_end().to_string();
    let lines = body.lines().count();
    if lines > MAX_SKILL_BODY_LINES {
        return Err(SkillError::BodyTooLong {
            name,
            lines,
            limit: MAX_SKILL_BODY_LINES,
        });
    }

    Ok(Skill {
        name,
        description,
        body,
    })
}

/// The loaded skill set.
pub struct SkillRegistry {
    phases: HashMap<Phase, Skill>,
    always: Vec<Skill>,
    rules: HashMap<String, Skill>,
}

impl SkillRegistry {
    /// Load and validate the embedded catalog.
    pub fn load_embedded() -> Result<Self, SkillError> {
        let mut phases = HashMap::new();
        let mut always = Vec::new();
        let mut rules = HashMap::new();

        for (source, raw) in catalog() {
            let skill = parse_skill(raw)?;
            match source {
                SkillSource::Phase(phase) => {
                    if phases.insert(phase, skill).is_some() {
                        return Err(SkillError::DuplicatePhase(phase));
                    }
                }
                SkillSource::Always => always.push(skill),
                SkillSource::Rule(key) => {
                    if rules.insert(key.to_string(), skill).is_some() {
                        return Err(SkillError::DuplicateRule(key.to_string()));
                    }
                }
            }
        }

        Ok(Self {
            phases,
            always,
            rules,
        })
    }

    pub fn phase(&self, phase: Phase) -> Option<&Skill> {
        self.phases.get(&phase)
    }

    pub fn always(&self) -> &[Skill] {
        &self.always
    }

    pub fn rule(&self, key: &str) -> Option<&Skill> {
        self.rules.get(key)
    }

    pub fn rule_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.rules.keys().map(|k| k.as_str()).collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_embedded_skill_parses() {
        // The whole catalog must conform to the skill format.
        let registry = SkillRegistry::load_embedded().unwrap();
        for phase in Phase::all() {
            assert!(registry.phase(*phase).is_some(), "no skill for {}", phase);
        }
        assert!(registry.always().len() >= 2);
    }

    #[test]
    fn test_rule_skills_match_policy_rule_keys() {
        let registry = SkillRegistry::load_embedded().unwrap();
        for key in nanowave_policy::KNOWN_RULE_KEYS {
            assert!(
                registry.rule(key).is_some(),
                "policy rule key '{}' has no skill",
                key
            );
        }
        for key in registry.rule_keys() {
            assert!(
                nanowave_policy::KNOWN_RULE_KEYS.contains(&key),
                "skill '{}' has no policy rule key",
                key
            );
        }
    }

    #[test]
    fn test_parse_valid_skill() {
        let raw = "---\nname: my-skill\ndescription: Does things. Use when testing.\n---\nBody line.\n";
        let skill = parse_skill(raw).unwrap();
        assert_eq!(skill.name, "my-skill");
        assert_eq!(skill.body, "Body line.");
    }

    #[test]
    fn test_reject_non_kebab_name() {
        let raw = "---\nname: MySkill\ndescription: Use when testing.\n---\nbody\n";
        assert!(matches!(
            parse_skill(raw),
            Err(SkillError::InvalidName(_))
        ));
    }

    #[test]
    fn test_reject_missing_use_when() {
        let raw = "---\nname: my-skill\ndescription: Does things.\n---\nbody\n";
        assert!(matches!(
            parse_skill(raw),
            Err(SkillError::MissingUseWhen(_))
        ));
    }

    #[test]
    fn test_reject_missing_header() {
        assert!(matches!(
            parse_skill("just a body"),
            Err(SkillError::MissingHeader)
        ));
    }

    #[test]
    fn test_reject_oversized_body() {
        let body: String = std::iter::repeat("line\n").take(501).collect();
        let raw = format!(
            "---\nname: big-skill\ndescription: Use when testing.\n---\n{}",
            body
        );
        assert!(matches!(
            parse_skill(&raw),
            Err(SkillError::BodyTooLong { .. })
        ));
    }

    #[test]
    fn test_skill_names_match_their_keys() {
        // Rule skill names equal their rule keys so prompt labels line up.
        let registry = SkillRegistry::load_embedded().unwrap();
        for key in registry.rule_keys() {
            assert_eq!(registry.rule(key).unwrap().name, key);
        }
    }
}
