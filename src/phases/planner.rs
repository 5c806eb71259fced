//! Phase 2: planning.
//!
//! The planner emits the file-level contract the builder executes: every
//! path, its dependencies, a topological build order, the design system,
//! permissions, extensions, and the platform choice. A plan is accepted
//! only after the invariants below hold; a bad plan never reaches the
//! workspace.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nanowave_policy::{
    check_extension_kind, check_rule_key, DeviceFamily, ExtensionKind, Platform, PolicyViolation,
    WatchProjectShape,
};

use crate::agent::{AgentEvent, AgentRequest, CodingAgent};
use crate::phases::analyzer::AnalysisResult;
use crate::phases::{call_structured, PhaseError, SessionState};
use crate::prompt::PromptComposer;
use crate::skills::Phase;

/// Visual design parameters the coder follows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignSpec {
    /// Exactly five #RRGGBB colors.
    #[serde(default)]
    pub palette: Vec<String>,

    #[serde(default)]
    pub font_design: String,

    #[serde(default)]
    pub corner_radius: f64,

    #[serde(default)]
    pub density: String,

    #[serde(default)]
    pub surfaces: String,

    #[serde(default)]
    pub app_mood: String,
}

/// One planned source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePlan {
    pub path: String,

    pub type_name: String,

    pub purpose: String,

    #[serde(default)]
    pub components: String,

    #[serde(default)]
    pub data_access: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Platform tag for multi-platform plans; empty means primary.
    #[serde(default)]
    pub platform: String,
}

/// One planned data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPlan {
    pub name: String,

    #[serde(default)]
    pub storage: String,

    #[serde(default)]
    pub properties: Vec<String>,
}

/// One planned permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionPlan {
    pub key: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub framework: String,
}

/// One planned app extension. `kind` stays raw so an empty or unknown
/// value is a validation error rather than a silent decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionPlan {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub purpose: String,
}

impl ExtensionPlan {
    pub fn parsed_kind(&self) -> Result<ExtensionKind, PlanError> {
        if self.kind.is_empty() {
            return Err(PlanError::EmptyExtensionKind {
                name: self.name.clone(),
            });
        }
        self.kind
            .parse()
            .map_err(|_| PlanError::UnknownExtensionKind {
                kind: self.kind.clone(),
            })
    }

    /// Target name, defaulting from the kind.
    pub fn target_name(&self, app_name: &str) -> Result<String, PlanError> {
        if !self.name.is_empty() {
            return Ok(self.name.clone());
        }
        Ok(self.parsed_kind()?.default_target_name(app_name))
    }
}

/// One planned package dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagePlan {
    pub name: String,

    #[serde(default)]
    pub reason: String,
}

fn default_platform() -> Platform {
    Platform::Ios
}

/// The plan contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerResult {
    #[serde(default = "default_platform")]
    pub platform: Platform,

    /// Additional platforms for multi-platform projects.
    #[serde(default)]
    pub platforms: Vec<Platform>,

    #[serde(default)]
    pub device_family: Option<DeviceFamily>,

    #[serde(default)]
    pub watch_project_shape: Option<WatchProjectShape>,

    #[serde(default)]
    pub design: DesignSpec,

    pub files: Vec<FilePlan>,

    #[serde(default)]
    pub models: Vec<ModelPlan>,

    #[serde(default)]
    pub permissions: Vec<PermissionPlan>,

    #[serde(default)]
    pub extensions: Vec<ExtensionPlan>,

    #[serde(default)]
    pub localizations: Vec<String>,

    #[serde(default)]
    pub rule_keys: Vec<String>,

    #[serde(default)]
    pub packages: Vec<PackagePlan>,

    #[serde(default)]
    pub integrations: Vec<String>,

    #[serde(default)]
    pub build_order: Vec<String>,
}

/// Plan validation failures, each naming the offending field.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan has no files")]
    NoFiles,

    #[error("file '{path}' is missing required field '{field}'")]
    MissingField { path: String, field: &'static str },

    #[error("duplicate planned path '{0}'")]
    DuplicatePath(String),

    #[error("file '{file}' depends on '{dependency}', which is not in the plan")]
    UnknownDependency { file: String, dependency: String },

    #[error("file dependencies form a cycle involving: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("build_order is not a permutation of the planned files: {0}")]
    BuildOrderMismatch(String),

    #[error("build_order places '{file}' before its dependency '{dependency}'")]
    BuildOrderViolation { file: String, dependency: String },

    #[error("watch_project_shape requires platform watchos, got {0}")]
    WatchShapeOnNonWatch(Platform),

    #[error("device_family must be empty when watch_project_shape is set")]
    DeviceFamilyWithWatchShape,

    #[error("tvos plans must not set device_family or watch_project_shape")]
    TvosShapeFields,

    #[error("extension '{name}' has an empty kind")]
    EmptyExtensionKind { name: String },

    #[error("unknown extension kind '{kind}'")]
    UnknownExtensionKind { kind: String },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("palette must have exactly 5 colors, got {0}")]
    PaletteSize(usize),

    #[error("palette color '{0}' is not #RRGGBB")]
    PaletteColor(String),

    #[error("path '{path}' is under Targets/ but matches no planned extension")]
    UnplannedExtensionPath { path: String },

    #[error("extension '{name}' has no planned files under Targets/{name}/")]
    ExtensionWithoutSources { name: String },

    #[error("multi-platform plan: file '{path}' needs a platform tag or a Shared/ path")]
    MissingPlatformTag { path: String },
}

impl PlannerResult {
    /// The full platform set: primary plus extras, deduplicated.
    pub fn all_platforms(&self) -> Vec<Platform> {
        let mut set = vec![self.platform];
        for extra in &self.platforms {
            if !set.contains(extra) {
                set.push(*extra);
            }
        }
        set
    }

    /// Validate every plan invariant. `app_name` resolves defaulted
    /// extension target names.
    pub fn validate(&self, app_name: &str) -> Result<(), PlanError> {
        if self.files.is_empty() {
            return Err(PlanError::NoFiles);
        }

        // Mandatory fields and duplicate paths.
        let mut paths: HashSet<&str> = HashSet::new();
        for file in &self.files {
            if file.path.is_empty() {
                return Err(PlanError::MissingField {
                    path: file.type_name.clone(),
                    field: "path",
                });
            }
            if file.type_name.is_empty() {
                return Err(PlanError::MissingField {
                    path: file.path.clone(),
                    field: "type_name",
                });
            }
            if file.purpose.is_empty() {
                return Err(PlanError::MissingField {
                    path: file.path.clone(),
                    field: "purpose",
                });
            }
            if !paths.insert(file.path.as_str()) {
                return Err(PlanError::DuplicatePath(file.path.clone()));
            }
        }

        // Dependency closure.
        for file in &self.files {
            for dependency in &file.depends_on {
                if !paths.contains(dependency.as_str()) {
                    return Err(PlanError::UnknownDependency {
                        file: file.path.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        self.check_acyclic()?;
        self.check_build_order()?;
        self.check_platform_fields()?;
        self.check_extensions(app_name)?;

        for key in &self.rule_keys {
            check_rule_key(self.platform, key)?;
        }

        self.check_palette()?;
        self.check_platform_tags()?;

        Ok(())
    }

    /// Kahn's algorithm over dependency edges; leftovers mean a cycle.
    fn check_acyclic(&self) -> Result<(), PlanError> {
        let mut in_degree: HashMap<&str, usize> =
            self.files.iter().map(|f| (f.path.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for file in &self.files {
            for dependency in &file.depends_on {
                *in_degree.get_mut(file.path.as_str()).unwrap() += 1;
                dependents
                    .entry(dependency.as_str())
                    .or_default()
                    .push(file.path.as_str());
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(path, _)| *path)
            .collect();
        let mut processed = 0;
        while let Some(path) = queue.pop_front() {
            processed += 1;
            for dependent in dependents.get(path).map(|d| d.as_slice()).unwrap_or(&[]) {
                let degree = in_degree.get_mut(dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if processed < self.files.len() {
            let mut remaining: Vec<String> = in_degree
                .iter()
                .filter(|(_, &degree)| degree > 0)
                .map(|(path, _)| path.to_string())
                .collect();
            remaining.sort();
            return Err(PlanError::DependencyCycle(remaining));
        }
        Ok(())
    }

    fn check_build_order(&self) -> Result<(), PlanError> {
        if self.build_order.len() != self.files.len() {
            return Err(PlanError::BuildOrderMismatch(format!(
                "{} entries for {} files",
                self.build_order.len(),
                self.files.len()
            )));
        }
        let mut position: HashMap<&str, usize> = HashMap::new();
        for (index, path) in self.build_order.iter().enumerate() {
            if position.insert(path.as_str(), index).is_some() {
                return Err(PlanError::BuildOrderMismatch(format!(
                    "'{}' appears twice",
                    path
                )));
            }
        }
        for file in &self.files {
            let file_pos = *position.get(file.path.as_str()).ok_or_else(|| {
                PlanError::BuildOrderMismatch(format!("'{}' is missing", file.path))
            })?;
            for dependency in &file.depends_on {
                let dep_pos = position.get(dependency.as_str()).copied().unwrap_or(usize::MAX);
                if dep_pos > file_pos {
                    return Err(PlanError::BuildOrderViolation {
                        file: file.path.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_platform_fields(&self) -> Result<(), PlanError> {
        if let Some(_shape) = self.watch_project_shape {
            if self.platform != Platform::Watchos {
                return Err(PlanError::WatchShapeOnNonWatch(self.platform));
            }
            if self.device_family.is_some() {
                return Err(PlanError::DeviceFamilyWithWatchShape);
            }
        }
        if self.platform == Platform::Tvos
            && (self.device_family.is_some() || self.watch_project_shape.is_some())
        {
            return Err(PlanError::TvosShapeFields);
        }
        Ok(())
    }

    fn check_extensions(&self, app_name: &str) -> Result<(), PlanError> {
        let mut extension_names = HashSet::new();
        for extension in &self.extensions {
            let kind = extension.parsed_kind()?;
            check_extension_kind(self.platform, kind)?;
            extension_names.insert(extension.target_name(app_name)?);
        }

        // Extension sources live under Targets/<Name>/ and nowhere else.
        for file in &self.files {
            if let Some(rest) = file.path.strip_prefix("Targets/") {
                let target = rest.split('/').next().unwrap_or("");
                if !extension_names.contains(target) {
                    return Err(PlanError::UnplannedExtensionPath {
                        path: file.path.clone(),
                    });
                }
            }
        }
        for name in &extension_names {
            let prefix = format!("Targets/{}/", name);
            if !self.files.iter().any(|f| f.path.starts_with(&prefix)) {
                return Err(PlanError::ExtensionWithoutSources { name: name.clone() });
            }
        }
        Ok(())
    }

    fn check_palette(&self) -> Result<(), PlanError> {
        if self.design.palette.len() != 5 {
            return Err(PlanError::PaletteSize(self.design.palette.len()));
        }
        let hex = Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static regex");
        for color in &self.design.palette {
            if !hex.is_match(color) {
                return Err(PlanError::PaletteColor(color.clone()));
            }
        }
        Ok(())
    }

    fn check_platform_tags(&self) -> Result<(), PlanError> {
        if self.all_platforms().len() < 2 {
            return Ok(());
        }
        for file in &self.files {
            if file.platform.is_empty() && !file.path.starts_with("Shared/") {
                return Err(PlanError::MissingPlatformTag {
                    path: file.path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Inputs to a planning call.
pub struct PlanInput<'a> {
    pub analysis: &'a AnalysisResult,

    pub description: &'a str,

    pub images: Vec<PathBuf>,

    pub model: Option<String>,
}

/// Run the planning phase. The returned plan is unvalidated; the
/// pipeline validates before anything touches the workspace.
pub fn plan(
    agent: &dyn CodingAgent,
    composer: &PromptComposer<'_>,
    session: &mut SessionState,
    input: PlanInput<'_>,
    on_event: &mut dyn FnMut(&AgentEvent),
) -> Result<PlannerResult, PhaseError> {
    let message = format!(
        "Analysis:\n{}\n\nOriginal request:\n{}",
        serde_json::to_string_pretty(input.analysis).unwrap_or_default(),
        input.description,
    );

    let mut request = AgentRequest::new(message);
    request.append_system_prompt = Some(composer.compose(Phase::Planner, None, &[], &[]));
    request.model = input.model;
    request.images = input.images;
    request.max_turns = 1;

    call_structured(agent, session, request, "PlannerResult", on_event)
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::valid_plan;
    use super::*;

    #[test]
    fn test_valid_plan_passes() {
        let plan = valid_plan(&["Habits/HabitsApp.swift", "Habits/AppTheme.swift"]);
        plan.validate("Habits").unwrap();
    }

    #[test]
    fn test_empty_plan_rejected() {
        let mut plan = valid_plan(&[]);
        plan.build_order.clear();
        let err = plan.validate("Habits").unwrap_err();
        assert_eq!(err.to_string(), "plan has no files");
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut plan = valid_plan(&["Habits/A.swift", "Habits/B.swift"]);
        plan.files[1].depends_on = vec!["Habits/Missing.swift".to_string()];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::UnknownDependency { .. }
        ));
    }

    #[test]
    fn test_dependency_cycle_rejected() {
        let mut plan = valid_plan(&["Habits/A.swift", "Habits/B.swift"]);
        plan.files[0].depends_on = vec!["Habits/B.swift".to_string()];
        plan.files[1].depends_on = vec!["Habits/A.swift".to_string()];
        match plan.validate("Habits").unwrap_err() {
            PlanError::DependencyCycle(nodes) => assert_eq!(nodes.len(), 2),
            other => panic!("expected cycle, got {}", other),
        }
    }

    #[test]
    fn test_build_order_must_be_permutation() {
        let mut plan = valid_plan(&["Habits/A.swift", "Habits/B.swift"]);
        plan.build_order = vec!["Habits/A.swift".to_string()];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::BuildOrderMismatch(_)
        ));

        let mut plan = valid_plan(&["Habits/A.swift", "Habits/B.swift"]);
        plan.build_order = vec!["Habits/A.swift".to_string(), "Habits/A.swift".to_string()];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::BuildOrderMismatch(_)
        ));
    }

    #[test]
    fn test_build_order_must_respect_dependencies() {
        let mut plan = valid_plan(&["Habits/Model.swift", "Habits/View.swift"]);
        plan.files[1].depends_on = vec!["Habits/Model.swift".to_string()];
        plan.build_order = vec![
            "Habits/View.swift".to_string(),
            "Habits/Model.swift".to_string(),
        ];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::BuildOrderViolation { .. }
        ));
    }

    #[test]
    fn test_one_file_plan() {
        let plan = valid_plan(&["Habits/HabitsApp.swift"]);
        plan.validate("Habits").unwrap();
        assert_eq!(plan.build_order.len(), 1);
    }

    #[test]
    fn test_watch_shape_requires_watchos() {
        let mut plan = valid_plan(&["Workouts/A.swift"]);
        plan.watch_project_shape = Some(WatchProjectShape::PairedIosWatch);
        assert!(matches!(
            plan.validate("Workouts").unwrap_err(),
            PlanError::WatchShapeOnNonWatch(_)
        ));

        plan.platform = Platform::Watchos;
        plan.device_family = Some(DeviceFamily::Iphone);
        assert!(matches!(
            plan.validate("Workouts").unwrap_err(),
            PlanError::DeviceFamilyWithWatchShape
        ));

        plan.device_family = None;
        plan.validate("Workouts").unwrap();
    }

    #[test]
    fn test_tvos_rejects_shape_fields() {
        let mut plan = valid_plan(&["Movies/A.swift"]);
        plan.platform = Platform::Tvos;
        plan.device_family = Some(DeviceFamily::Iphone);
        assert!(matches!(
            plan.validate("Movies").unwrap_err(),
            PlanError::TvosShapeFields
        ));
    }

    #[test]
    fn test_empty_extension_kind_rejected() {
        let mut plan = valid_plan(&["Habits/A.swift", "Targets/HabitsWidget/Widget.swift"]);
        plan.extensions = vec![ExtensionPlan {
            kind: String::new(),
            name: "HabitsWidget".to_string(),
            purpose: "glance".to_string(),
        }];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::EmptyExtensionKind { .. }
        ));
    }

    #[test]
    fn test_widget_on_tvos_rejected_by_policy() {
        let mut plan = valid_plan(&["Movies/A.swift", "Targets/MoviesWidget/Widget.swift"]);
        plan.platform = Platform::Tvos;
        plan.extensions = vec![ExtensionPlan {
            kind: "widget".to_string(),
            name: "MoviesWidget".to_string(),
            purpose: "glance".to_string(),
        }];
        let err = plan.validate("Movies").unwrap_err();
        assert!(err.to_string().contains("tv_top_shelf"));
    }

    #[test]
    fn test_rule_key_legality() {
        let mut plan = valid_plan(&["Movies/A.swift"]);
        plan.platform = Platform::Tvos;
        plan.rule_keys = vec!["camera".to_string()];
        assert!(matches!(
            plan.validate("Movies").unwrap_err(),
            PlanError::Policy(_)
        ));
    }

    #[test]
    fn test_palette_rules() {
        let mut plan = valid_plan(&["Habits/A.swift"]);
        plan.design.palette.pop();
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::PaletteSize(4)
        ));

        let mut plan = valid_plan(&["Habits/A.swift"]);
        plan.design.palette[0] = "red".to_string();
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::PaletteColor(_)
        ));
    }

    #[test]
    fn test_targets_path_requires_planned_extension() {
        let plan = valid_plan(&["Habits/A.swift", "Targets/Rogue/Rogue.swift"]);
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::UnplannedExtensionPath { .. }
        ));
    }

    #[test]
    fn test_extension_needs_planned_sources() {
        let mut plan = valid_plan(&["Habits/A.swift"]);
        plan.extensions = vec![ExtensionPlan {
            kind: "widget".to_string(),
            name: "HabitsWidget".to_string(),
            purpose: "glance".to_string(),
        }];
        assert!(matches!(
            plan.validate("Habits").unwrap_err(),
            PlanError::ExtensionWithoutSources { .. }
        ));
    }

    #[test]
    fn test_multi_platform_needs_tags_or_shared() {
        let mut plan = valid_plan(&[
            "Workouts/A.swift",
            "WorkoutsWatch/Extension/B.swift",
            "Shared/Model.swift",
        ]);
        plan.platform = Platform::Watchos;
        plan.device_family = None;
        plan.watch_project_shape = Some(WatchProjectShape::PairedIosWatch);
        plan.platforms = vec![Platform::Ios, Platform::Watchos];

        // Untagged non-shared files fail.
        assert!(matches!(
            plan.validate("Workouts").unwrap_err(),
            PlanError::MissingPlatformTag { .. }
        ));

        plan.files[0].platform = "ios".to_string();
        plan.files[1].platform = "watchos".to_string();
        plan.validate("Workouts").unwrap();
    }

    #[test]
    fn test_default_platform_is_ios() {
        let json = r#"{"files":[{"path":"A/App.swift","type_name":"App","purpose":"entry"}],"build_order":["A/App.swift"]}"#;
        let plan: PlannerResult = serde_json::from_str(json).unwrap();
        assert_eq!(plan.platform, Platform::Ios);
    }
}
