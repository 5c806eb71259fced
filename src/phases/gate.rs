//! The file-completion gate.
//!
//! After every builder pass the gate audits the workspace against the
//! plan: each planned path must exist and be non-empty. The gate is a
//! floor, not a ceiling: files the agent wrote beyond the plan are
//! accepted and counted. It also recognizes the rename case, where a
//! planned file's basename exists somewhere else in the workspace.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Audit result for one planned path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFileStatus {
    pub path: String,

    pub exists: bool,

    pub byte_size: u64,
}

impl PlannedFileStatus {
    pub fn nonempty(&self) -> bool {
        self.exists && self.byte_size > 0
    }
}

/// The gate's view of a pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCompletionReport {
    pub statuses: Vec<PlannedFileStatus>,

    /// Planned paths absent from the workspace.
    pub missing: Vec<String>,

    /// Planned paths present but zero bytes.
    pub empty: Vec<String>,

    /// Files on disk beyond the plan (counted, never rejected).
    pub extra_files: usize,
}

impl FileCompletionReport {
    /// Every planned file exists and has content.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.empty.is_empty()
    }

    /// Planned files present and non-empty.
    pub fn completed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.nonempty()).count()
    }

    /// The shortfall, for continuation prompts and partial results.
    pub fn shortfall(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .missing
            .iter()
            .chain(self.empty.iter())
            .cloned()
            .collect();
        all.sort();
        all
    }
}

/// Audit the workspace against the planned paths.
pub fn audit(project_dir: &Path, planned_paths: &[String]) -> FileCompletionReport {
    let mut report = FileCompletionReport::default();

    for path in planned_paths {
        let on_disk = project_dir.join(path);
        let byte_size = fs::metadata(&on_disk).map(|m| m.len()).unwrap_or(0);
        let exists = on_disk.is_file();

        if !exists {
            report.missing.push(path.clone());
        } else if byte_size == 0 {
            report.empty.push(path.clone());
        }
        report.statuses.push(PlannedFileStatus {
            path: path.clone(),
            exists,
            byte_size,
        });
    }

    report.extra_files = count_swift_files(project_dir).saturating_sub(report.completed_count());
    report
}

/// Swift files in the workspace, excluding tool-owned directories.
fn count_swift_files(project_dir: &Path) -> usize {
    WalkDir::new(project_dir)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            name != ".nanowave" && !name.ends_with(".xcodeproj")
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().map(|e| e == "swift").unwrap_or(false)
        })
        .count()
}

/// Find a plausible rename for a missing planned path: a same-named file
/// elsewhere in the workspace. Used for the single path-alias
/// continuation.
pub fn find_rename_candidate(project_dir: &Path, missing_path: &str) -> Option<String> {
    let wanted = Path::new(missing_path).file_name()?.to_os_string();
    WalkDir::new(project_dir)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            name != ".nanowave" && !name.ends_with(".xcodeproj")
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name() == wanted.as_os_str())
        .and_then(|entry| {
            entry
                .path()
                .strip_prefix(project_dir)
                .ok()
                .map(|p| p.to_string_lossy().to_string())
        })
}

/// The continuation message for an incomplete pass: exactly the missing
/// and empty paths, nothing else to re-litigate.
pub fn continuation_prompt(report: &FileCompletionReport) -> String {
    let mut out = String::from(
        "The build is not complete. Create the files below at exactly these paths; \
do not modify files that already have content.\n",
    );
    if !report.missing.is_empty() {
        out.push_str("\nMissing files:\n");
        for path in &report.missing {
            out.push_str(&format!("- {}\n", path));
        }
    }
    if !report.empty.is_empty() {
        out.push_str("\nEmpty files that need real content:\n");
        for path in &report.empty {
            out.push_str(&format!("- {}\n", path));
        }
    }
    out.push_str("\nWhen every file is written, call the regenerate_project tool.");
    out
}
