//! Seam over the external `xcodegen` binary.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

/// Errors from project generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to spawn xcodegen: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("xcodegen failed with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Regenerates the Xcode project from project.yml.
pub trait ProjectGenerator: Send {
    fn generate(&self, project_dir: &Path) -> Result<(), GenerateError>;
}

/// Shells out to `xcodegen generate` in the project directory.
pub struct XcodegenCli;

impl ProjectGenerator for XcodegenCli {
    fn generate(&self, project_dir: &Path) -> Result<(), GenerateError> {
        log::debug!("running xcodegen generate in {}", project_dir.display());
        let output = Command::new("xcodegen")
            .arg("generate")
            .current_dir(project_dir)
            .output()
            .map_err(GenerateError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }

        // xcodegen reports spec problems on both streams.
        let mut combined = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stdout);
        }
        Err(GenerateError::Failed {
            status: output.status.to_string(),
            stderr: combined,
        })
    }
}

/// Generator that only records invocations; used by tests.
#[cfg(test)]
pub struct RecordingGenerator {
    pub calls: std::sync::Mutex<Vec<std::path::PathBuf>>,
}

#[cfg(test)]
impl RecordingGenerator {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
impl Default for RecordingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl ProjectGenerator for std::sync::Arc<RecordingGenerator> {
    fn generate(&self, project_dir: &Path) -> Result<(), GenerateError> {
        self.calls.lock().unwrap().push(project_dir.to_path_buf());
        Ok(())
    }
}
