//! Simulator control for `nanowave run` and `nanowave open`.
//!
//! Thin wrappers over `xcrun simctl` and `open`; stderr from the
//! external commands is surfaced verbatim.

use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

use nanowave_policy::Platform;

use crate::state::Project;
use crate::workspace::Workspace;

/// Errors running or opening a project.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed: {stderr}")]
    Failed {
        command: &'static str,
        stderr: String,
    },

    #[error("no built app at {0}; run a build first")]
    AppNotBuilt(PathBuf),

    #[error("running directly on macOS is not supported; use 'nanowave open'")]
    MacosUnsupported,
}

fn run_checked(command: &'static str, args: &[&str]) -> Result<(), SimulatorError> {
    let output = Command::new(command)
        .args(args)
        .output()
        .map_err(|source| SimulatorError::Spawn { command, source })?;
    if output.status.success() {
        return Ok(());
    }
    Err(SimulatorError::Failed {
        command,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Build-products directory name per platform.
fn products_dir(platform: Platform) -> &'static str {
    match platform {
        Platform::Ios => "Debug-iphonesimulator",
        Platform::Watchos => "Debug-watchsimulator",
        Platform::Tvos => "Debug-appletvsimulator",
        Platform::Visionos => "Debug-xrsimulator",
        Platform::Macos => "Debug",
    }
}

/// The built .app path inside the project's derived data.
pub fn built_app_path(workspace: &Workspace, project: &Project) -> PathBuf {
    workspace
        .derived_data_dir()
        .join("Build")
        .join("Products")
        .join(products_dir(project.platform))
        .join(format!("{}.app", project.name))
}

/// Boot the chosen simulator, install the built app, and launch it.
pub fn run_app(workspace: &Workspace, project: &Project) -> Result<(), SimulatorError> {
    if project.platform == Platform::Macos {
        return Err(SimulatorError::MacosUnsupported);
    }

    let app_path = built_app_path(workspace, project);
    if !app_path.exists() {
        return Err(SimulatorError::AppNotBuilt(app_path));
    }

    let simulator = project.simulator.as_deref().unwrap_or("iPhone 16");

    // Booting an already-booted simulator fails; that is fine.
    if let Err(e) = run_checked("xcrun", &["simctl", "boot", simulator]) {
        log::debug!("simctl boot: {}", e);
    }
    run_checked("open", &["-a", "Simulator"])?;
    run_checked(
        "xcrun",
        &[
            "simctl",
            "install",
            "booted",
            &app_path.to_string_lossy(),
        ],
    )?;
    run_checked(
        "xcrun",
        &["simctl", "launch", "booted", &project.bundle_id],
    )?;
    Ok(())
}

/// Open the generated Xcode project.
pub fn open_project(workspace: &Workspace, project: &Project) -> Result<(), SimulatorError> {
    let xcodeproj = workspace.xcodeproj_path(&project.name);
    run_checked("open", &[&xcodeproj.to_string_lossy()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_dir_per_platform() {
        assert_eq!(products_dir(Platform::Ios), "Debug-iphonesimulator");
        assert_eq!(products_dir(Platform::Watchos), "Debug-watchsimulator");
        assert_eq!(products_dir(Platform::Macos), "Debug");
    }

    #[test]
    fn test_built_app_path_shape() {
        let workspace = Workspace::new("/proj");
        let project = Project::new("Habits", "/proj", "com.nanowave.habits", Platform::Ios);
        let path = built_app_path(&workspace, &project);
        assert!(path
            .to_string_lossy()
            .ends_with(".nanowave/DerivedData/Build/Products/Debug-iphonesimulator/Habits.app"));
    }
}
