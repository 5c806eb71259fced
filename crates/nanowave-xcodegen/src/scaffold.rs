//! Placeholder scaffolding for extension targets.
//!
//! `add_extension` creates the target source directory and the shared
//! types directory with placeholder files, so `xcodegen generate` and a
//! first compile succeed before the agent has written real code.

use std::fs;
use std::io;
use std::path::Path;

use nanowave_policy::ExtensionKind;

use crate::config::ExtensionConfig;

/// Create `Targets/<Name>/` and `Shared/` with compilable placeholders.
/// Existing files are never overwritten.
pub fn scaffold_extension(project_dir: &Path, ext: &ExtensionConfig) -> io::Result<()> {
    let target_dir = project_dir.join("Targets").join(&ext.name);
    fs::create_dir_all(&target_dir)?;

    let placeholder = target_dir.join(format!("{}.swift", ext.name));
    if !placeholder.exists() {
        fs::write(&placeholder, placeholder_source(ext))?;
    }

    let shared_dir = project_dir.join("Shared");
    fs::create_dir_all(&shared_dir)?;
    let shared_placeholder = shared_dir.join("SharedTypes.swift");
    if !shared_placeholder.exists() {
        fs::write(
            &shared_placeholder,
            "import Foundation\n\n// Types shared between the app and its extension targets.\n",
        )?;
    }

    Ok(())
}

/// A minimal compiling source for the extension kind.
fn placeholder_source(ext: &ExtensionConfig) -> String {
    match ext.kind {
        ExtensionKind::Widget | ExtensionKind::LiveActivity => format!(
            "import WidgetKit\nimport SwiftUI\n\n@main\nstruct {name}Bundle: WidgetBundle {{\n    var body: some Widget {{\n        {name}Entry()\n    }}\n}}\n\nstruct {name}Entry: Widget {{\n    var body: some WidgetConfiguration {{\n        StaticConfiguration(kind: \"{name}\", provider: PlaceholderProvider()) {{ _ in\n            Text(\"{name}\")\n        }}\n    }}\n}}\n\nstruct PlaceholderProvider: TimelineProvider {{\n    func placeholder(in context: Context) -> SimpleEntry {{ SimpleEntry(date: .now) }}\n    func getSnapshot(in context: Context, completion: @escaping (SimpleEntry) -> Void) {{\n        completion(SimpleEntry(date: .now))\n    }}\n    func getTimeline(in context: Context, completion: @escaping (Timeline<SimpleEntry>) -> Void) {{\n        completion(Timeline(entries: [SimpleEntry(date: .now)], policy: .never))\n    }}\n}}\n\nstruct SimpleEntry: TimelineEntry {{\n    let date: Date\n}}\n",
            name = ext.name
        ),
        ExtensionKind::Share => format!(
            "import UIKit\nimport Social\n\nclass ShareViewController: SLComposeServiceViewController {{\n    override func isContentValid() -> Bool {{ true }}\n    override func didSelectPost() {{\n        extensionContext!.completeRequest(returningItems: [])\n    }}\n    override func configurationItems() -> [Any]! {{ [] }}\n}}\n// {name}\n",
            name = ext.name
        ),
        ExtensionKind::NotificationService => "import UserNotifications\n\nclass NotificationService: UNNotificationServiceExtension {\n    override func didReceive(\n        _ request: UNNotificationRequest,\n        withContentHandler contentHandler: @escaping (UNNotificationContent) -> Void\n    ) {\n        contentHandler(request.content)\n    }\n}\n".to_string(),
        ExtensionKind::Safari => "import SafariServices\n\nclass SafariWebExtensionHandler: NSObject, NSExtensionRequestHandling {\n    func beginRequest(with context: NSExtensionContext) {\n        context.completeRequest(returningItems: nil)\n    }\n}\n".to_string(),
        ExtensionKind::AppClip => format!(
            "import SwiftUI\n\n@main\nstruct {name}App: App {{\n    var body: some Scene {{\n        WindowGroup {{\n            Text(\"{name}\")\n        }}\n    }}\n}}\n",
            name = ext.name
        ),
        ExtensionKind::TvTopShelf => "import TVServices\n\nclass ContentProvider: TVTopShelfContentProvider {\n    override func loadTopShelfContent(\n        completionHandler: @escaping (TVTopShelfContent?) -> Void\n    ) {\n        completionHandler(nil)\n    }\n}\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ext(kind: ExtensionKind, name: &str) -> ExtensionConfig {
        ExtensionConfig {
            kind,
            name: name.to_string(),
            purpose: String::new(),
            info_plist: BTreeMap::new(),
            entitlements: BTreeMap::new(),
        }
    }

    #[test]
    fn test_scaffold_creates_target_and_shared_dirs() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_extension(dir.path(), &ext(ExtensionKind::Widget, "HabitsWidget")).unwrap();

        let placeholder = dir.path().join("Targets/HabitsWidget/HabitsWidget.swift");
        assert!(placeholder.exists());
        assert!(dir.path().join("Shared/SharedTypes.swift").exists());

        let source = fs::read_to_string(&placeholder).unwrap();
        assert!(source.contains("WidgetBundle"));
    }

    #[test]
    fn test_scaffold_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let target_dir = dir.path().join("Targets/HabitsWidget");
        fs::create_dir_all(&target_dir).unwrap();
        let placeholder = target_dir.join("HabitsWidget.swift");
        fs::write(&placeholder, "// real code\n").unwrap();

        scaffold_extension(dir.path(), &ext(ExtensionKind::Widget, "HabitsWidget")).unwrap();
        assert_eq!(fs::read_to_string(&placeholder).unwrap(), "// real code\n");
    }

    #[test]
    fn test_every_kind_has_a_placeholder() {
        for kind in ExtensionKind::all() {
            let source = placeholder_source(&ext(*kind, "Sample"));
            assert!(!source.is_empty());
        }
    }
}
