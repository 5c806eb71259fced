//! Deterministic project.yml emitter.
//!
//! Emits the XcodeGen project spec for three shapes: single-platform
//! (iOS/tvOS/visionOS/macOS), watch-only, and paired iOS + watch. Field
//! order is fixed, scalar quoting is explicit, and every target's bundle
//! id is validated before a single line is written; an invalid bundle id
//! reaching this module means an upstream validator was bypassed.

use std::fmt::Write as _;

use thiserror::Error;

use nanowave_policy::{ExtensionKind, Platform, WatchProjectShape};

use crate::config::{ExtensionConfig, ProjectConfig};

/// Errors for YAML emission. These indicate upstream validation gaps, not
/// user input problems.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("invalid bundle id '{bundle_id}': {reason}")]
    InvalidBundleId { bundle_id: String, reason: String },

    #[error("watch project shape set for non-watch platform {0}")]
    ShapeMismatch(Platform),

    #[error("app name must not be empty")]
    EmptyAppName,
}

/// Per-kind target template defaults.
struct ExtensionDefaults {
    /// XcodeGen product type.
    product_type: &'static str,
    /// NSExtensionPointIdentifier, when the kind is an NSExtension.
    extension_point: Option<&'static str>,
    /// NSExtensionPrincipalClass, when the template is class-based.
    principal_class: Option<&'static str>,
    /// Whether the target shares data with the main app via an App Group.
    needs_app_group: bool,
}

fn extension_defaults(kind: ExtensionKind) -> ExtensionDefaults {
    match kind {
        ExtensionKind::Widget => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.widgetkit-extension"),
            principal_class: None,
            needs_app_group: true,
        },
        // Live activities ship inside a WidgetKit extension.
        ExtensionKind::LiveActivity => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.widgetkit-extension"),
            principal_class: None,
            needs_app_group: true,
        },
        ExtensionKind::Share => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.share-services"),
            principal_class: Some("ShareViewController"),
            needs_app_group: true,
        },
        ExtensionKind::NotificationService => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.usernotifications.service"),
            principal_class: Some("NotificationService"),
            needs_app_group: false,
        },
        ExtensionKind::Safari => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.Safari.web-extension"),
            principal_class: Some("SafariWebExtensionHandler"),
            needs_app_group: false,
        },
        ExtensionKind::AppClip => ExtensionDefaults {
            product_type: "application",
            extension_point: None,
            principal_class: None,
            needs_app_group: false,
        },
        ExtensionKind::TvTopShelf => ExtensionDefaults {
            product_type: "app-extension",
            extension_point: Some("com.apple.tv-top-shelf"),
            principal_class: Some("ContentProvider"),
            needs_app_group: false,
        },
    }
}

/// Validate a bundle id: non-empty dot-separated segments of
/// `[A-Za-z0-9-]`, no underscores, no trailing dot.
pub fn validate_bundle_id(bundle_id: &str) -> Result<(), EmitError> {
    let invalid = |reason: &str| EmitError::InvalidBundleId {
        bundle_id: bundle_id.to_string(),
        reason: reason.to_string(),
    };

    if bundle_id.is_empty() {
        return Err(invalid("empty"));
    }
    if bundle_id.ends_with('.') {
        return Err(invalid("trailing dot"));
    }
    if bundle_id.contains('_') {
        return Err(invalid("contains underscore"));
    }
    for segment in bundle_id.split('.') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(invalid("segment has invalid characters"));
        }
    }
    Ok(())
}

/// Quote a scalar when YAML would otherwise reinterpret it.
fn yaml_scalar(value: &str) -> String {
    let needs_quote = value.is_empty()
        || value.starts_with(' ')
        || value.ends_with(' ')
        || value.starts_with('-')
        || value.starts_with('?')
        || value
            .chars()
            .any(|c| ":#,[]{}&*!|>'\"%@`\t".contains(c))
        || matches!(
            value.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "null" | "on" | "off" | "~"
        )
        || value.parse::<f64>().is_ok();

    if needs_quote {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Line-oriented YAML writer with two-space indentation.
struct Yaml {
    out: String,
}

impl Yaml {
    fn new() -> Self {
        Self { out: String::new() }
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// `key: value` with scalar quoting.
    fn kv(&mut self, indent: usize, key: &str, value: &str) {
        self.line(indent, &format!("{}: {}", key, yaml_scalar(value)));
    }

    /// `key: value` with the value written verbatim (booleans, flows).
    fn kv_raw(&mut self, indent: usize, key: &str, value: &str) {
        self.line(indent, &format!("{}: {}", key, value));
    }

    /// `key:` opening a nested mapping.
    fn key(&mut self, indent: usize, key: &str) {
        self.line(indent, &format!("{}:", key));
    }

    /// `- value` sequence entry.
    fn item(&mut self, indent: usize, value: &str) {
        self.line(indent, &format!("- {}", yaml_scalar(value)));
    }

    /// Emit a JSON value under `key`, covering the shapes Info.plist and
    /// entitlement values take: scalars, string arrays, empty and nested
    /// objects.
    fn json_kv(&mut self, indent: usize, key: &str, value: &serde_json::Value) {
        match value {
            serde_json::Value::Null => self.kv_raw(indent, key, "null"),
            serde_json::Value::Bool(b) => self.kv_raw(indent, key, if *b { "true" } else { "false" }),
            serde_json::Value::Number(n) => self.kv_raw(indent, key, &n.to_string()),
            serde_json::Value::String(s) => self.kv(indent, key, s),
            serde_json::Value::Array(items) => {
                let mut flow = String::from("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        flow.push_str(", ");
                    }
                    match item {
                        serde_json::Value::String(s) => {
                            let _ = write!(flow, "{}", yaml_scalar(s));
                        }
                        other => {
                            let _ = write!(flow, "{}", other);
                        }
                    }
                }
                flow.push(']');
                self.kv_raw(indent, key, &flow);
            }
            serde_json::Value::Object(map) if map.is_empty() => {
                self.kv_raw(indent, key, "{}");
            }
            serde_json::Value::Object(map) => {
                self.key(indent, key);
                // BTreeMap ordering comes from serde_json's preserve_order
                // being off; sort here regardless so emission never depends
                // on build features.
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for k in keys {
                    self.json_kv(indent + 1, k, &map[k]);
                }
            }
        }
    }
}

/// Emit project.yml for the given configuration.
pub fn emit_project_yaml(config: &ProjectConfig) -> Result<String, EmitError> {
    if config.app_name.is_empty() {
        return Err(EmitError::EmptyAppName);
    }
    validate_bundle_id(&config.bundle_id)?;
    for ext in &config.extensions {
        validate_bundle_id(&extension_bundle_id(config, ext))?;
    }
    if config.watch_project_shape.is_some() && config.platform != Platform::Watchos {
        debug_assert!(false, "watch shape on non-watch platform");
        return Err(EmitError::ShapeMismatch(config.platform));
    }

    let mut yaml = Yaml::new();
    emit_header(&mut yaml, config);
    emit_packages(&mut yaml, config);
    emit_project_settings(&mut yaml, config);

    yaml.key(0, "targets");
    match config.watch_project_shape {
        Some(WatchProjectShape::WatchOnly) => emit_watch_only_targets(&mut yaml, config),
        Some(WatchProjectShape::PairedIosWatch) => emit_paired_targets(&mut yaml, config),
        None => emit_single_platform_targets(&mut yaml, config),
    }

    emit_schemes(&mut yaml, config);

    Ok(yaml.out)
}

fn emit_header(yaml: &mut Yaml, config: &ProjectConfig) {
    yaml.kv(0, "name", &config.app_name);
    yaml.key(0, "options");
    yaml.kv_raw(1, "createIntermediateGroups", "true");
    yaml.key(1, "deploymentTarget");
    let mut platforms: Vec<Platform> = vec![effective_primary_platform(config)];
    for extra in &config.platforms {
        if !platforms.contains(extra) {
            platforms.push(*extra);
        }
    }
    if config.watch_project_shape.is_some() && !platforms.contains(&Platform::Watchos) {
        platforms.push(Platform::Watchos);
    }
    // Fixed order: iOS, watchOS, tvOS, visionOS, macOS.
    for platform in Platform::all() {
        if platforms.contains(platform) {
            yaml.kv(
                2,
                platform.xcode_name(),
                platform.default_deployment_target(),
            );
        }
    }
}

/// The platform of the main app target. Watch shapes anchor on iOS for the
/// container or parent; the watch app target itself stays watchOS.
fn effective_primary_platform(config: &ProjectConfig) -> Platform {
    match config.watch_project_shape {
        Some(_) => Platform::Ios,
        None => config.platform,
    }
}

fn emit_packages(yaml: &mut Yaml, config: &ProjectConfig) {
    if config.packages.is_empty() {
        return;
    }
    yaml.key(0, "packages");
    for package in &config.packages {
        yaml.key(1, &package.name);
        yaml.kv(2, "url", &package.url);
        yaml.kv(2, "from", &package.min_version);
    }
}

fn emit_project_settings(yaml: &mut Yaml, config: &ProjectConfig) {
    yaml.key(0, "settings");
    yaml.key(1, "base");
    yaml.kv(2, "SWIFT_VERSION", "5.9");
    let mut global: Vec<_> = config
        .build_settings
        .iter()
        .filter(|s| s.target.is_none())
        .collect();
    global.sort_by(|a, b| a.key.cmp(&b.key));
    for setting in global {
        yaml.kv(2, &setting.key, &setting.value);
    }
}

fn extension_bundle_id(config: &ProjectConfig, ext: &ExtensionConfig) -> String {
    format!("{}.{}", config.bundle_id, ext.kind.bundle_suffix())
}

fn watch_app_bundle_id(config: &ProjectConfig) -> String {
    format!("{}.watchkitapp", config.bundle_id)
}

fn watch_extension_bundle_id(config: &ProjectConfig) -> String {
    format!("{}.watchkitapp.watchkitextension", config.bundle_id)
}

/// Emit the main-app Info.plist properties in fixed order.
fn emit_app_info(yaml: &mut Yaml, config: &ProjectConfig, indent: usize, platform: Platform) {
    yaml.key(indent, "info");
    yaml.kv(
        indent + 1,
        "path",
        &format!("{}/Info.plist", config.app_name),
    );
    yaml.key(indent + 1, "properties");
    yaml.kv(indent + 2, "CFBundleDisplayName", &config.app_name);
    if platform == Platform::Ios {
        yaml.kv_raw(indent + 2, "UILaunchScreen", "{}");
    }
    if config
        .extensions
        .iter()
        .any(|e| e.kind == ExtensionKind::LiveActivity)
    {
        yaml.kv_raw(indent + 2, "NSSupportsLiveActivities", "true");
    }
    let mut permissions = config.permissions.clone();
    permissions.sort_by(|a, b| a.key.cmp(&b.key));
    for permission in &permissions {
        yaml.kv(indent + 2, &permission.key, &permission.description);
    }
    if !config.localizations.is_empty() {
        let langs: Vec<String> = config
            .localizations
            .iter()
            .map(|l| yaml_scalar(l))
            .collect();
        yaml.kv_raw(
            indent + 2,
            "CFBundleLocalizations",
            &format!("[{}]", langs.join(", ")),
        );
    }
}

/// Entitlements block for the named target (None = main app). The app
/// group for data-sharing extensions is added to the main app implicitly.
fn emit_entitlements(
    yaml: &mut Yaml,
    config: &ProjectConfig,
    indent: usize,
    target: Option<&str>,
    file_dir: &str,
    file_stem: &str,
) {
    let mut entries: Vec<(String, serde_json::Value)> = config
        .entitlements
        .iter()
        .filter(|e| e.target.as_deref() == target)
        .map(|e| (e.key.clone(), e.value.clone()))
        .collect();

    if target.is_none()
        && config
            .extensions
            .iter()
            .any(|e| extension_defaults(e.kind).needs_app_group)
    {
        let group = serde_json::json!([format!("group.{}", config.bundle_id)]);
        if !entries
            .iter()
            .any(|(k, _)| k == "com.apple.security.application-groups")
        {
            entries.push(("com.apple.security.application-groups".to_string(), group));
        }
    }

    if entries.is_empty() {
        return;
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    yaml.key(indent, "entitlements");
    yaml.kv(
        indent + 1,
        "path",
        &format!("{}/{}.entitlements", file_dir, file_stem),
    );
    yaml.key(indent + 1, "properties");
    for (key, value) in &entries {
        yaml.json_kv(indent + 2, key, value);
    }
}

/// Target-scoped build settings, after the fixed leading keys.
fn emit_target_settings(
    yaml: &mut Yaml,
    config: &ProjectConfig,
    indent: usize,
    target: &str,
    bundle_id: &str,
    device_family: Option<&str>,
) {
    yaml.key(indent, "settings");
    yaml.key(indent + 1, "base");
    yaml.kv(indent + 2, "PRODUCT_BUNDLE_IDENTIFIER", bundle_id);
    if let Some(family) = device_family {
        yaml.kv(indent + 2, "TARGETED_DEVICE_FAMILY", family);
    }
    let mut scoped: Vec<_> = config
        .build_settings
        .iter()
        .filter(|s| s.target.as_deref() == Some(target))
        .collect();
    scoped.sort_by(|a, b| a.key.cmp(&b.key));
    for setting in scoped {
        yaml.kv(indent + 2, &setting.key, &setting.value);
    }
}

fn device_family_setting(config: &ProjectConfig, platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::Ios => Some(
            config
                .device_family
                .map(|f| f.targeted_device_family())
                .unwrap_or("1,2"),
        ),
        Platform::Watchos => Some("4"),
        Platform::Tvos => Some("3"),
        Platform::Visionos | Platform::Macos => None,
    }
}

fn emit_main_app_target(yaml: &mut Yaml, config: &ProjectConfig, platform: Platform) {
    yaml.key(1, &config.app_name);
    yaml.kv(2, "type", "application");
    yaml.kv(2, "platform", platform.xcode_name());
    yaml.kv(2, "deploymentTarget", platform.default_deployment_target());
    yaml.key(2, "sources");
    yaml.item(3, &config.app_name);
    if !config.extensions.is_empty() || config.watch_project_shape.is_some() {
        yaml.item(3, "Shared");
    }
    emit_app_info(yaml, config, 2, platform);
    emit_entitlements(
        yaml,
        config,
        2,
        None,
        &config.app_name,
        &config.app_name,
    );
    emit_target_settings(
        yaml,
        config,
        2,
        &config.app_name,
        &config.bundle_id,
        device_family_setting(config, platform),
    );
    emit_main_app_dependencies(yaml, config);
}

fn emit_main_app_dependencies(yaml: &mut Yaml, config: &ProjectConfig) {
    let has_extensions = !config.extensions.is_empty();
    let has_packages = !config.packages.is_empty();
    let has_watch = config.watch_project_shape.is_some();
    if !has_extensions && !has_packages && !has_watch {
        return;
    }
    yaml.key(2, "dependencies");
    if has_watch {
        yaml.line(3, &format!("- target: {}Watch", config.app_name));
    }
    for ext in &config.extensions {
        yaml.line(3, &format!("- target: {}", ext.name));
    }
    for package in &config.packages {
        yaml.line(3, &format!("- package: {}", package.name));
        if !package.products.is_empty() {
            let products: Vec<String> =
                package.products.iter().map(|p| yaml_scalar(p)).collect();
            yaml.kv_raw(4, "products", &format!("[{}]", products.join(", ")));
        }
    }
}

fn emit_extension_target(yaml: &mut Yaml, config: &ProjectConfig, ext: &ExtensionConfig) {
    let defaults = extension_defaults(ext.kind);
    let platform = effective_primary_platform(config);
    let source_dir = format!("Targets/{}", ext.name);

    yaml.key(1, &ext.name);
    yaml.kv(2, "type", defaults.product_type);
    yaml.kv(2, "platform", platform.xcode_name());
    yaml.kv(2, "deploymentTarget", platform.default_deployment_target());
    yaml.key(2, "sources");
    yaml.item(3, &source_dir);
    yaml.item(3, "Shared");

    yaml.key(2, "info");
    yaml.kv(3, "path", &format!("{}/Info.plist", source_dir));
    yaml.key(3, "properties");
    yaml.kv(4, "CFBundleDisplayName", &ext.name);
    if ext.kind == ExtensionKind::AppClip {
        yaml.key(4, "NSAppClip");
        yaml.kv_raw(5, "NSAppClipRequestEphemeralUserNotification", "false");
        yaml.kv_raw(5, "NSAppClipRequestLocationConfirmation", "false");
    }
    if let Some(point) = defaults.extension_point {
        yaml.key(4, "NSExtension");
        yaml.kv(5, "NSExtensionPointIdentifier", point);
        if let Some(class) = defaults.principal_class {
            yaml.kv(
                5,
                "NSExtensionPrincipalClass",
                &format!("$(PRODUCT_MODULE_NAME).{}", class),
            );
        }
    }
    let mut extra_info: Vec<(&String, &serde_json::Value)> = ext.info_plist.iter().collect();
    extra_info.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in extra_info {
        yaml.json_kv(4, key, value);
    }

    let mut entitlements: Vec<(String, serde_json::Value)> = ext
        .entitlements
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if defaults.needs_app_group {
        let key = "com.apple.security.application-groups".to_string();
        if !entitlements.iter().any(|(k, _)| *k == key) {
            entitlements.push((key, serde_json::json!([format!("group.{}", config.bundle_id)])));
        }
    }
    if ext.kind == ExtensionKind::AppClip {
        let key = "com.apple.developer.on-demand-install-capable".to_string();
        if !entitlements.iter().any(|(k, _)| *k == key) {
            entitlements.push((key, serde_json::json!(true)));
        }
    }
    // Target-scoped entitlements added through the add_entitlement tool.
    for ent in config
        .entitlements
        .iter()
        .filter(|e| e.target.as_deref() == Some(ext.name.as_str()))
    {
        if !entitlements.iter().any(|(k, _)| *k == ent.key) {
            entitlements.push((ent.key.clone(), ent.value.clone()));
        }
    }
    if !entitlements.is_empty() {
        entitlements.sort_by(|a, b| a.0.cmp(&b.0));
        yaml.key(2, "entitlements");
        yaml.kv(3, "path", &format!("{}/{}.entitlements", source_dir, ext.name));
        yaml.key(3, "properties");
        for (key, value) in &entitlements {
            yaml.json_kv(4, key, value);
        }
    }

    emit_target_settings(
        yaml,
        config,
        2,
        &ext.name,
        &extension_bundle_id(config, ext),
        None,
    );
}

fn emit_single_platform_targets(yaml: &mut Yaml, config: &ProjectConfig) {
    emit_main_app_target(yaml, config, config.platform);
    for ext in &config.extensions {
        emit_extension_target(yaml, config, ext);
    }
    // Companion tvOS target for multi-platform plans.
    if config.platform != Platform::Tvos && config.platforms.contains(&Platform::Tvos) {
        emit_companion_tv_target(yaml, config);
    }
}

fn emit_companion_tv_target(yaml: &mut Yaml, config: &ProjectConfig) {
    let name = format!("{}TV", config.app_name);
    yaml.key(1, &name);
    yaml.kv(2, "type", "application");
    yaml.kv(2, "platform", Platform::Tvos.xcode_name());
    yaml.kv(
        2,
        "deploymentTarget",
        Platform::Tvos.default_deployment_target(),
    );
    yaml.key(2, "sources");
    yaml.item(3, &name);
    yaml.item(3, "Shared");
    yaml.key(2, "info");
    yaml.kv(3, "path", &format!("{}/Info.plist", name));
    yaml.key(3, "properties");
    yaml.kv(4, "CFBundleDisplayName", &config.app_name);
    emit_target_settings(
        yaml,
        config,
        2,
        &name,
        &format!("{}.tv", config.bundle_id),
        device_family_setting(config, Platform::Tvos),
    );
}

/// Watch app + intrinsic extension pair, shared by both watch shapes.
fn emit_watch_pair(yaml: &mut Yaml, config: &ProjectConfig, companion_bundle_id: &str) {
    let watch_name = format!("{}Watch", config.app_name);
    let watch_dir = format!("{}Watch", config.app_name);
    let extension_name = format!("{}WatchExtension", config.app_name);

    yaml.key(1, &watch_name);
    yaml.kv(2, "type", "watchapp2");
    yaml.kv(2, "platform", Platform::Watchos.xcode_name());
    yaml.kv(
        2,
        "deploymentTarget",
        Platform::Watchos.default_deployment_target(),
    );
    yaml.key(2, "sources");
    yaml.item(3, &format!("{}/App", watch_dir));
    yaml.key(2, "info");
    yaml.kv(3, "path", &format!("{}/App/Info.plist", watch_dir));
    yaml.key(3, "properties");
    yaml.kv(4, "CFBundleDisplayName", &config.app_name);
    yaml.kv(4, "WKCompanionAppBundleIdentifier", companion_bundle_id);
    emit_target_settings(
        yaml,
        config,
        2,
        &watch_name,
        &watch_app_bundle_id(config),
        device_family_setting(config, Platform::Watchos),
    );
    yaml.key(2, "dependencies");
    yaml.line(3, &format!("- target: {}", extension_name));

    yaml.key(1, &extension_name);
    yaml.kv(2, "type", "watchkit2-extension");
    yaml.kv(2, "platform", Platform::Watchos.xcode_name());
    yaml.kv(
        2,
        "deploymentTarget",
        Platform::Watchos.default_deployment_target(),
    );
    yaml.key(2, "sources");
    yaml.item(3, &format!("{}/Extension", watch_dir));
    yaml.item(3, "Shared");
    yaml.key(2, "info");
    yaml.kv(3, "path", &format!("{}/Extension/Info.plist", watch_dir));
    yaml.key(3, "properties");
    yaml.kv(4, "CFBundleDisplayName", &config.app_name);
    yaml.key(4, "NSExtension");
    yaml.key(5, "NSExtensionAttributes");
    yaml.kv(6, "WKAppBundleIdentifier", &watch_app_bundle_id(config));
    yaml.kv(5, "NSExtensionPointIdentifier", "com.apple.watchkit");
    emit_target_settings(
        yaml,
        config,
        2,
        &extension_name,
        &watch_extension_bundle_id(config),
        device_family_setting(config, Platform::Watchos),
    );
}

/// Watch-only: thin iOS container + watch app + intrinsic extension.
fn emit_watch_only_targets(yaml: &mut Yaml, config: &ProjectConfig) {
    let container_dir = config.app_name.clone();

    yaml.key(1, &config.app_name);
    yaml.kv(2, "type", "application");
    yaml.kv(2, "platform", Platform::Ios.xcode_name());
    yaml.kv(
        2,
        "deploymentTarget",
        Platform::Ios.default_deployment_target(),
    );
    yaml.key(2, "sources");
    yaml.item(3, &container_dir);
    yaml.key(2, "info");
    yaml.kv(3, "path", &format!("{}/Info.plist", container_dir));
    yaml.key(3, "properties");
    yaml.kv(4, "CFBundleDisplayName", &config.app_name);
    emit_target_settings(
        yaml,
        config,
        2,
        &config.app_name,
        &config.bundle_id,
        device_family_setting(config, Platform::Ios),
    );
    yaml.key(2, "dependencies");
    yaml.line(3, &format!("- target: {}Watch", config.app_name));

    emit_watch_pair(yaml, config, &config.bundle_id);
}

/// Paired: full iOS parent + watch app + intrinsic extension + planned
/// extensions on the iOS side.
fn emit_paired_targets(yaml: &mut Yaml, config: &ProjectConfig) {
    emit_main_app_target(yaml, config, Platform::Ios);
    emit_watch_pair(yaml, config, &config.bundle_id);
    for ext in &config.extensions {
        emit_extension_target(yaml, config, ext);
    }
}

fn emit_schemes(yaml: &mut Yaml, config: &ProjectConfig) {
    yaml.key(0, "schemes");
    yaml.key(1, &config.app_name);
    yaml.key(2, "build");
    yaml.key(3, "targets");
    yaml.kv(4, &config.app_name, "all");
    yaml.key(2, "run");
    yaml.kv(3, "config", "Debug");
    yaml.key(2, "test");
    yaml.kv(3, "config", "Debug");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildSetting, Entitlement, PackageDependency, Permission};
    use nanowave_policy::DeviceFamily;
    use std::collections::BTreeMap;

    fn ios_config() -> ProjectConfig {
        let mut cfg = ProjectConfig::new("Habits", "com.nanowave.habits", Platform::Ios);
        cfg.device_family = Some(DeviceFamily::Iphone);
        cfg
    }

    #[test]
    fn test_bundle_id_validation() {
        assert!(validate_bundle_id("com.nanowave.habits").is_ok());
        assert!(validate_bundle_id("com.nanowave.my-app").is_ok());
        assert!(validate_bundle_id("com.nanowave.my_app").is_err());
        assert!(validate_bundle_id("com.nanowave.").is_err());
        assert!(validate_bundle_id("com..habits").is_err());
        assert!(validate_bundle_id("").is_err());
    }

    #[test]
    fn test_scalar_quoting() {
        assert_eq!(yaml_scalar("Habits"), "Habits");
        assert_eq!(yaml_scalar("17.0"), "\"17.0\"");
        assert_eq!(yaml_scalar("yes"), "\"yes\"");
        assert_eq!(yaml_scalar("a: b"), "\"a: b\"");
        assert_eq!(yaml_scalar("100%"), "\"100%\"");
        assert_eq!(yaml_scalar("Track habits, daily"), "\"Track habits, daily\"");
    }

    #[test]
    fn test_ios_shape_basics() {
        let yaml = emit_project_yaml(&ios_config()).unwrap();
        assert!(yaml.starts_with("name: Habits\n"));
        assert!(yaml.contains("platform: iOS"));
        assert!(yaml.contains("PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.habits"));
        assert!(yaml.contains("TARGETED_DEVICE_FAMILY: \"1\""));
        // Scheme name equals app name.
        assert!(yaml.contains("schemes:\n  Habits:\n"));
        // Single-destination project must not emit supportedDestinations.
        assert!(!yaml.contains("supportedDestinations"));
    }

    #[test]
    fn test_emission_is_deterministic() {
        let mut cfg = ios_config();
        cfg.add_permission(Permission {
            key: "NSCameraUsageDescription".to_string(),
            description: "Scan barcodes".to_string(),
            framework: "AVFoundation".to_string(),
        });
        cfg.add_package(PackageDependency {
            name: "Charts".to_string(),
            url: "https://github.com/danielgindi/Charts".to_string(),
            min_version: "5.0.0".to_string(),
            products: vec![],
        });
        let first = emit_project_yaml(&cfg).unwrap();
        let second = emit_project_yaml(&cfg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_permission_lands_in_info_properties() {
        let mut cfg = ios_config();
        cfg.add_permission(Permission {
            key: "NSLocationWhenInUseUsageDescription".to_string(),
            description: "Track walks near you".to_string(),
            framework: "CoreLocation".to_string(),
        });
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml
            .contains("NSLocationWhenInUseUsageDescription: \"Track walks near you\"")
            || yaml.contains("NSLocationWhenInUseUsageDescription: Track walks near you"));
    }

    #[test]
    fn test_widget_extension_target() {
        let mut cfg = ios_config();
        cfg.add_extension(ExtensionConfig {
            kind: ExtensionKind::Widget,
            name: "HabitsWidget".to_string(),
            purpose: "Weekly grid at a glance".to_string(),
            info_plist: BTreeMap::new(),
            entitlements: BTreeMap::new(),
        });
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("HabitsWidget:"));
        assert!(yaml.contains("type: app-extension"));
        assert!(yaml.contains("- path: Targets/HabitsWidget") || yaml.contains("- Targets/HabitsWidget"));
        assert!(yaml.contains("NSExtensionPointIdentifier: com.apple.widgetkit-extension"));
        assert!(yaml.contains("PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.habits.widget"));
        // Data-sharing extension pulls an app group into both targets.
        assert!(yaml.contains("group.com.nanowave.habits"));
        // The main app depends on the extension target.
        assert!(yaml.contains("- target: HabitsWidget"));
    }

    #[test]
    fn test_no_emitted_bundle_id_has_underscore() {
        let mut cfg = ios_config();
        for kind in ExtensionKind::all() {
            if *kind == ExtensionKind::TvTopShelf {
                continue;
            }
            cfg.add_extension(ExtensionConfig {
                kind: *kind,
                name: kind.default_target_name("Habits"),
                purpose: String::new(),
                info_plist: BTreeMap::new(),
                entitlements: BTreeMap::new(),
            });
        }
        let yaml = emit_project_yaml(&cfg).unwrap();
        for line in yaml.lines() {
            if let Some(value) = line.trim().strip_prefix("PRODUCT_BUNDLE_IDENTIFIER: ") {
                assert!(!value.contains('_'), "bundle id with underscore: {}", value);
                assert!(!value.ends_with('.'), "bundle id with trailing dot: {}", value);
            }
        }
    }

    #[test]
    fn test_paired_watch_shape() {
        let mut cfg = ProjectConfig::new("Workouts", "com.nanowave.workouts", Platform::Watchos);
        cfg.watch_project_shape = Some(WatchProjectShape::PairedIosWatch);
        let yaml = emit_project_yaml(&cfg).unwrap();
        // iOS parent + watch app + intrinsic extension.
        assert!(yaml.contains("Workouts:\n    type: application\n    platform: iOS"));
        assert!(yaml.contains("WorkoutsWatch:\n    type: watchapp2"));
        assert!(yaml.contains("WorkoutsWatchExtension:\n    type: watchkit2-extension"));
        assert!(yaml.contains("WKCompanionAppBundleIdentifier: com.nanowave.workouts"));
        assert!(yaml.contains("PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.workouts.watchkitapp"));
        assert!(yaml.contains(
            "PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.workouts.watchkitapp.watchkitextension"
        ));
    }

    #[test]
    fn test_watch_only_shape_has_container() {
        let mut cfg = ProjectConfig::new("Breathe", "com.nanowave.breathe", Platform::Watchos);
        cfg.watch_project_shape = Some(WatchProjectShape::WatchOnly);
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("Breathe:\n    type: application\n    platform: iOS"));
        assert!(yaml.contains("BreatheWatch:\n    type: watchapp2"));
        assert!(yaml.contains("- target: BreatheWatch"));
    }

    #[test]
    fn test_watch_shape_on_ios_is_error() {
        let mut cfg = ios_config();
        cfg.watch_project_shape = Some(WatchProjectShape::WatchOnly);
        // Panics under debug assertions (tests); errors in release.
        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| emit_project_yaml(&cfg)));
        let rejected = match outcome {
            Err(_) => true,
            Ok(result) => result.is_err(),
        };
        assert!(rejected);
    }

    #[test]
    fn test_entitlement_and_build_setting_emission() {
        let mut cfg = ios_config();
        cfg.set_entitlement(Entitlement {
            target: None,
            key: "aps-environment".to_string(),
            value: serde_json::json!("development"),
        });
        cfg.set_build_setting(BuildSetting {
            target: Some("Habits".to_string()),
            key: "DEVELOPMENT_TEAM".to_string(),
            value: "ABCDE12345".to_string(),
        });
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("aps-environment: development"));
        assert!(yaml.contains("path: Habits/Habits.entitlements"));
        assert!(yaml.contains("DEVELOPMENT_TEAM: ABCDE12345"));
    }

    #[test]
    fn test_localizations_in_info() {
        let mut cfg = ios_config();
        cfg.add_localizations(&["fr".to_string(), "ja".to_string()]);
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("CFBundleLocalizations: [en, fr, ja]"));
    }

    #[test]
    fn test_top_shelf_on_tvos() {
        let mut cfg = ProjectConfig::new("Movies", "com.nanowave.movies", Platform::Tvos);
        cfg.add_extension(ExtensionConfig {
            kind: ExtensionKind::TvTopShelf,
            name: "MoviesTopShelf".to_string(),
            purpose: "Featured movies".to_string(),
            info_plist: BTreeMap::new(),
            entitlements: BTreeMap::new(),
        });
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("platform: tvOS"));
        assert!(yaml.contains("TARGETED_DEVICE_FAMILY: \"3\""));
        assert!(yaml.contains("NSExtensionPointIdentifier: com.apple.tv-top-shelf"));
        assert!(yaml.contains("PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.movies.topshelf"));
    }

    #[test]
    fn test_app_clip_flags() {
        let mut cfg = ios_config();
        cfg.add_extension(ExtensionConfig {
            kind: ExtensionKind::AppClip,
            name: "HabitsClip".to_string(),
            purpose: "Instant habit logging".to_string(),
            info_plist: BTreeMap::new(),
            entitlements: BTreeMap::new(),
        });
        let yaml = emit_project_yaml(&cfg).unwrap();
        assert!(yaml.contains("NSAppClip"));
        assert!(yaml.contains("com.apple.developer.on-demand-install-capable: true"));
        assert!(yaml.contains("PRODUCT_BUNDLE_IDENTIFIER: com.nanowave.habits.clip"));
    }
}
