use std::path::Path;

use super::item::{Direction, ItemKind, ScriptSource};
use super::module::Module;
use crate::actions::package::is_known_manager;
use crate::platform::{Platform, package_manager_os};

/// A validation warning detected during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The module the warning belongs to.
    pub module: String,
    /// The specific item that triggered the warning (empty for module-level warnings).
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    #[must_use]
    pub fn new(
        module: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for configuration validators.
///
/// Implementations check for problems that are legal to load but likely
/// mistakes: missing sources, managers that never apply, suspicious URLs.
pub trait ConfigValidator {
    /// Validate the configuration and return any warnings found.
    fn validate(&self, modules: &[Module], platform: &Platform) -> Vec<ValidationWarning>;

    /// Return a human-readable name for this validator.
    fn name(&self) -> &'static str;
}

/// Flags modules with nothing to do and contradictory tag filters.
#[derive(Debug)]
pub struct ModuleValidator;

impl ConfigValidator for ModuleValidator {
    fn validate(&self, modules: &[Module], _platform: &Platform) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for module in modules {
            if module.items.is_empty() {
                warnings.push(ValidationWarning::new(
                    &module.name,
                    "",
                    "module has no items",
                ));
            }
            for tag in &module.only_tags {
                if module.exclude_tags.contains(tag) {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        "",
                        format!("tag {tag:?} is both required and excluded"),
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "modules"
    }
}

/// Flags repository-side sources that do not exist but will be read.
#[derive(Debug)]
pub struct SourceValidator;

impl ConfigValidator for SourceValidator {
    fn validate(&self, modules: &[Module], _platform: &Platform) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for module in modules {
            for item in &module.items {
                let missing: Option<&Path> = match &item.kind {
                    ItemKind::File(spec) | ItemKind::Directory(spec)
                        if (spec.link || spec.direction == Direction::Push)
                            && !spec.source.exists() =>
                    {
                        Some(&spec.source)
                    }
                    ItemKind::Script(ScriptSource::Local(path)) if !path.exists() => Some(path),
                    _ => None,
                };
                if let Some(path) = missing {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        item.label(),
                        format!("source does not exist: {}", path.display()),
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "sources"
    }
}

/// Flags package managers that are unknown or never apply on this OS.
#[derive(Debug)]
pub struct PackageValidator;

impl ConfigValidator for PackageValidator {
    fn validate(&self, modules: &[Module], platform: &Platform) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for module in modules {
            for item in &module.items {
                let ItemKind::Package { manager, .. } = &item.kind else {
                    continue;
                };
                if !is_known_manager(manager) {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        item.label(),
                        format!("unsupported package manager {manager:?}"),
                    ));
                } else if let Some(os) = package_manager_os(manager)
                    && os != platform.os
                {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        item.label(),
                        format!("{manager} only applies on {os}; skipped on {}", platform.os),
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "packages"
    }
}

/// Flags binary sources that are not HTTP(S) URLs or point at archives.
#[derive(Debug)]
pub struct BinaryValidator;

impl ConfigValidator for BinaryValidator {
    fn validate(&self, modules: &[Module], platform: &Platform) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        for module in modules {
            for item in &module.items {
                let ItemKind::Binary(spec) = &item.kind else {
                    continue;
                };
                let Some(url) = spec.source.for_os(platform.os) else {
                    continue;
                };
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        item.label(),
                        "binary source should start with http:// or https://",
                    ));
                }
                if crate::actions::binary::is_archive(url) {
                    warnings.push(ValidationWarning::new(
                        &module.name,
                        item.label(),
                        "archive sources are not extracted; point at the bare binary",
                    ));
                }
            }
        }
        warnings
    }

    fn name(&self) -> &'static str {
        "binaries"
    }
}

/// Validate all configuration and return collected warnings.
#[must_use]
pub fn validate_all(config: &super::Config, platform: &Platform) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ConfigValidator>> = vec![
        Box::new(ModuleValidator),
        Box::new(SourceValidator),
        Box::new(PackageValidator),
        Box::new(BinaryValidator),
    ];

    let mut all_warnings = Vec::new();
    for validator in validators {
        let warnings = validator.validate(&config.modules, platform);
        if !warnings.is_empty() {
            tracing::debug!("{} validator: {} warning(s)", validator.name(), warnings.len());
        }
        all_warnings.extend(warnings);
    }

    all_warnings
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::item::{Item, PlatformValue, TransferSpec};
    use crate::platform::Os;
    use std::path::PathBuf;

    fn package(manager: &str) -> Item {
        Item::new(ItemKind::Package {
            name: "git".to_string(),
            manager: manager.to_string(),
        })
    }

    fn file(source: PathBuf, direction: Direction) -> Item {
        Item::new(ItemKind::File(TransferSpec {
            source,
            destination: PlatformValue::Any("~/".to_string()),
            direction,
            link: false,
            permissions: None,
        }))
    }

    #[test]
    fn module_validator_flags_empty_module() {
        let modules = vec![Module::new("empty", vec![])];
        let warnings = ModuleValidator.validate(&modules, &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("no items"));
    }

    #[test]
    fn module_validator_flags_contradictory_tags() {
        let mut m = Module::new("m", vec![package("apt")]);
        m.only_tags = vec!["work".to_string()];
        m.exclude_tags = vec!["work".to_string()];
        let warnings = ModuleValidator.validate(&[m], &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("both required and excluded"));
    }

    #[test]
    fn source_validator_flags_missing_push_source_only() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let modules = vec![Module::new(
            "m",
            vec![
                file(missing.clone(), Direction::Push),
                file(missing, Direction::Pull),
            ],
        )];
        let warnings = SourceValidator.validate(&modules, &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("does not exist"));
    }

    #[test]
    fn package_validator_warns_on_foreign_manager() {
        let modules = vec![Module::new("m", vec![package("brew"), package("apt")])];
        let warnings = PackageValidator.validate(&modules, &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("only applies on macos"));
    }

    #[test]
    fn package_validator_warns_on_unknown_manager() {
        let modules = vec![Module::new("m", vec![package("zypper")])];
        let warnings = PackageValidator.validate(&modules, &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("unsupported"));
    }

    #[test]
    fn binary_validator_flags_archives() {
        let item = Item::new(ItemKind::Binary(crate::config::item::BinarySpec {
            name: "rg".to_string(),
            version: None,
            source: PlatformValue::Any("https://x/rg.tar.gz".to_string()),
            install_to: None,
            sha256: None,
        }));
        let warnings =
            BinaryValidator.validate(&[Module::new("m", vec![item])], &Platform::new(Os::Linux));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("archive"));
    }
}
