//! Module records: a named, ordered group of items with tag filters and hooks.
use serde::Deserialize;
use std::path::Path;

use super::item::{Item, ItemError, RawItem};
use crate::error::ConfigError;

/// Shell commands run around a module or an item.
///
/// The same four slots exist at both scopes; `*_sync` hooks only fire when
/// sync-direction work is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hooks {
    /// Runs before anything else in scope.
    pub before_apply: Option<String>,
    /// Runs after everything in scope succeeded.
    pub after_apply: Option<String>,
    /// Runs before sync work.
    pub before_sync: Option<String>,
    /// Runs after sync work.
    pub after_sync: Option<String>,
}

/// A named group of items applied together.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    /// Unique module name.
    pub name: String,
    /// Items in declaration order.
    pub items: Vec<Item>,
    /// Apply only on machines carrying at least one of these tags.
    pub only_tags: Vec<String>,
    /// Never apply on machines carrying any of these tags.
    pub exclude_tags: Vec<String>,
    /// Module-scoped hooks.
    pub hooks: Hooks,
}

impl Module {
    /// Create an untagged, hookless module.
    #[must_use]
    pub fn new(name: &str, items: Vec<Item>) -> Self {
        Self {
            name: name.to_string(),
            items,
            only_tags: Vec::new(),
            exclude_tags: Vec::new(),
            hooks: Hooks::default(),
        }
    }
}

/// On-disk module record.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct RawModule {
    name: String,
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    only_tags: Vec<String>,
    #[serde(default)]
    exclude_tags: Vec<String>,
    #[serde(default)]
    hooks: Hooks,
}

impl RawModule {
    /// Validate every item and resolve relative sources against `base`.
    pub(super) fn into_module(self, base: &Path) -> Result<Module, ConfigError> {
        let name = self.name;
        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let mut item = Item::try_from(raw).map_err(|e| match e {
                    ItemError::NoKind => ConfigError::MissingKind {
                        module: name.clone(),
                        index,
                    },
                    ItemError::Ambiguous(kinds) => ConfigError::AmbiguousKind {
                        module: name.clone(),
                        index,
                        kinds,
                    },
                    ItemError::Invalid(message) => ConfigError::InvalidItem {
                        module: name.clone(),
                        index,
                        message,
                    },
                })?;
                item.resolve_paths(base);
                Ok(item)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Module {
            name,
            items,
            only_tags: self.only_tags,
            exclude_tags: self.exclude_tags,
            hooks: self.hooks,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn module(src: &str) -> Result<Module, ConfigError> {
        let raw: RawModule = toml::from_str(src).expect("valid toml");
        raw.into_module(Path::new("/repo"))
    }

    #[test]
    fn module_with_hooks_and_tags() {
        let m = module(
            "name = \"shell\"\nonly_tags = [\"work\"]\n\
             [hooks]\nbefore_sync = \"echo sync\"\n\
             [[items]]\nrun = \"true\"",
        )
        .unwrap();
        assert_eq!(m.name, "shell");
        assert_eq!(m.only_tags, vec!["work".to_string()]);
        assert_eq!(m.hooks.before_sync.as_deref(), Some("echo sync"));
        assert_eq!(m.items.len(), 1);
    }

    #[test]
    fn item_errors_carry_module_and_index() {
        let err = module("name = \"git\"\n[[items]]\nrun = \"true\"\n[[items]]\nverify = \"x\"")
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingKind { ref module, index: 1 } if module == "git"
        ));
    }

    #[test]
    fn unknown_hook_name_is_rejected() {
        assert!(toml::from_str::<RawModule>("name = \"x\"\n[hooks]\nbefore = \"y\"").is_err());
    }

    #[test]
    fn module_without_items_is_allowed() {
        assert!(module("name = \"empty\"").unwrap().items.is_empty());
    }
}
