//! Declarative configuration: `dotkit.toml` modules, items, and validation.
//!
//! ```toml
//! [[modules]]
//! name = "shell"
//! only_tags = ["work"]
//!
//! [modules.hooks]
//! after_apply = "exec zsh -n ~/.zshrc"
//!
//! [[modules.items]]
//! file = "zshrc"
//! destination = "~/"
//! ```
pub mod item;
pub mod module;
pub mod validation;

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub use item::{
    BinarySpec, Direction, Item, ItemKind, PlatformValue, ScriptSource, SettingValue,
    TransferSpec,
};
pub use module::{Hooks, Module};

use crate::error::ConfigError;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dotkit.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    modules: Vec<module::RawModule>,
}

/// A loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the config file; relative sources resolve against it.
    pub root: PathBuf,
    /// Modules in declaration order.
    pub modules: Vec<Module>,
}

impl Config {
    /// Load and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, has
    /// an invalid item, or declares two modules with the same name.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self::parse(&content, &root).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parse config text, resolving relative sources against `root`.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus I/O.
    pub fn parse(content: &str, root: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: String::new(),
            source,
        })?;

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(raw.modules.len());
        for raw_module in raw.modules {
            let module = raw_module.into_module(root)?;
            if !seen.insert(module.name.clone()) {
                return Err(ConfigError::DuplicateModule(module.name));
            }
            modules.push(module);
        }

        Ok(Self {
            root: root.to_path_buf(),
            modules,
        })
    }

    /// Return the named module, if present.
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Select modules by name, in the order they were requested.
    ///
    /// An empty selection means every module.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownModule`] for the first name not found.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Module>, ConfigError> {
        if names.is_empty() {
            return Ok(self.modules.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.module(name)
                    .ok_or_else(|| ConfigError::UnknownModule(name.clone()))
            })
            .collect()
    }
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use test_helpers::write_temp_toml;

    #[test]
    fn load_resolves_sources_against_config_dir() {
        let (dir, path) = write_temp_toml(
            "[[modules]]\nname = \"vim\"\n\
             [[modules.items]]\nfile = \".vimrc\"\ndestination = \"~/\"",
        );
        let config = Config::load(&path).unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        assert_eq!(config.root, root);
        let spec = config.modules[0].items[0].kind.transfer().unwrap();
        assert_eq!(spec.source, root.join(".vimrc"));
    }

    #[test]
    fn empty_file_has_no_modules() {
        let (_dir, path) = write_temp_toml("");
        assert!(Config::load(&path).unwrap().modules.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::load(Path::new("/definitely/not/here/dotkit.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn parse_error_names_the_file() {
        let (_dir, path) = write_temp_toml("[[modules]\nname=");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("dotkit.toml"));
    }

    #[test]
    fn duplicate_module_names_are_rejected() {
        let err = Config::parse(
            "[[modules]]\nname = \"a\"\n[[modules]]\nname = \"a\"",
            Path::new("/repo"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModule(name) if name == "a"));
    }

    #[test]
    fn select_preserves_requested_order_and_rejects_unknown() {
        let config = Config::parse(
            "[[modules]]\nname = \"a\"\n[[modules]]\nname = \"b\"",
            Path::new("/repo"),
        )
        .unwrap();
        let all = config.select(&[]).unwrap();
        assert_eq!(all.len(), 2);
        let picked = config.select(&["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(picked[0].name, "b");
        let err = config.select(&["zzz".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownModule(name) if name == "zzz"));
    }

    #[test]
    fn module_lookup() {
        let config =
            Config::parse("[[modules]]\nname = \"git\"", Path::new("/repo")).unwrap();
        assert!(config.module("git").is_some());
        assert!(config.module("nvim").is_none());
    }
}
