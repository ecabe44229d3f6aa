//! Machine tags: per-machine labels that decide which modules apply.
//!
//! Tags live in `$XDG_CONFIG_HOME/dotkit/machine.toml` (default
//! `~/.config/dotkit/machine.toml`) and are seeded with the OS, CPU
//! architecture and hostname on first use.
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::platform::{Platform, home_dir};

/// Decide whether a module applies to a machine.
pub trait TagMatcher: Send + Sync {
    /// `true` when a module with filters `only`/`exclude` applies to `machine`.
    fn matches(&self, machine: &[String], only: &[String], exclude: &[String]) -> bool;
}

/// [`TagMatcher`] implementing the standard exclude-then-only rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTagMatcher;

impl TagMatcher for DefaultTagMatcher {
    fn matches(&self, machine: &[String], only: &[String], exclude: &[String]) -> bool {
        matches(machine, only, exclude)
    }
}

/// Any excluded tag present rejects; an empty `only` accepts; otherwise at
/// least one `only` tag must be present.
#[must_use]
pub fn matches(machine: &[String], only: &[String], exclude: &[String]) -> bool {
    if exclude.iter().any(|t| machine.contains(t)) {
        return false;
    }
    only.is_empty() || only.iter().any(|t| machine.contains(t))
}

/// Tags detected from the running system: OS, architecture, hostname.
#[must_use]
pub fn auto_detect() -> Vec<String> {
    let platform = Platform::detect();
    let mut tags = vec![platform.os.to_string(), platform.arch.to_string()];
    if let Some(host) = hostname() {
        tags.push(host);
    }
    tags
}

fn hostname() -> Option<String> {
    let from_env = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok();
    from_env
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|h| !h.is_empty())
}

/// On-disk machine tag file.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTags {
    /// Tags for this machine.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Reads and writes the machine tag file.
#[derive(Debug, Clone)]
pub struct TagStore {
    path: PathBuf,
}

impl TagStore {
    /// Store at an explicit path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location under the user's config directory.
    #[must_use]
    pub fn default_location() -> Self {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .unwrap_or_else(|| {
                home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            });
        Self::new(base.join("dotkit").join("machine.toml"))
    }

    /// Path of the tag file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the tag file; a missing file yields no tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<MachineTags> {
        if !self.path.exists() {
            return Ok(MachineTags::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading machine tags: {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing machine tags: {}", self.path.display()))
    }

    /// Write the tag file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, tags: &MachineTags) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let content = toml::to_string(tags).context("serializing machine tags")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing machine tags: {}", self.path.display()))
    }

    /// Seed the file with auto-detected tags if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file must be created and cannot be.
    pub fn ensure_initialised(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&MachineTags {
            tags: auto_detect(),
        })
    }

    /// Add `tag` unless already present. Returns `true` when the file changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or saved.
    pub fn add(&self, tag: &str) -> Result<bool> {
        let mut current = self.load()?;
        if current.tags.iter().any(|t| t == tag) {
            return Ok(false);
        }
        current.tags.push(tag.to_string());
        self.save(&current)?;
        Ok(true)
    }
}
