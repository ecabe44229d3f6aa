//! Runtime actions built from configuration items.
//!
//! An [`Action`] is the OS-resolved, executable form of one [`Item`]. The
//! engine only sees the trait objects produced by an [`ActionBuilder`]; the
//! concrete kinds live in the submodules.
pub mod binary;
pub mod directory;
pub mod file;
pub mod fs;
pub mod package;
pub mod run;
pub mod script;
pub mod setting;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::{Direction, Item, ItemKind, TransferSpec};
use crate::error::BuildError;
use crate::exec::CancelToken;
use crate::platform::{Os, expand_path};

/// A single runnable step.
pub trait Action: Send + Sync {
    /// Human-readable summary, also used as the audit item name.
    fn describe(&self) -> String;

    /// Execute the step. In dry-run mode, report the intended effect and
    /// change nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails or is cancelled.
    fn run(&self, cancel: &CancelToken, dry_run: bool) -> Result<()>;

    /// Optional "already applied" check.
    fn idempotency(&self) -> Option<&dyn Idempotent> {
        None
    }

    /// System-side path this action may mutate, for rollback snapshots.
    fn snapshot_target(&self) -> Option<PathBuf> {
        None
    }
}

/// Self-check for actions that can tell whether they are already applied.
pub trait Idempotent {
    /// `true` when running the action would change nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the check itself cannot be performed.
    fn is_applied(&self, cancel: &CancelToken) -> Result<bool>;
}

/// Result of building an item for the current OS.
pub enum Built {
    /// A runnable action.
    Action(Box<dyn Action>),
    /// The item does not apply on this OS.
    NotApplicable,
}

impl std::fmt::Debug for Built {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Action(a) => f.debug_tuple("Action").field(&a.describe()).finish(),
            Self::NotApplicable => write!(f, "NotApplicable"),
        }
    }
}

/// Converts configuration items into actions.
pub trait ActionBuilder: Send + Sync {
    /// Build `item` for `os`, applying `direction` to non-link transfer items.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] when the item can never run (unknown package
    /// manager, archive binary source).
    fn build(&self, item: &Item, os: Os, direction: Option<Direction>)
    -> Result<Built, BuildError>;
}

/// The builder for real system actions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActionBuilder;

impl ActionBuilder for DefaultActionBuilder {
    fn build(
        &self,
        item: &Item,
        os: Os,
        direction: Option<Direction>,
    ) -> Result<Built, BuildError> {
        let direction = item.effective_direction(direction).unwrap_or_default();
        let action: Box<dyn Action> = match &item.kind {
            ItemKind::Package { name, manager } => {
                match package::PackageAction::build(name, manager, os)? {
                    Some(action) => Box::new(action),
                    None => return Ok(Built::NotApplicable),
                }
            }
            ItemKind::Script(source) => Box::new(script::ScriptAction::new(source.clone())),
            ItemKind::File(spec) => {
                let Some(dest) = spec.destination.for_os(os) else {
                    return Ok(Built::NotApplicable);
                };
                Box::new(file::FileAction::new(spec, dest, direction))
            }
            ItemKind::Directory(spec) => {
                let Some(dest) = spec.destination.for_os(os) else {
                    return Ok(Built::NotApplicable);
                };
                Box::new(directory::DirectoryAction::new(spec, dest, direction))
            }
            ItemKind::Binary(spec) => match binary::BinaryAction::build(spec, os)? {
                Some(action) => Box::new(action),
                None => return Ok(Built::NotApplicable),
            },
            ItemKind::Run { command, after } => {
                Box::new(run::RunAction::new(command.clone(), after.clone()))
            }
            ItemKind::Setting { domain, key, value } => {
                match setting::SettingAction::build(domain, key, value, os) {
                    Some(action) => Box::new(action),
                    None => return Ok(Built::NotApplicable),
                }
            }
        };
        Ok(Built::Action(action))
    }
}

/// Resolve the system path of a file item.
///
/// A destination whose last component has an extension (any `.`), and no
/// trailing separator, is the full file path. Otherwise it is a directory
/// and the source file name is appended.
#[must_use]
pub fn resolve_file_target(source: &Path, destination: &str) -> PathBuf {
    let expanded = expand_path(destination);
    let has_ext = expanded
        .file_name()
        .is_some_and(|n| n.to_string_lossy().contains('.'));
    if !ends_with_separator(destination) && has_ext {
        return expanded;
    }
    join_basename(expanded, source)
}

/// Resolve the system path of a directory item.
///
/// A destination already ending in the source directory's name is used as
/// is; otherwise the source name is appended.
#[must_use]
pub fn resolve_dir_target(source: &Path, destination: &str) -> PathBuf {
    let expanded = expand_path(destination);
    if !ends_with_separator(destination) && expanded.file_name() == source.file_name() {
        return expanded;
    }
    join_basename(expanded, source)
}

fn ends_with_separator(s: &str) -> bool {
    s.ends_with('/') || s.ends_with('\\')
}

fn join_basename(dir: PathBuf, source: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => dir.join(name),
        None => dir,
    }
}

/// Shared fields of a resolved file/directory transfer.
#[derive(Debug, Clone)]
pub(crate) struct Transfer {
    pub source: PathBuf,
    pub target: PathBuf,
    pub direction: Direction,
    pub link: bool,
    pub permissions: Option<u32>,
}

impl Transfer {
    fn new(spec: &TransferSpec, target: PathBuf, direction: Direction) -> Self {
        Self {
            source: spec.source.clone(),
            target,
            direction: if spec.link { Direction::Push } else { direction },
            link: spec.link,
            permissions: spec.permissions,
        }
    }
}

/// Emit a dry-run line.
pub(crate) fn dry_run(msg: &str) {
    tracing::info!(target: crate::logging::DRY_RUN_TARGET, "{msg}");
}
