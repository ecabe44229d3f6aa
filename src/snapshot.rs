//! Per-module rollback snapshots.
//!
//! A [`Snapshot`] copies each destination path into a private temporary
//! directory the first time it is recorded, so a failed module can put the
//! filesystem back the way it found it. Paths that did not exist are
//! remembered and deleted on restore.
use anyhow::{Context as _, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::actions::fs;

/// How a pre-existing path was captured.
#[derive(Debug)]
enum Saved {
    /// Regular file copied to the backup path.
    File(PathBuf),
    /// Directory tree copied to the backup path.
    Dir(PathBuf),
    /// Symlink; only its target is remembered.
    Link(PathBuf),
}

/// Pre-mutation filesystem state for one module apply.
#[derive(Debug)]
pub struct Snapshot {
    dir: tempfile::TempDir,
    saved: Vec<(PathBuf, Saved)>,
    created: Vec<PathBuf>,
    recorded: HashSet<PathBuf>,
    next_key: usize,
}

impl Snapshot {
    /// Allocate an empty snapshot backed by a fresh directory under the
    /// system temp dir.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::from_builder(|b| b.tempdir())
    }

    /// Like [`Snapshot::new`], but with the backing directory under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created in `parent`.
    pub fn new_in(parent: &Path) -> Result<Self> {
        Self::from_builder(|b| b.tempdir_in(parent))
            .with_context(|| format!("in {}", parent.display()))
    }

    fn from_builder(
        make: impl FnOnce(&tempfile::Builder<'_, '_>) -> std::io::Result<tempfile::TempDir>,
    ) -> Result<Self> {
        let dir = make(tempfile::Builder::new().prefix("dotkit-snap-"))
            .context("create snapshot dir")?;
        Ok(Self {
            dir,
            saved: Vec::new(),
            created: Vec::new(),
            recorded: HashSet::new(),
            next_key: 0,
        })
    }

    /// Capture the current state of `path`.
    ///
    /// A path that does not exist is remembered as created. Recording a path
    /// a second time does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be inspected (anything other than
    /// "not found") or its existing content cannot be copied.
    pub fn record(&mut self, path: &Path) -> Result<()> {
        if self.recorded.contains(path) {
            return Ok(());
        }
        let meta = match path.symlink_metadata() {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.created.push(path.to_path_buf());
                self.recorded.insert(path.to_path_buf());
                return Ok(());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("snapshot {}", path.display()));
            }
        };

        let saved = if meta.is_symlink() {
            let target = std::fs::read_link(path)
                .with_context(|| format!("snapshot {}", path.display()))?;
            Saved::Link(target)
        } else {
            let backup = self.dir.path().join(self.next_key.to_string());
            self.next_key += 1;
            if meta.is_dir() {
                fs::copy_tree_preserving_links(path, &backup)
                    .with_context(|| format!("snapshot {}", path.display()))?;
                Saved::Dir(backup)
            } else {
                std::fs::copy(path, &backup)
                    .with_context(|| format!("snapshot {}", path.display()))?;
                Saved::File(backup)
            }
        };
        tracing::debug!("snapshot: recorded {}", path.display());
        self.saved.push((path.to_path_buf(), saved));
        self.recorded.insert(path.to_path_buf());
        Ok(())
    }

    /// Number of paths whose prior content was saved.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.saved.len()
    }

    /// Paths that did not exist when recorded.
    #[must_use]
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    /// Put every recorded path back and delete every created one.
    ///
    /// Saved paths are replayed newest first, so a file recorded inside an
    /// already recorded directory ends up with its original content. Keeps
    /// going past individual failures so as much as possible is restored.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered.
    pub fn restore(&self) -> Result<()> {
        let mut first: Option<anyhow::Error> = None;
        for (path, saved) in self.saved.iter().rev() {
            if let Err(e) = restore_one(path, saved) {
                tracing::debug!("snapshot: restore {} failed: {e:#}", path.display());
                if first.is_none() {
                    first = Some(e);
                }
            }
        }
        for path in self.created.iter().rev() {
            if let Err(e) = fs::remove_path(path) {
                tracing::debug!("snapshot: remove {} failed: {e:#}", path.display());
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Delete the backing temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn discard(self) -> Result<()> {
        self.dir.close().context("remove snapshot dir")
    }
}

fn restore_one(path: &Path, saved: &Saved) -> Result<()> {
    let context = || format!("restore {}", path.display());
    match saved {
        Saved::File(backup) => {
            if path.symlink_metadata().is_ok_and(|m| m.is_dir() || m.is_symlink()) {
                fs::remove_path(path).with_context(context)?;
            }
            fs::copy_file(backup, path).with_context(context)
        }
        Saved::Dir(backup) => {
            fs::remove_path(path).with_context(context)?;
            fs::copy_tree_preserving_links(backup, path).with_context(context)
        }
        Saved::Link(target) => {
            fs::remove_path(path).with_context(context)?;
            fs::create_symlink(target, path).with_context(context)
        }
    }
}
