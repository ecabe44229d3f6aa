//! Directory-tree transfer: push, pull, sync, or link.
use anyhow::{Result, bail};
use std::path::PathBuf;

use super::{Action, Idempotent, Transfer, dry_run, fs, resolve_dir_target};
use crate::config::{Direction, TransferSpec};
use crate::exec::CancelToken;

/// Copies or links a directory tree between the repository and the system.
///
/// Sync fills whichever side is missing; when both exist the repository
/// copy is pushed over the system one. Files present only on the
/// destination side are kept.
#[derive(Debug, Clone)]
pub struct DirectoryAction {
    transfer: Transfer,
}

impl DirectoryAction {
    /// Resolve `spec` against the OS-specific `destination`.
    #[must_use]
    pub fn new(spec: &TransferSpec, destination: &str, direction: Direction) -> Self {
        let target = resolve_dir_target(&spec.source, destination);
        Self {
            transfer: Transfer::new(spec, target, direction),
        }
    }

    fn copy(&self, from: &std::path::Path, to: &std::path::Path) -> Result<()> {
        fs::copy_dir_recursive(from, to)?;
        if let Some(mode) = self.transfer.permissions {
            fs::enforce_mode_in_tree(to, mode)?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let t = &self.transfer;
        match (t.source.is_dir(), t.target.is_dir()) {
            (false, false) => bail!(
                "sync-dir: neither repo nor system directory exists ({})",
                t.source.display()
            ),
            (true, false) => {
                tracing::info!("sync-dir: system copy missing, pushing");
                self.copy(&t.source, &t.target)
            }
            (false, true) => {
                tracing::info!("sync-dir: repo copy missing, pulling");
                self.copy(&t.target, &t.source)
            }
            (true, true) => {
                tracing::info!("sync-dir: both exist, pushing repo -> system");
                self.copy(&t.source, &t.target)
            }
        }
    }

    fn link(&self) -> Result<()> {
        let t = &self.transfer;
        let source = fs::absolute(&t.source)?;
        fs::ensure_parent_dir(&t.target)?;
        if fs::entry_exists(&t.target) {
            if !fs::is_symlink(&t.target) {
                bail!(
                    "destination exists and is not a symlink: {}",
                    t.target.display()
                );
            }
            fs::remove_path(&t.target)?;
        }
        fs::create_symlink(&source, &t.target)
    }
}

impl Action for DirectoryAction {
    fn describe(&self) -> String {
        let t = &self.transfer;
        let (src, dst) = (t.source.display(), t.target.display());
        if t.link {
            return format!("link-dir  {src} -> {dst}");
        }
        match t.direction {
            Direction::Push => format!("push-dir  {src} -> {dst}"),
            Direction::Pull => format!("pull-dir  {src} <- {dst}"),
            Direction::Sync => format!("sync-dir  {src} <-> {dst}"),
        }
    }

    fn run(&self, _cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            return Ok(());
        }
        let t = &self.transfer;
        if t.link {
            return self.link();
        }
        match t.direction {
            Direction::Push => {
                if !t.source.is_dir() {
                    bail!("push-dir: repo directory does not exist: {}", t.source.display());
                }
                self.copy(&t.source, &t.target)
            }
            Direction::Pull => {
                if !t.target.is_dir() {
                    bail!(
                        "pull-dir: system directory does not exist: {}",
                        t.target.display()
                    );
                }
                self.copy(&t.target, &t.source)
            }
            Direction::Sync => self.sync(),
        }
    }

    fn idempotency(&self) -> Option<&dyn Idempotent> {
        self.transfer.link.then_some(self as &dyn Idempotent)
    }

    fn snapshot_target(&self) -> Option<PathBuf> {
        Some(self.transfer.target.clone())
    }
}

impl Idempotent for DirectoryAction {
    fn is_applied(&self, _cancel: &CancelToken) -> Result<bool> {
        Ok(self.transfer.link && fs::links_to(&self.transfer.target, &self.transfer.source))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::PlatformValue;
    use std::path::Path;

    fn action(source: &Path, parent: &Path, direction: Direction, link: bool) -> DirectoryAction {
        let spec = TransferSpec {
            source: source.to_path_buf(),
            destination: PlatformValue::Any(String::new()),
            direction,
            link,
            permissions: None,
        };
        DirectoryAction::new(&spec, &parent.display().to_string(), direction)
    }

    fn tree(root: &Path) {
        std::fs::create_dir_all(root.join("lua")).unwrap();
        std::fs::write(root.join("init.lua"), "require('x')").unwrap();
        std::fs::write(root.join("lua/x.lua"), "return {}").unwrap();
    }

    #[test]
    fn push_copies_tree_under_parent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("repo/nvim");
        tree(&src);
        let config = dir.path().join("home/.config");
        action(&src, &config, Direction::Push, false)
            .run(&CancelToken::new(), false)
            .unwrap();
        assert!(config.join("nvim/lua/x.lua").exists());
    }

    #[test]
    fn pull_requires_system_directory() {
        let dir = tempfile::tempdir().unwrap();
        let a = action(&dir.path().join("repo/nvim"), dir.path(), Direction::Pull, false);
        assert!(a.run(&CancelToken::new(), false).is_err());
    }

    #[test]
    fn sync_pulls_when_repo_missing() {
        let dir = tempfile::tempdir().unwrap();
        let sys = dir.path().join("home/nvim");
        tree(&sys);
        let src = dir.path().join("repo/nvim");
        action(&src, &dir.path().join("home"), Direction::Sync, false)
            .run(&CancelToken::new(), false)
            .unwrap();
        assert!(src.join("init.lua").exists());
    }

    #[test]
    fn sync_with_both_sides_pushes() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("repo/nvim");
        tree(&src);
        let sys = dir.path().join("home/nvim");
        std::fs::create_dir_all(&sys).unwrap();
        std::fs::write(sys.join("init.lua"), "stale").unwrap();
        action(&src, &dir.path().join("home"), Direction::Sync, false)
            .run(&CancelToken::new(), false)
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(sys.join("init.lua")).unwrap(),
            "require('x')"
        );
    }

    #[test]
    fn dry_run_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("repo/nvim");
        tree(&src);
        let a = action(&src, &dir.path().join("home"), Direction::Push, false);
        a.run(&CancelToken::new(), true).unwrap();
        assert!(!dir.path().join("home").exists());
        assert!(a.describe().starts_with("push-dir  "));
    }

    #[cfg(unix)]
    #[test]
    fn link_refuses_real_directory_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("repo/nvim");
        tree(&src);
        let home = dir.path().join("home");
        std::fs::create_dir_all(home.join("nvim")).unwrap();

        let a = action(&src, &home, Direction::Push, true);
        assert!(a.run(&CancelToken::new(), false).is_err());

        std::fs::remove_dir(home.join("nvim")).unwrap();
        a.run(&CancelToken::new(), false).unwrap();
        assert!(a.idempotency().unwrap().is_applied(&CancelToken::new()).unwrap());
        assert!(home.join("nvim/init.lua").exists());
    }
}
