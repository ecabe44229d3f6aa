//! Single-file transfer: push, pull, sync, or link.
use anyhow::{Context as _, Result, bail};
use std::path::PathBuf;

use super::{Action, Idempotent, Transfer, dry_run, fs, resolve_file_target};
use crate::config::{Direction, TransferSpec};
use crate::exec::CancelToken;

/// Copies or links one file between the repository and the system.
///
/// Link items are idempotent: they are applied when the destination is a
/// symlink to the absolute source. Copy directions carry no idempotency
/// check; sync compares contents itself.
#[derive(Debug, Clone)]
pub struct FileAction {
    transfer: Transfer,
}

impl FileAction {
    /// Resolve `spec` against the OS-specific `destination`.
    #[must_use]
    pub fn new(spec: &TransferSpec, destination: &str, direction: Direction) -> Self {
        let target = resolve_file_target(&spec.source, destination);
        Self {
            transfer: Transfer::new(spec, target, direction),
        }
    }

    /// Permissions annotation for dry-run output, if a mode is configured
    /// and the system file exists.
    fn permissions_status(&self) -> Option<String> {
        let want = self.transfer.permissions.filter(|_| !self.transfer.link)?;
        let have = fs::current_mode(&self.transfer.target)?;
        Some(if have == want {
            format!("[permissions: {want:04o} ok]")
        } else {
            format!("[permissions: want {want:04o}, got {have:04o}]")
        })
    }

    fn push(&self) -> Result<()> {
        let t = &self.transfer;
        if !t.source.is_file() {
            bail!("push: repo file does not exist: {}", t.source.display());
        }
        fs::copy_file(&t.source, &t.target)
    }

    fn pull(&self) -> Result<()> {
        let t = &self.transfer;
        if !t.target.exists() {
            bail!("pull: system file does not exist: {}", t.target.display());
        }
        fs::copy_file(&t.target, &t.source)
    }

    fn sync(&self) -> Result<()> {
        let t = &self.transfer;
        match (t.source.exists(), t.target.exists()) {
            (false, false) => bail!(
                "sync: neither repo nor system file exists ({})",
                t.source.display()
            ),
            (true, false) => {
                tracing::info!("sync: system copy missing, pushing repo -> system");
                fs::copy_file(&t.source, &t.target)
            }
            (false, true) => {
                tracing::info!("sync: repo copy missing, pulling system -> repo");
                fs::copy_file(&t.target, &t.source)
            }
            (true, true) => {
                if fs::files_equal(&t.source, &t.target).context("sync: compare")? {
                    tracing::debug!("sync: already in sync");
                } else {
                    tracing::warn!(
                        "sync conflict: {} differs from {}; left both untouched (use push or pull to resolve)",
                        t.source.display(),
                        t.target.display()
                    );
                }
                Ok(())
            }
        }
    }

    fn link(&self) -> Result<()> {
        let t = &self.transfer;
        let source = fs::absolute(&t.source)?;
        fs::ensure_parent_dir(&t.target)?;
        fs::refuse_real_dir(&t.target)?;
        fs::remove_path(&t.target)?;
        fs::create_symlink(&source, &t.target)
    }
}

impl Action for FileAction {
    fn describe(&self) -> String {
        let t = &self.transfer;
        let (src, dst) = (t.source.display(), t.target.display());
        if t.link {
            return format!("link   {src} -> {dst}");
        }
        match t.direction {
            Direction::Push => format!("push   {src} -> {dst}"),
            Direction::Pull => format!("pull   {src} <- {dst}"),
            Direction::Sync => format!("sync   {src} <-> {dst}"),
        }
    }

    fn run(&self, _cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            if let Some(status) = self.permissions_status() {
                dry_run(&format!("  {status}"));
            }
            return Ok(());
        }

        if self.transfer.link {
            return self.link();
        }
        match self.transfer.direction {
            Direction::Push => self.push()?,
            Direction::Pull => self.pull()?,
            Direction::Sync => self.sync()?,
        }
        if let Some(mode) = self.transfer.permissions {
            fs::enforce_mode(&self.transfer.target, mode)?;
        }
        Ok(())
    }

    fn idempotency(&self) -> Option<&dyn Idempotent> {
        self.transfer.link.then_some(self as &dyn Idempotent)
    }

    fn snapshot_target(&self) -> Option<PathBuf> {
        Some(self.transfer.target.clone())
    }
}

impl Idempotent for FileAction {
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

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: PathBuf,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let home = dir.path().join("home");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::create_dir_all(&home).unwrap();
        Fixture {
            _dir: dir,
            repo,
            home,
        }
    }

    fn action(source: &Path, dest: &Path, direction: Direction, link: bool) -> FileAction {
        let spec = TransferSpec {
            source: source.to_path_buf(),
            destination: PlatformValue::Any(String::new()),
            direction,
            link,
            permissions: None,
        };
        FileAction::new(&spec, &format!("{}/", dest.display()), direction)
    }

    fn cancel() -> CancelToken {
        CancelToken::new()
    }

    #[test]
    fn push_copies_into_destination_directory() {
        let f = fixture();
        let src = f.repo.join(".vimrc");
        std::fs::write(&src, "set nu").unwrap();
        let a = action(&src, &f.home.join("nested"), Direction::Push, false);
        a.run(&cancel(), false).unwrap();
        assert_eq!(
            std::fs::read_to_string(f.home.join("nested/.vimrc")).unwrap(),
            "set nu"
        );
    }

    #[test]
    fn push_with_missing_source_fails() {
        let f = fixture();
        let a = action(&f.repo.join("nope"), &f.home, Direction::Push, false);
        assert!(a.run(&cancel(), false).is_err());
    }

    #[test]
    fn pull_copies_system_to_repo() {
        let f = fixture();
        let src = f.repo.join("gitconfig");
        std::fs::write(f.home.join("gitconfig"), "[user]").unwrap();
        action(&src, &f.home, Direction::Pull, false)
            .run(&cancel(), false)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "[user]");
    }

    #[test]
    fn pull_with_missing_system_file_fails() {
        let f = fixture();
        let a = action(&f.repo.join("x"), &f.home, Direction::Pull, false);
        let err = a.run(&cancel(), false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn sync_fills_missing_side() {
        let f = fixture();
        let src = f.repo.join("a");
        std::fs::write(&src, "repo").unwrap();
        action(&src, &f.home, Direction::Sync, false)
            .run(&cancel(), false)
            .unwrap();
        assert_eq!(std::fs::read_to_string(f.home.join("a")).unwrap(), "repo");

        let src_b = f.repo.join("b");
        std::fs::write(f.home.join("b"), "system").unwrap();
        action(&src_b, &f.home, Direction::Sync, false)
            .run(&cancel(), false)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&src_b).unwrap(), "system");
    }

    #[test]
    fn sync_conflict_leaves_both_sides() {
        let f = fixture();
        let src = f.repo.join("a");
        std::fs::write(&src, "repo").unwrap();
        std::fs::write(f.home.join("a"), "system").unwrap();
        action(&src, &f.home, Direction::Sync, false)
            .run(&cancel(), false)
            .unwrap();
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "repo");
        assert_eq!(std::fs::read_to_string(f.home.join("a")).unwrap(), "system");
    }

    #[test]
    fn sync_with_neither_side_fails() {
        let f = fixture();
        let a = action(&f.repo.join("a"), &f.home, Direction::Sync, false);
        assert!(a.run(&cancel(), false).is_err());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let f = fixture();
        let src = f.repo.join("a");
        std::fs::write(&src, "x").unwrap();
        action(&src, &f.home, Direction::Push, false)
            .run(&cancel(), true)
            .unwrap();
        assert!(!f.home.join("a").exists());
    }

    #[test]
    fn describe_formats() {
        let f = fixture();
        let src = f.repo.join("a");
        assert!(action(&src, &f.home, Direction::Push, false).describe().starts_with("push   "));
        assert!(action(&src, &f.home, Direction::Pull, false).describe().contains(" <- "));
        assert!(action(&src, &f.home, Direction::Sync, false).describe().contains(" <-> "));
        assert!(action(&src, &f.home, Direction::Sync, true).describe().starts_with("link   "));
    }

    #[test]
    fn only_links_expose_idempotency() {
        let f = fixture();
        let src = f.repo.join("a");
        assert!(action(&src, &f.home, Direction::Push, false).idempotency().is_none());
        assert!(action(&src, &f.home, Direction::Push, true).idempotency().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn link_creates_symlink_and_becomes_applied() {
        let f = fixture();
        let src = f.repo.join("a");
        std::fs::write(&src, "x").unwrap();
        std::fs::write(f.home.join("a"), "old").unwrap();
        let a = action(&src, &f.home, Direction::Push, true);
        let check = a.idempotency().unwrap();
        assert!(!check.is_applied(&cancel()).unwrap());
        a.run(&cancel(), false).unwrap();
        assert!(check.is_applied(&cancel()).unwrap());
        assert_eq!(std::fs::read_to_string(f.home.join("a")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn permissions_are_enforced_after_push() {
        let f = fixture();
        let src = f.repo.join("key");
        std::fs::write(&src, "secret").unwrap();
        let spec = TransferSpec {
            source: src,
            destination: PlatformValue::Any(String::new()),
            direction: Direction::Push,
            link: false,
            permissions: Some(0o600),
        };
        let a = FileAction::new(&spec, &format!("{}/", f.home.display()), Direction::Push);
        a.run(&cancel(), false).unwrap();
        assert_eq!(fs::current_mode(&f.home.join("key")), Some(0o600));
        assert_eq!(a.permissions_status().as_deref(), Some("[permissions: 0600 ok]"));
    }
}
