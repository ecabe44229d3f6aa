//! The module executor: sequences hooks, guards, actions and verification for
//! every item of a module, and rolls file mutations back when one fails.
//!
//! Execution is strictly sequential. Items run in declaration order, and a
//! module finishes (including its `after_apply` hook) before the next starts.
mod item;
#[cfg(test)]
pub mod test_helpers;
mod verify;

use anyhow::Context as _;
use std::path::PathBuf;
use std::sync::Arc;

use crate::actions::{ActionBuilder, DefaultActionBuilder};
use crate::audit::{AuditSink, NullAuditSink};
use crate::config::{Direction, Module};
use crate::error::{ApplyError, HookKind, Phase};
use crate::exec::{CancelToken, Shell, SystemShell};
use crate::logging::{Log, ModuleStatus};
use crate::platform::Os;
use crate::snapshot::Snapshot;
use crate::tags::{DefaultTagMatcher, TagMatcher};

/// Machine context and flags for one run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Command name recorded in audit entries (`apply`, `push`, ...).
    pub command: String,
    /// Target operating system.
    pub os: Os,
    /// Tags of this machine, matched against module filters.
    pub machine_tags: Vec<String>,
    /// Replaces the direction of every non-link file/directory item.
    pub direction: Option<Direction>,
    /// Report intended effects without changing anything.
    pub dry_run: bool,
    /// Snapshot file mutations and restore them when a module fails.
    pub atomic: bool,
    /// Where snapshot backups are kept; the system temp dir when unset.
    pub snapshot_root: Option<PathBuf>,
}

impl Options {
    /// Atomic, non-dry-run options with no tags or direction override.
    #[must_use]
    pub fn new(command: &str, os: Os) -> Self {
        Self {
            command: command.to_string(),
            os,
            machine_tags: Vec::new(),
            direction: None,
            dry_run: false,
            atomic: true,
            snapshot_root: None,
        }
    }
}

/// Which scope a hook belongs to, for log and error text.
#[derive(Debug, Clone, Copy)]
enum HookScope {
    Module,
    Item,
}

impl std::fmt::Display for HookScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module => write!(f, "module"),
            Self::Item => write!(f, "item"),
        }
    }
}

/// Applies and verifies modules against the current machine.
///
/// Every side-effect service is injected, so tests can swap in recording
/// fakes for the shell, audit sink and action builder.
pub struct ModuleExecutor {
    opts: Options,
    log: Arc<dyn Log>,
    shell: Arc<dyn Shell>,
    audit: Arc<dyn AuditSink>,
    builder: Arc<dyn ActionBuilder>,
    tags: Arc<dyn TagMatcher>,
    cancel: CancelToken,
}

impl std::fmt::Debug for ModuleExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleExecutor")
            .field("opts", &self.opts)
            .field("log", &"<dyn Log>")
            .field("shell", &"<dyn Shell>")
            .field("audit", &"<dyn AuditSink>")
            .field("builder", &"<dyn ActionBuilder>")
            .field("tags", &"<dyn TagMatcher>")
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl ModuleExecutor {
    /// Executor wired to the real shell and action builder, with auditing off.
    #[must_use]
    pub fn new(opts: Options, log: Arc<dyn Log>, cancel: CancelToken) -> Self {
        Self {
            opts,
            log,
            shell: Arc::new(SystemShell),
            audit: Arc::new(NullAuditSink),
            builder: Arc::new(DefaultActionBuilder),
            tags: Arc::new(DefaultTagMatcher),
            cancel,
        }
    }

    /// Replace the shell used for hooks, `skip_if` and `verify`.
    #[must_use]
    pub fn with_shell(mut self, shell: Arc<dyn Shell>) -> Self {
        self.shell = shell;
        self
    }

    /// Replace the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replace the action builder.
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn ActionBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Replace the tag matcher.
    #[must_use]
    pub fn with_tag_matcher(mut self, tags: Arc<dyn TagMatcher>) -> Self {
        self.tags = tags;
        self
    }

    /// The options this executor runs with.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.opts
    }

    fn matches_tags(&self, module: &Module) -> bool {
        self.tags.matches(
            &self.opts.machine_tags,
            &module.only_tags,
            &module.exclude_tags,
        )
    }

    /// Apply `modules` in order, skipping those whose tags do not match.
    ///
    /// Stops at the first module that fails; later modules are not attempted.
    ///
    /// # Errors
    ///
    /// Returns the first module's [`ApplyError`].
    pub fn apply_all<'a>(
        &self,
        modules: impl IntoIterator<Item = &'a Module>,
    ) -> Result<(), ApplyError> {
        for module in modules {
            if !self.matches_tags(module) {
                self.log
                    .debug(&format!("==> {}  [skip: tag mismatch]", module.name));
                self.log
                    .record_module(&module.name, ModuleStatus::SkippedByTags, None);
                continue;
            }
            self.apply_module(module)?;
        }
        Ok(())
    }

    /// Apply one module with hooks, snapshot and rollback.
    ///
    /// The outcome is recorded in the log summary.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] naming the module, the failing item (if any)
    /// and the phase. When a rollback was attempted, the original failure is
    /// returned whether or not the restore succeeded.
    pub fn apply_module(&self, module: &Module) -> Result<(), ApplyError> {
        self.log.stage(&module.name);
        let mut rolled_back = false;
        let result = self.run_module(module, &mut rolled_back);

        let (status, message) = match &result {
            Ok(()) if self.opts.dry_run => (ModuleStatus::DryRun, None),
            Ok(()) => (ModuleStatus::Committed, None),
            Err(e) if rolled_back => (ModuleStatus::RolledBack, Some(summary(e))),
            Err(e) => (ModuleStatus::Failed, Some(summary(e))),
        };
        self.log
            .record_module(&module.name, status, message.as_deref());
        result
    }

    fn run_module(&self, module: &Module, rolled_back: &mut bool) -> Result<(), ApplyError> {
        let name = module.name.as_str();
        self.run_hook(
            module.hooks.before_apply.as_deref(),
            HookKind::BeforeApply,
            HookScope::Module,
            name,
        )
        .map_err(|e| ApplyError::module(name, Phase::Hook(HookKind::BeforeApply), e))?;

        let mut snapshot = if self.opts.atomic && !self.opts.dry_run {
            let snap = match &self.opts.snapshot_root {
                Some(root) => Snapshot::new_in(root),
                None => Snapshot::new(),
            };
            Some(snap.map_err(|e| ApplyError::module(name, Phase::Snapshot, e))?)
        } else {
            None
        };

        let result = self.apply_items(module, snapshot.as_mut());

        if let Some(snap) = snapshot {
            if result.is_err() {
                self.log.warn(&format!(
                    "[rollback] restoring snapshot after failure in {name:?}"
                ));
                if let Err(e) = snap.restore() {
                    self.log.warn(&format!("[rollback] restore error: {e:#}"));
                }
                *rolled_back = true;
            }
            if let Err(e) = snap.discard() {
                self.log.debug(&format!("snapshot cleanup failed: {e:#}"));
            }
        }
        result?;

        self.run_hook(
            module.hooks.after_apply.as_deref(),
            HookKind::AfterApply,
            HookScope::Module,
            name,
        )
        .map_err(|e| ApplyError::module(name, Phase::Hook(HookKind::AfterApply), e))
    }

    /// Run every item, bracketed by the module's sync hooks when any item
    /// resolves to sync.
    fn apply_items(
        &self,
        module: &Module,
        mut snapshot: Option<&mut Snapshot>,
    ) -> Result<(), ApplyError> {
        let name = module.name.as_str();
        let has_sync = module
            .items
            .iter()
            .any(|item| item.is_sync(self.opts.direction));

        if has_sync {
            self.run_hook(
                module.hooks.before_sync.as_deref(),
                HookKind::BeforeSync,
                HookScope::Module,
                name,
            )
            .map_err(|e| ApplyError::module(name, Phase::Hook(HookKind::BeforeSync), e))?;
        }

        for item in &module.items {
            self.apply_item(module, item, snapshot.as_deref_mut())?;
        }

        if has_sync {
            self.run_hook(
                module.hooks.after_sync.as_deref(),
                HookKind::AfterSync,
                HookScope::Module,
                name,
            )
            .map_err(|e| ApplyError::module(name, Phase::Hook(HookKind::AfterSync), e))?;
        }
        Ok(())
    }

    /// Run a hook command. Empty or absent hooks do nothing; dry-run only
    /// reports the command.
    fn run_hook(
        &self,
        command: Option<&str>,
        kind: HookKind,
        scope: HookScope,
        owner: &str,
    ) -> anyhow::Result<()> {
        let Some(command) = command.filter(|c| !c.trim().is_empty()) else {
            return Ok(());
        };
        if self.opts.dry_run {
            self.log.dry_run(&format!("hook {kind}.{scope}: {command}"));
            return Ok(());
        }
        self.log.debug(&format!("hook {kind} ({scope} {owner:?})"));
        self.shell
            .run(&self.cancel, command)
            .with_context(|| format!("hook {kind} on {scope} {owner:?}"))
    }
}

/// Short failure text for the run summary.
fn summary(e: &ApplyError) -> String {
    match &e.item {
        Some(item) => format!("{item}: {} failed", e.phase),
        None => format!("{} failed", e.phase),
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::test_helpers::{Harness, file_item, run_item};
    use super::*;
    use crate::audit::Outcome;
    use crate::config::{Hooks, Item, ItemKind};
    use crate::exec::test_helpers::RecordingShell;

    fn hooks(before: &str, after: &str) -> Hooks {
        Hooks {
            before_apply: Some(before.to_string()),
            after_apply: Some(after.to_string()),
            ..Hooks::default()
        }
    }

    #[test]
    fn package_for_another_os_is_a_silent_skip() {
        let h = Harness::new(RecordingShell::new());
        let item = Item::new(ItemKind::Package {
            name: "git".to_string(),
            manager: "brew".to_string(),
        });
        let module = Module::new("git", vec![item]);

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap();

        assert!(h.shell.calls().is_empty());
        assert!(h.audit.entries().is_empty());
        assert_eq!(h.statuses(), [ModuleStatus::Committed]);
    }

    #[test]
    fn copied_file_lands_and_is_rolled_back_on_later_failure() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join(".vimrc");
        std::fs::write(&source, "set number").unwrap();
        let dest = format!("{}/", home.path().display());

        let ok = Module::new("vim", vec![file_item(&source, &dest)]);
        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&ok)
            .unwrap();
        let installed = home.path().join(".vimrc");
        assert_eq!(std::fs::read_to_string(&installed).unwrap(), "set number");

        std::fs::remove_file(&installed).unwrap();
        let failing = Module::new("vim", vec![file_item(&source, &dest), run_item("false")]);
        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&failing)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Run);
        assert!(!installed.exists(), "created file must be removed");
        assert_eq!(
            h.statuses(),
            [ModuleStatus::Committed, ModuleStatus::RolledBack]
        );
    }

    #[test]
    fn run_failure_audits_success_then_failure() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let module = Module::new("shell", vec![run_item("true"), run_item("false")]);

        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(err.module, "shell");
        assert_eq!(err.item.as_deref(), Some("fake false"));
        assert_eq!(h.audit.outcomes(), [Outcome::Success, Outcome::Failure]);
        let entries = h.audit.entries();
        assert!(entries[1].error.as_deref().unwrap().contains("false"));
        assert_eq!(entries[0].command, "apply");
    }

    #[test]
    fn overwritten_file_is_restored_after_failure() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("gitconfig.ini");
        let target = home.path().join("gitconfig.ini");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&target, "old").unwrap();

        let module = Module::new(
            "git",
            vec![
                file_item(&source, &target.display().to_string()),
                run_item("false"),
            ],
        );
        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn non_atomic_failure_keeps_mutations() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("a.conf");
        let target = home.path().join("a.conf");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&target, "old").unwrap();

        let module = Module::new(
            "m",
            vec![
                file_item(&source, &target.display().to_string()),
                run_item("false"),
            ],
        );
        let mut opts = Options::new("apply", Os::Linux);
        opts.atomic = false;
        h.executor(opts).apply_module(&module).unwrap_err();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
        assert_eq!(h.statuses(), [ModuleStatus::Failed]);
    }

    #[test]
    fn skip_if_zero_skips_run() {
        let h = Harness::new(RecordingShell::new());
        let mut item = run_item("install-thing");
        item.skip_if = Some("command -v thing".to_string());
        let module = Module::new("m", vec![item]);

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap();

        assert_eq!(h.shell.calls(), ["command -v thing"]);
        assert_eq!(h.audit.outcomes(), [Outcome::Skipped]);
    }

    #[test]
    fn skip_if_nonzero_runs_item() {
        let h = Harness::new(RecordingShell::new().failing("command -v thing"));
        let mut item = run_item("install-thing");
        item.skip_if = Some("command -v thing".to_string());
        let module = Module::new("m", vec![item]);

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap();

        assert_eq!(h.shell.calls(), ["command -v thing", "install-thing"]);
        assert_eq!(h.audit.outcomes(), [Outcome::Success]);
    }

    #[test]
    fn already_applied_action_is_not_run() {
        let h = Harness::with_applied(RecordingShell::new(), &["brew install git"]);
        let module = Module::new("m", vec![run_item("brew install git")]);

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap();

        assert!(h.shell.calls().is_empty());
        assert_eq!(h.audit.outcomes(), [Outcome::Skipped]);
    }

    #[test]
    fn hooks_bracket_items_in_order() {
        let h = Harness::new(RecordingShell::new());
        let mut item = run_item("item");
        item.hooks = hooks("item-before", "item-after");
        let mut module = Module::new("m", vec![item, run_item("second")]);
        module.hooks = hooks("mod-before", "mod-after");

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap();

        assert_eq!(
            h.shell.calls(),
            [
                "mod-before",
                "item-before",
                "item",
                "item-after",
                "second",
                "mod-after"
            ]
        );
    }

    #[test]
    fn after_apply_skipped_when_item_fails() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let mut module = Module::new("m", vec![run_item("false")]);
        module.hooks = hooks("mod-before", "mod-after");

        h.executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(h.shell.calls(), ["mod-before", "false"]);
    }

    #[test]
    fn before_apply_failure_runs_no_items() {
        let h = Harness::new(RecordingShell::new().failing("mod-before"));
        let mut module = Module::new("m", vec![run_item("item")]);
        module.hooks = hooks("mod-before", "mod-after");

        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Hook(HookKind::BeforeApply));
        assert!(err.item.is_none());
        assert_eq!(h.shell.calls(), ["mod-before"]);
        assert!(h.audit.entries().is_empty());
    }

    #[test]
    fn sync_hooks_fire_only_with_a_sync_item() {
        let h = Harness::new(RecordingShell::new());
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("a.conf");
        std::fs::write(&source, "x").unwrap();
        let dest = home.path().join("a.conf").display().to_string();

        let mut module = Module::new("m", vec![run_item("first"), file_item(&source, &dest)]);
        module.hooks = Hooks {
            before_sync: Some("sync-before".to_string()),
            after_sync: Some("sync-after".to_string()),
            ..Hooks::default()
        };

        h.executor(Options::new("push", Os::Linux))
            .apply_module(&module)
            .unwrap();
        assert_eq!(h.shell.calls(), ["first"]);

        let h = Harness::new(RecordingShell::new());
        let mut opts = Options::new("sync", Os::Linux);
        opts.direction = Some(Direction::Sync);
        h.executor(opts).apply_module(&module).unwrap();
        assert_eq!(h.shell.calls(), ["sync-before", "first", "sync-after"]);
    }

    #[test]
    fn verify_failure_fails_the_item_and_rolls_back() {
        let h = Harness::new(RecordingShell::new().failing("check"));
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("a.conf");
        let target = home.path().join("a.conf");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&target, "old").unwrap();
        let mut item = file_item(&source, &target.display().to_string());
        item.verify = Some("check".to_string());

        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&Module::new("m", vec![item]))
            .unwrap_err();

        assert_eq!(err.phase, Phase::Verify);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
        assert_eq!(h.audit.outcomes(), [Outcome::Success]);
    }

    #[test]
    fn dry_run_mutates_nothing_and_runs_no_hooks() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("a.conf");
        std::fs::write(&source, "new").unwrap();
        let target = home.path().join("a.conf");
        let mut item = file_item(&source, &target.display().to_string());
        item.verify = Some("false".to_string());
        let mut module = Module::new("m", vec![item, run_item("false")]);
        module.hooks = hooks("mod-before", "mod-after");

        let mut opts = Options::new("apply", Os::Linux);
        opts.dry_run = true;
        h.executor(opts).apply_module(&module).unwrap();

        assert!(!target.exists());
        assert!(h.shell.calls().is_empty());
        assert_eq!(h.statuses(), [ModuleStatus::DryRun]);
    }

    #[test]
    fn apply_all_is_fail_fast_and_honours_tags() {
        let h = Harness::new(RecordingShell::new().failing("false"));
        let mut work_only = Module::new("work", vec![run_item("work")]);
        work_only.only_tags = vec!["work".to_string()];
        let modules = [
            work_only,
            Module::new("first", vec![run_item("one")]),
            Module::new("broken", vec![run_item("false")]),
            Module::new("never", vec![run_item("never")]),
        ];

        let mut opts = Options::new("apply", Os::Linux);
        opts.machine_tags = vec!["home".to_string()];
        let err = h.executor(opts).apply_all(&modules).unwrap_err();

        assert_eq!(err.module, "broken");
        assert_eq!(h.shell.calls(), ["one", "false"]);
        assert_eq!(
            h.statuses(),
            [
                ModuleStatus::SkippedByTags,
                ModuleStatus::Committed,
                ModuleStatus::RolledBack
            ]
        );
    }

    #[test]
    fn build_error_aborts_module() {
        let h = Harness::new(RecordingShell::new());
        let item = Item::new(ItemKind::Package {
            name: "x".to_string(),
            manager: "zypper".to_string(),
        });
        let module = Module::new("m", vec![item, run_item("after")]);

        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Build);
        assert_eq!(err.item.as_deref(), Some("package x"));
        assert!(h.shell.calls().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unrecordable_target_fails_before_run_and_rolls_back() {
        let repo = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let source = repo.path().join("app.conf");
        let target = home.path().join("app.conf");
        std::fs::write(&source, "new").unwrap();
        std::fs::write(&target, "old").unwrap();
        // A path below a regular file cannot be inspected (ENOTDIR).
        let h = Harness::new(RecordingShell::new())
            .with_snapshot_target("write-child", &target.join("child"));

        let module = Module::new(
            "app",
            vec![
                file_item(&source, &target.display().to_string()),
                run_item("write-child"),
            ],
        );
        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Snapshot);
        assert_eq!(err.item.as_deref(), Some("fake write-child"));
        assert!(h.shell.calls().is_empty());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "old");
        assert_eq!(h.audit.outcomes(), [Outcome::Success]);
        assert_eq!(h.statuses(), [ModuleStatus::RolledBack]);
    }

    #[test]
    fn snapshot_creation_failure_aborts_before_items() {
        let h = Harness::new(RecordingShell::new());
        let scratch = tempfile::tempdir().unwrap();
        let mut module = Module::new("m", vec![run_item("item")]);
        module.hooks = hooks("mod-before", "mod-after");
        let mut opts = Options::new("apply", Os::Linux);
        opts.snapshot_root = Some(scratch.path().join("missing"));

        let err = h.executor(opts).apply_module(&module).unwrap_err();

        assert_eq!(err.phase, Phase::Snapshot);
        assert!(err.item.is_none());
        assert_eq!(h.shell.calls(), ["mod-before"]);
        assert!(h.audit.entries().is_empty());
        assert_eq!(h.statuses(), [ModuleStatus::Failed]);
    }

    #[test]
    fn idempotency_check_error_fails_the_item() {
        let h = Harness::new(RecordingShell::new()).with_broken_check("query-state");
        let module = Module::new("m", vec![run_item("query-state"), run_item("later")]);

        let err = h
            .executor(Options::new("apply", Os::Linux))
            .apply_module(&module)
            .unwrap_err();

        assert_eq!(err.phase, Phase::Idempotency);
        assert_eq!(err.item.as_deref(), Some("fake query-state"));
        assert!(h.shell.calls().is_empty());
        assert!(h.audit.entries().is_empty());
    }
}
