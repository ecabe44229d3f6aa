//! Fakes and fixtures for executor tests.
//!
//! Run items become [`FakeAction`]s whose `run` goes through the shared
//! [`RecordingShell`], so hooks, guards and actions land in one ordered
//! journal. Every other kind goes to the real builder.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, bail};

use super::{ModuleExecutor, Options};
use crate::actions::{Action, ActionBuilder, Built, DefaultActionBuilder, Idempotent};
use crate::audit::MemoryAuditSink;
use crate::config::{Direction, Item, ItemKind, PlatformValue, TransferSpec};
use crate::error::BuildError;
use crate::exec::CancelToken;
use crate::exec::test_helpers::RecordingShell;
use crate::logging::{Logger, ModuleStatus, isolated_logger};
use crate::platform::Os;

/// What a [`FakeAction`]'s idempotency check reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    None,
    Applied,
    Broken,
}

/// Stand-in for a run item that records itself in the shell journal.
#[derive(Debug)]
pub struct FakeAction {
    command: String,
    check: Check,
    target: Option<PathBuf>,
    shell: Arc<RecordingShell>,
}

impl Action for FakeAction {
    fn describe(&self) -> String {
        format!("fake {}", self.command)
    }

    fn run(&self, cancel: &CancelToken, dry_run: bool) -> Result<()> {
        if dry_run {
            return Ok(());
        }
        crate::exec::Shell::run(self.shell.as_ref(), cancel, &self.command)
    }

    fn idempotency(&self) -> Option<&dyn Idempotent> {
        (self.check != Check::None).then_some(self as &dyn Idempotent)
    }

    fn snapshot_target(&self) -> Option<PathBuf> {
        self.target.clone()
    }
}

impl Idempotent for FakeAction {
    fn is_applied(&self, _: &CancelToken) -> Result<bool> {
        if self.check == Check::Broken {
            bail!("cannot query state of {:?}", self.command);
        }
        Ok(true)
    }
}

/// Builds [`FakeAction`]s for run items and real actions for the rest.
#[derive(Debug, Clone)]
pub struct FakeBuilder {
    shell: Arc<RecordingShell>,
    applied: HashSet<String>,
    broken: HashSet<String>,
    targets: HashMap<String, PathBuf>,
}

impl ActionBuilder for FakeBuilder {
    fn build(
        &self,
        item: &Item,
        os: Os,
        direction: Option<Direction>,
    ) -> Result<Built, BuildError> {
        match &item.kind {
            ItemKind::Run { command, .. } => {
                let check = if self.broken.contains(command) {
                    Check::Broken
                } else if self.applied.contains(command) {
                    Check::Applied
                } else {
                    Check::None
                };
                Ok(Built::Action(Box::new(FakeAction {
                    command: command.clone(),
                    check,
                    target: self.targets.get(command).cloned(),
                    shell: Arc::clone(&self.shell),
                })))
            }
            _ => DefaultActionBuilder.build(item, os, direction),
        }
    }
}

/// Recording collaborators plus an isolated logger.
pub struct Harness {
    /// Journal of hooks, guards, verify checks and fake runs.
    pub shell: Arc<RecordingShell>,
    /// Captured audit entries.
    pub audit: Arc<MemoryAuditSink>,
    /// Logger collecting the module summary.
    pub log: Arc<Logger>,
    builder: FakeBuilder,
    _log_dir: tempfile::TempDir,
    _guard: tracing::dispatcher::DefaultGuard,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness").finish_non_exhaustive()
    }
}

impl Harness {
    /// Harness around `shell` with no pre-applied actions.
    #[must_use]
    pub fn new(shell: RecordingShell) -> Self {
        Self::with_applied(shell, &[])
    }

    /// Harness where the run items named in `applied` report already applied.
    #[must_use]
    pub fn with_applied(shell: RecordingShell, applied: &[&str]) -> Self {
        let (log, log_dir, guard) = isolated_logger();
        let shell = Arc::new(shell);
        Self {
            builder: FakeBuilder {
                shell: Arc::clone(&shell),
                applied: applied.iter().map(ToString::to_string).collect(),
                broken: HashSet::new(),
                targets: HashMap::new(),
            },
            shell,
            audit: Arc::new(MemoryAuditSink::new()),
            log: Arc::new(log),
            _log_dir: log_dir,
            _guard: guard,
        }
    }

    /// Make the run item `command` record `target` in the snapshot before
    /// it runs.
    #[must_use]
    pub fn with_snapshot_target(mut self, command: &str, target: &Path) -> Self {
        self.builder
            .targets
            .insert(command.to_string(), target.to_path_buf());
        self
    }

    /// Make the idempotency check of the run item `command` fail.
    #[must_use]
    pub fn with_broken_check(mut self, command: &str) -> Self {
        self.builder.broken.insert(command.to_string());
        self
    }

    /// Executor wired to this harness.
    #[must_use]
    pub fn executor(&self, opts: Options) -> ModuleExecutor {
        ModuleExecutor::new(opts, self.log.clone(), CancelToken::new())
            .with_shell(self.shell.clone())
            .with_audit(self.audit.clone())
            .with_builder(Arc::new(self.builder.clone()))
    }

    /// Recorded module statuses, in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<ModuleStatus> {
        self.log.module_entries().iter().map(|m| m.status).collect()
    }
}

/// A run item.
#[must_use]
pub fn run_item(command: &str) -> Item {
    Item::new(ItemKind::Run {
        command: command.to_string(),
        after: None,
    })
}

/// A push file item copying `source` to `destination`.
#[must_use]
pub fn file_item(source: &Path, destination: &str) -> Item {
    Item::new(ItemKind::File(TransferSpec {
        source: source.to_path_buf(),
        destination: PlatformValue::Any(destination.to_string()),
        direction: Direction::Push,
        link: false,
        permissions: None,
    }))
}
