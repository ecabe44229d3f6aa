//! Core logging types: module entries, status, and the [`Log`] trait.

/// Module apply result for summary reporting.
#[derive(Debug, Clone)]
pub struct ModuleEntry {
    /// Module name.
    pub name: String,
    /// Final state of the module.
    pub status: ModuleStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Terminal state of a module after an apply or verify pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Every item succeeded and the snapshot was discarded.
    Committed,
    /// The module's tag filters excluded this machine.
    SkippedByTags,
    /// An item failed and the module's file mutations were reverted.
    RolledBack,
    /// An item failed without a snapshot to restore (dry-run or non-atomic).
    Failed,
    /// Module ran in dry-run mode; no changes were applied.
    DryRun,
}

impl ModuleStatus {
    /// Whether this status counts towards the run's failure total.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::RolledBack | Self::Failed)
    }

    /// Summary glyph and its ANSI colour.
    pub(super) const fn glyph(self) -> (&'static str, &'static str) {
        match self {
            Self::Committed => ("✓", "\x1b[32m"),
            Self::SkippedByTags => ("·", "\x1b[2m"),
            Self::RolledBack => ("↺", "\x1b[35m"),
            Self::Failed => ("✗", "\x1b[31m"),
            Self::DryRun => ("~", "\x1b[37m"),
        }
    }
}

/// Abstraction over logging backends.
///
/// The engine only talks to `dyn Log`, so tests can swap in a logger whose
/// output goes to an isolated subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a module result for the summary.
    fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>);
}
