//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::style::{Tone, paint};
use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, ModuleEntry, ModuleStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// The `record_module` method is **not** included because its signature
/// differs from the `fn(&self, &str)` pattern shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// All messages are also written to a persistent log file at
/// `$XDG_CACHE_HOME/dotkit/<command>.log` (default `~/.cache/dotkit/<command>.log`)
/// by the file layer installed in [`init_subscriber`](super::init_subscriber).
#[derive(Debug)]
pub struct Logger {
    modules: Mutex<Vec<ModuleEntry>>,
    log_file: Option<PathBuf>,
}

#[allow(clippy::unused_self)]
impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the run summary; the file
    /// itself is created by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            modules: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return the log file path, if available.
    #[cfg(test)]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded module entries.
    #[must_use]
    pub fn module_entries(&self) -> Vec<ModuleEntry> {
        self.modules.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a module result for the summary.
    pub fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.modules.lock() {
            guard.push(ModuleEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the modules that failed or were rolled back.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.module_entries()
            .iter()
            .filter(|m| m.status.is_failure())
            .count()
    }

    /// Print one line per recorded module, then the totals.
    pub fn print_summary(&self) {
        let modules = self.module_entries();
        if modules.is_empty() {
            return;
        }
        self.stage("Summary");

        for module in &modules {
            let (icon, color) = module.status.glyph();
            let detail = module
                .message
                .as_deref()
                .map(|msg| format!(" ({msg})"))
                .unwrap_or_default();
            self.info(&format!("{color}{icon} {}{detail}\x1b[0m", module.name));
        }

        let count = |status| modules.iter().filter(|m| m.status == status).count();
        self.info(&format!(
            "{} modules: \x1b[32m{} committed\x1b[0m, \x1b[2m{} skipped\x1b[0m, \x1b[35m{} rolled back\x1b[0m, \x1b[31m{} failed\x1b[0m, \x1b[37m{} dry-run\x1b[0m",
            modules.len(),
            count(ModuleStatus::Committed),
            count(ModuleStatus::SkippedByTags),
            count(ModuleStatus::RolledBack),
            count(ModuleStatus::Failed),
            count(ModuleStatus::DryRun),
        ));

        if let Some(path) = &self.log_file {
            self.info(&paint(Tone::Muted, &format!("log: {}", path.display())));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_module(&self, name: &str, status: ModuleStatus, message: Option<&str>) {
        self.record_module(name, status, message);
    }
}
