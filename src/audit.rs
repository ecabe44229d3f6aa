//! Audit trail: one JSON line per item outcome.
//!
//! The engine only produces [`AuditEntry`] values and hands them to an
//! [`AuditSink`]; sinks must never fail or block an apply.
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufRead as _, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::platform::home_dir;

/// Outcome of one item evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The action (or verify check) ran and succeeded.
    Success,
    /// `skip_if` passed or the action was already applied.
    Skipped,
    /// The action (or verify check) failed.
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failure => "failure",
        })
    }
}

/// An immutable fact about one item's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the outcome was recorded.
    pub time: DateTime<Utc>,
    /// Command that produced it (`apply`, `push`, `pull`, `sync`, `verify`).
    pub command: String,
    /// Owning module.
    pub module: String,
    /// Action description.
    pub item: String,
    /// What happened.
    pub outcome: Outcome,
    /// Error text for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn now(command: &str, module: &str, item: &str, outcome: Outcome) -> Self {
        Self {
            time: Utc::now(),
            command: command.to_string(),
            module: module.to_string(),
            item: item.to_string(),
            outcome,
            error: None,
        }
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(format!("{error:#}"));
        self
    }
}

/// Fire-and-forget destination for audit entries.
pub trait AuditSink: Send + Sync {
    /// Record `entry`. Must not panic or surface errors.
    fn log(&self, entry: AuditEntry);
}

/// Appends entries as JSON lines to a file; every I/O error is swallowed.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    /// Sink writing to `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Sink writing to [`default_path`].
    #[must_use]
    pub fn default_location() -> Self {
        Self::new(default_path())
    }

    /// Path of the history file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl AuditSink for FileAuditSink {
    fn log(&self, entry: AuditEntry) {
        if let Err(e) = self.append(&entry) {
            tracing::debug!("audit log write failed: {e:#}");
        }
    }
}

/// Keeps entries in memory; used by tests and status reporting.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Outcomes in logging order.
    #[must_use]
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.entries().iter().map(|e| e.outcome).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log(&self, entry: AuditEntry) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }
}

/// Discards every entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log(&self, _entry: AuditEntry) {}
}

/// `$XDG_DATA_HOME/dotkit/history.log` (default `~/.local/share/dotkit/history.log`).
#[must_use]
pub fn default_path() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| {
            home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("dotkit")
        .join("history.log")
}

/// Read entries from `path`, optionally filtered by module.
///
/// Returns the last `limit` matching entries (all when `limit` is 0).
/// Malformed lines are skipped; a missing file yields no entries.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read(path: &Path, module: Option<&str>, limit: usize) -> Result<Vec<AuditEntry>> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("opening audit log: {}", path.display()));
        }
    };

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading audit log: {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<AuditEntry>(&line) else {
            continue;
        };
        if module.is_some_and(|m| m != entry.module) {
            continue;
        }
        entries.push(entry);
    }

    if limit > 0 && entries.len() > limit {
        entries.drain(..entries.len() - limit);
    }
    Ok(entries)
}
