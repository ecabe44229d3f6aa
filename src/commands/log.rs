//! Command: `log`.
use anyhow::Result;

use crate::audit::{self, AuditEntry};
use crate::cli::LogOpts;

/// Print the most recent history entries.
///
/// # Errors
///
/// Returns an error if the history file exists but cannot be read.
pub fn run(opts: &LogOpts) -> Result<()> {
    let path = audit::default_path();
    let entries = audit::read(&path, opts.module.as_deref(), opts.limit)?;
    if entries.is_empty() {
        println!("no history at {}", path.display());
        return Ok(());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

/// One history line: time, command, outcome, module, item and error.
fn format_entry(entry: &AuditEntry) -> String {
    let mut line = format!(
        "{}  {:<7} {:<8} {:<16} {}",
        entry.time.format("%Y-%m-%d %H:%M:%S"),
        entry.command,
        entry.outcome,
        entry.module,
        entry.item
    );
    if let Some(error) = &entry.error {
        line.push_str("  (");
        line.push_str(error);
        line.push(')');
    }
    line
}
