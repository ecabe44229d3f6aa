//! Command: `list`.
use anyhow::Result;
use std::fmt::Write as _;

use crate::cli::GlobalOpts;
use crate::config::{Config, Module};
use crate::tags::{self, TagStore};

/// Print every configured module with its item count and tag filters.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(global: &GlobalOpts) -> Result<()> {
    let config = Config::load(&global.config)?;
    let machine = TagStore::default_location()
        .load()
        .map(|m| m.tags)
        .unwrap_or_default();
    for module in &config.modules {
        let applies = tags::matches(&machine, &module.only_tags, &module.exclude_tags);
        println!("{}", describe(module, applies));
    }
    Ok(())
}

/// One-line listing of `module`.
fn describe(module: &Module, applies: bool) -> String {
    let mut line = format!("{:<20} {} item(s)", module.name, module.items.len());
    if !module.only_tags.is_empty() {
        let _ = write!(line, "  only: {}", module.only_tags.join(","));
    }
    if !module.exclude_tags.is_empty() {
        let _ = write!(line, "  exclude: {}", module.exclude_tags.join(","));
    }
    if !applies {
        line.push_str("  [skipped on this machine]");
    }
    line
}
