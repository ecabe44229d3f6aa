//! Command: `verify`.
use anyhow::Result;
use std::sync::Arc;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ModuleArgs};
use crate::exec::CancelToken;
use crate::logging::Logger;

/// Run every declared verify check of the selected modules.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a module name is
/// unknown, or any check fails.
pub fn run(
    global: &GlobalOpts,
    args: &ModuleArgs,
    log: &Arc<Logger>,
    cancel: &CancelToken,
) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let modules = setup.config.select(&args.modules)?;

    let executor = setup.executor("verify", None, global, log, cancel);
    let passed = executor.verify_all(modules.iter().copied())?;
    log.print_summary();
    if !passed {
        anyhow::bail!("one or more verify checks failed");
    }
    Ok(())
}
