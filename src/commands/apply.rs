//! Commands: `apply`, `push`, `pull`, `sync` and `status`.
use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, finish};
use crate::cli::{GlobalOpts, ModuleArgs};
use crate::config::Direction;
use crate::exec::CancelToken;
use crate::logging::Logger;

/// Apply the selected modules.
///
/// `command` names the run in audit entries; `direction` overrides the
/// direction of every non-link file and directory item.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a module name is
/// unknown, or a module fails.
pub fn run(
    global: &GlobalOpts,
    args: &ModuleArgs,
    command: &str,
    direction: Option<Direction>,
    log: &Arc<Logger>,
    cancel: &CancelToken,
) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let modules = setup.config.select(&args.modules)?;
    if global.dry_run {
        log.info("dry run: no changes will be made");
    }

    let executor = setup.executor(command, direction, global, log, cancel);
    let result = executor.apply_all(modules.iter().copied());
    if let Err(e) = &result {
        log.error(&e.to_string());
    }
    finish(log)?;
    Ok(result?)
}

/// Show what `apply` would do: a verbose dry run.
///
/// # Errors
///
/// Same as [`run`].
pub fn status(
    global: &GlobalOpts,
    args: &ModuleArgs,
    log: &Arc<Logger>,
    cancel: &CancelToken,
) -> Result<()> {
    let preview = GlobalOpts {
        dry_run: true,
        ..global.clone()
    };
    run(&preview, args, "status", None, log, cancel)
}
