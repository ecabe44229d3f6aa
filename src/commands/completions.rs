//! Command: `completions`.
use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionsOpts};

/// Write a completion script for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, &mut std::io::stdout());
}
