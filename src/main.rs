use anyhow::Result;
use clap::Parser;
use std::sync::Arc;

use dotkit_cli::cli::{Cli, Command};
use dotkit_cli::commands;
use dotkit_cli::exec::CancelToken;
use dotkit_cli::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    let verbose = args.verbose || matches!(args.command, Command::Status(_));
    logging::init_subscriber(verbose, name);

    let cancel = CancelToken::new();
    cancel.cancel_on_ctrlc()?;
    let log = Arc::new(Logger::new(name));
    let global = &args.global;

    match &args.command {
        Command::Apply(m) | Command::Push(m) | Command::Pull(m) | Command::Sync(m) => {
            commands::apply::run(global, m, name, args.command.direction(), &log, &cancel)
        }
        Command::Status(m) => commands::apply::status(global, m, &log, &cancel),
        Command::Verify(m) => commands::verify::run(global, m, &log, &cancel),
        Command::List => commands::list::run(global),
        Command::Platform => commands::platform::run(),
        Command::Tag(tag) => commands::tag::run(tag),
        Command::Log(opts) => commands::log::run(opts),
        Command::Completions(opts) => {
            commands::completions::run(opts);
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
