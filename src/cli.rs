//! Command-line definition.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Direction;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "dotkit",
    about = "Declarative machine setup with per-module rollback",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Configuration file
    #[arg(short, long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Do not snapshot files or roll back failed modules
    #[arg(long = "no-atomic", global = true, action = clap::ArgAction::SetFalse)]
    pub atomic: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply modules using each item's declared direction
    Apply(ModuleArgs),
    /// Apply modules, copying repository files onto the system
    Push(ModuleArgs),
    /// Apply modules, copying system files back into the repository
    Pull(ModuleArgs),
    /// Apply modules, filling whichever side of each file is missing
    Sync(ModuleArgs),
    /// Run every item's verify check without applying anything
    Verify(ModuleArgs),
    /// Show what apply would do
    Status(ModuleArgs),
    /// List configured modules
    List,
    /// Print the detected platform and machine tags
    Platform,
    /// Manage machine tags
    #[command(subcommand)]
    Tag(TagCommand),
    /// Show the apply history
    Log(LogOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Direction override implied by the subcommand.
    #[must_use]
    pub const fn direction(&self) -> Option<Direction> {
        match self {
            Self::Push(_) => Some(Direction::Push),
            Self::Pull(_) => Some(Direction::Pull),
            Self::Sync(_) => Some(Direction::Sync),
            _ => None,
        }
    }

    /// Name used for the log file and audit entries.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Apply(_) => "apply",
            Self::Push(_) => "push",
            Self::Pull(_) => "pull",
            Self::Sync(_) => "sync",
            Self::Verify(_) => "verify",
            Self::Status(_) => "status",
            Self::List => "list",
            Self::Platform => "platform",
            Self::Tag(_) => "tag",
            Self::Log(_) => "log",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Module selection for apply-like subcommands.
#[derive(Parser, Debug, Clone)]
pub struct ModuleArgs {
    /// Modules to process (all when omitted)
    pub modules: Vec<String>,
}

/// `tag` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum TagCommand {
    /// List this machine's tags
    List,
    /// Add a tag to this machine
    Add {
        /// Tag to add
        tag: String,
    },
}

/// Options for the `log` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct LogOpts {
    /// Only show entries for this module
    #[arg(short, long)]
    pub module: Option<String>,

    /// Number of most recent entries to show (0 for all)
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_with_modules() {
        let cli = Cli::parse_from(["dotkit", "apply", "vim", "git"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.modules, ["vim", "git"]);
    }

    #[test]
    fn config_defaults_to_dotkit_toml() {
        let cli = Cli::parse_from(["dotkit", "list"]);
        assert_eq!(cli.global.config, PathBuf::from("dotkit.toml"));
    }

    #[test]
    fn parse_config_short() {
        let cli = Cli::parse_from(["dotkit", "-c", "/etc/dk.toml", "list"]);
        assert_eq!(cli.global.config, PathBuf::from("/etc/dk.toml"));
    }

    #[test]
    fn parse_dry_run_after_subcommand() {
        let cli = Cli::parse_from(["dotkit", "apply", "--dry-run"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn atomic_is_enabled_by_default() {
        let cli = Cli::parse_from(["dotkit", "apply"]);
        assert!(cli.global.atomic);
        let cli = Cli::parse_from(["dotkit", "--no-atomic", "apply"]);
        assert!(!cli.global.atomic);
    }

    #[test]
    fn direction_commands() {
        let dir = |args: &[&str]| Cli::parse_from(args).command.direction();
        assert_eq!(dir(&["dotkit", "apply"]), None);
        assert_eq!(dir(&["dotkit", "push"]), Some(Direction::Push));
        assert_eq!(dir(&["dotkit", "pull", "vim"]), Some(Direction::Pull));
        assert_eq!(dir(&["dotkit", "sync"]), Some(Direction::Sync));
    }

    #[test]
    fn parse_tag_add() {
        let cli = Cli::parse_from(["dotkit", "tag", "add", "work"]);
        assert!(matches!(
            cli.command,
            Command::Tag(TagCommand::Add { ref tag }) if tag == "work"
        ));
    }

    #[test]
    fn parse_log_options() {
        let cli = Cli::parse_from(["dotkit", "log", "--module", "vim", "-n", "5"]);
        let Command::Log(opts) = cli.command else {
            panic!("expected log");
        };
        assert_eq!(opts.module.as_deref(), Some("vim"));
        assert_eq!(opts.limit, 5);
    }

    #[test]
    fn log_limit_defaults_to_twenty() {
        let cli = Cli::parse_from(["dotkit", "log"]);
        let Command::Log(opts) = cli.command else {
            panic!("expected log");
        };
        assert_eq!(opts.limit, 20);
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["dotkit", "-v", "status"]);
        assert!(cli.verbose);
        assert_eq!(cli.command.name(), "status");
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["dotkit", "completions", "zsh"]);
        assert!(matches!(cli.command, Command::Completions(_)));
    }
}
