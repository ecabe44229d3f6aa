#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Integration tests for the command-line surface.
//!
//! Snapshots pin the subcommand and global flag names so renames show up
//! as reviewable diffs.

use clap::CommandFactory;
use dotkit_cli::cli::Cli;

fn names<'a>(iter: impl Iterator<Item = &'a str>) -> String {
    iter.collect::<Vec<_>>().join("\n")
}

#[test]
fn subcommand_names() {
    let cmd = Cli::command();
    insta::assert_snapshot!(names(cmd.get_subcommands().map(clap::Command::get_name)), @r"
    apply
    push
    pull
    sync
    verify
    status
    list
    platform
    tag
    log
    completions
    version
    ");
}

#[test]
fn global_flags() {
    let cmd = Cli::command();
    let longs = cmd
        .get_arguments()
        .filter(|a| a.is_global_set())
        .filter_map(clap::Arg::get_long);
    insta::assert_snapshot!(names(longs), @r"
    verbose
    config
    dry-run
    no-atomic
    ");
}

#[test]
fn tag_subcommands() {
    let cmd = Cli::command();
    let tag = cmd.find_subcommand("tag").expect("tag subcommand");
    insta::assert_snapshot!(names(tag.get_subcommands().map(clap::Command::get_name)), @r"
    list
    add
    ");
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}
