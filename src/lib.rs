//! Declarative machine setup with per-module rollback.
//!
//! A `dotkit.toml` file groups items (packages, files, directories, scripts,
//! binaries, shell commands, system settings) into named modules. Each module
//! is applied as a unit: hooks fire around it, items run in declaration order,
//! and if any item fails every file the module touched is put back.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: parse and validate `dotkit.toml`
//! - **[`actions`]**: the runnable, OS-resolved form of each item kind
//! - **[`apply`]**: the module executor (hooks, guards, rollback, audit)
//! - **[`snapshot`]**: per-module filesystem snapshots used for rollback
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod actions;
pub mod apply;
pub mod audit;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod snapshot;
pub mod tags;
