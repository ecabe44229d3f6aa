//! Top-level subcommand handlers.
pub mod apply;
pub mod completions;
pub mod list;
pub mod log;
pub mod platform;
pub mod tag;
pub mod verify;
pub mod version;

use anyhow::Result;
use std::sync::Arc;

use crate::apply::{ModuleExecutor, Options};
use crate::audit::{AuditSink, FileAuditSink, NullAuditSink};
use crate::cli::GlobalOpts;
use crate::config::{Config, Direction, validation};
use crate::exec::CancelToken;
use crate::logging::Logger;
use crate::platform::Platform;
use crate::tags::{self, TagStore};

/// Shared state produced by the common command setup sequence.
///
/// Encapsulates platform detection, configuration loading and machine tag
/// resolution so that each command does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Detected platform.
    pub platform: Platform,
    /// Loaded configuration.
    pub config: Config,
    /// Tags of this machine.
    pub machine_tags: Vec<String>,
}

impl CommandSetup {
    /// Detect the platform, load the configuration and resolve machine tags.
    ///
    /// Validation warnings are logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let platform = Platform::detect();

        log.stage("Loading configuration");
        let config = Config::load(&global.config)?;
        log.info(&format!(
            "loaded {} modules from {}",
            config.modules.len(),
            global.config.display()
        ));

        let warnings = validation::validate_all(&config, &platform);
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.module, warning.item, warning.message
                ));
            }
        }

        let machine_tags = load_machine_tags(&TagStore::default_location(), log);
        log.debug(&format!("machine tags: {}", machine_tags.join(", ")));

        Ok(Self {
            platform,
            config,
            machine_tags,
        })
    }

    /// Build an executor for `command` over this setup.
    ///
    /// Audit entries go to the history file, except in dry-run.
    #[must_use]
    pub fn executor(
        &self,
        command: &str,
        direction: Option<Direction>,
        global: &GlobalOpts,
        log: &Arc<Logger>,
        cancel: &CancelToken,
    ) -> ModuleExecutor {
        let opts = Options {
            command: command.to_string(),
            os: self.platform.os,
            machine_tags: self.machine_tags.clone(),
            direction,
            dry_run: global.dry_run,
            atomic: global.atomic,
            snapshot_root: None,
        };
        let audit: Arc<dyn AuditSink> = if global.dry_run {
            Arc::new(NullAuditSink)
        } else {
            Arc::new(FileAuditSink::default_location())
        };
        ModuleExecutor::new(opts, log.clone(), cancel.clone()).with_audit(audit)
    }
}

/// Seed the tag file on first use and read it back.
///
/// Falls back to auto-detected tags when the file cannot be used.
fn load_machine_tags(store: &TagStore, log: &Logger) -> Vec<String> {
    if let Err(e) = store.ensure_initialised() {
        log.warn(&format!("cannot initialise machine tags: {e:#}"));
    }
    match store.load() {
        Ok(machine) if !machine.tags.is_empty() => machine.tags,
        Ok(_) => tags::auto_detect(),
        Err(e) => {
            log.warn(&format!("cannot read machine tags: {e:#}"));
            tags::auto_detect()
        }
    }
}

/// Print the summary and fail if any module failed or was rolled back.
///
/// # Errors
///
/// Returns an error when the logger recorded at least one failure.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} module(s) failed");
    }
    Ok(())
}
