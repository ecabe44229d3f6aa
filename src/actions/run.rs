//! Inline shell command.
use anyhow::{Result, bail};
use std::process::Stdio;

use super::{Action, dry_run};
use crate::exec::{self, CancelToken};

/// Runs a command through the platform shell with inherited output.
///
/// `after` documents which earlier item this one relies on; ordering comes
/// from declaration order alone.
#[derive(Debug, Clone)]
pub struct RunAction {
    command: String,
    after: Option<String>,
}

impl RunAction {
    /// Create a run action.
    #[must_use]
    pub const fn new(command: String, after: Option<String>) -> Self {
        Self { command, after }
    }
}

impl Action for RunAction {
    fn describe(&self) -> String {
        match &self.after {
            Some(after) => format!("run {:?} (after {after})", self.command),
            None => format!("run {:?}", self.command),
        }
    }

    fn run(&self, cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            return Ok(());
        }
        let mut cmd = exec::shell_command(&self.command);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let status = exec::wait_cancellable(cmd, &self.command, cancel)?;
        if !status.success() {
            bail!(
                "command {:?} failed ({})",
                self.command,
                exec::describe_status(status)
            );
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn describe_with_and_without_after() {
        assert_eq!(RunAction::new("make".into(), None).describe(), "run \"make\"");
        assert_eq!(
            RunAction::new("make".into(), Some("package".into())).describe(),
            "run \"make\" (after package)"
        );
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_decides_outcome() {
        let cancel = CancelToken::new();
        RunAction::new("true".into(), None).run(&cancel, false).unwrap();
        let err = RunAction::new("exit 3".into(), None)
            .run(&cancel, false)
            .unwrap_err();
        assert!(err.to_string().contains("exit 3"));
    }

    #[test]
    fn dry_run_skips_execution() {
        RunAction::new("exit 1".into(), None)
            .run(&CancelToken::new(), true)
            .unwrap();
    }
}
