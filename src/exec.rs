//! Process execution: cancellable subprocesses and the shell evaluator.
//!
//! Every external command the engine runs (hooks, `skip_if`, `verify`, and
//! the actions themselves) goes through [`wait_cancellable`], so a single
//! [`CancelToken`] tripped by Ctrl-C aborts whatever is in flight.
use anyhow::{Context as _, Result, bail};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Interval between child-process status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared cancellation flag for in-flight subprocesses.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Install a Ctrl-C handler that trips this token.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler has already been installed for the process.
    pub fn cancel_on_ctrlc(&self) -> Result<()> {
        let token = self.clone();
        ctrlc::set_handler(move || token.cancel()).context("installing Ctrl-C handler")
    }
}

/// Spawn `cmd` and wait for it, killing the child if `cancel` is tripped.
///
/// # Errors
///
/// Returns an error if the process cannot be spawned, its status cannot be
/// polled, or the wait was cancelled.
pub fn wait_cancellable(mut cmd: Command, label: &str, cancel: &CancelToken) -> Result<ExitStatus> {
    if cancel.is_cancelled() {
        bail!("{label} cancelled");
    }
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to execute: {label}"))?;
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("waiting for: {label}"))?
        {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            child.kill().ok();
            child.wait().ok();
            bail!("{label} cancelled");
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Run a program with inherited standard streams, failing on non-zero exit.
///
/// Used by actions whose output the user should see (installers, scripts).
///
/// # Errors
///
/// Returns an error if the program cannot be spawned, exits non-zero, or is
/// cancelled.
pub fn run_interactive(program: &str, args: &[&str], cancel: &CancelToken) -> Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    let status = wait_cancellable(cmd, program, cancel)?;
    if !status.success() {
        bail!("{program} failed ({})", describe_status(status));
    }
    Ok(())
}

/// Run a program silently and report whether it exited zero.
///
/// # Errors
///
/// Returns an error only if the program cannot be spawned or is cancelled.
pub fn succeeds(program: &str, args: &[&str], cancel: &CancelToken) -> Result<bool> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    Ok(wait_cancellable(cmd, program, cancel)?.success())
}

/// Check if a program is available on PATH.
#[must_use]
pub fn which(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Human-readable exit status (`exit 3`, `terminated by signal`).
pub(crate) fn describe_status(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit {c}"))
}

/// Build the platform shell invocation for an inline command string.
#[must_use]
pub fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-Command", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Evaluates user-supplied shell snippets (hooks, `skip_if`, `verify`).
pub trait Shell: Send + Sync {
    /// Run `command`; a non-zero exit is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the shell cannot be started, the command exits
    /// non-zero, or the run is cancelled.
    fn run(&self, cancel: &CancelToken, command: &str) -> Result<()>;

    /// Run `command` and report whether it exited zero.
    ///
    /// A non-zero exit is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only for real execution failures (shell missing,
    /// cancellation).
    fn eval(&self, cancel: &CancelToken, command: &str) -> Result<bool>;
}

/// [`Shell`] backed by `sh -c` (PowerShell on Windows).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl SystemShell {
    fn quiet(command: &str) -> Command {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl Shell for SystemShell {
    fn run(&self, cancel: &CancelToken, command: &str) -> Result<()> {
        let status = wait_cancellable(Self::quiet(command), command, cancel)?;
        if !status.success() {
            bail!("command {command:?} failed ({})", describe_status(status));
        }
        Ok(())
    }

    fn eval(&self, cancel: &CancelToken, command: &str) -> Result<bool> {
        Ok(wait_cancellable(Self::quiet(command), command, cancel)?.success())
    }
}
