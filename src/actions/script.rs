//! Script execution, from a local file or a downloaded URL.
use anyhow::{Context as _, Result};
use std::io::Write as _;
use std::path::Path;

use super::{Action, binary, dry_run, fs};
use crate::config::ScriptSource;
use crate::exec::{self, CancelToken};

/// Interpreter for script files on this platform.
const fn interpreter() -> &'static str {
    if cfg!(target_os = "windows") {
        "powershell"
    } else {
        "bash"
    }
}

/// Runs a script with the platform interpreter.
#[derive(Debug, Clone)]
pub struct ScriptAction {
    source: ScriptSource,
}

impl ScriptAction {
    /// Create a script action.
    #[must_use]
    pub const fn new(source: ScriptSource) -> Self {
        Self { source }
    }

    fn exec_file(path: &Path, cancel: &CancelToken) -> Result<()> {
        let path = path.to_string_lossy();
        exec::run_interactive(interpreter(), &[path.as_ref()], cancel)
    }

    fn run_remote(url: &str, cancel: &CancelToken) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix("dotkit-")
            .suffix(".sh")
            .tempfile()
            .context("create temp script")?;
        binary::download(url, cancel, tmp.as_file_mut())?;
        tmp.as_file_mut().flush().context("flush temp script")?;
        fs::enforce_mode(tmp.path(), 0o755)?;
        Self::exec_file(tmp.path(), cancel)
    }
}

impl Action for ScriptAction {
    fn describe(&self) -> String {
        match &self.source {
            ScriptSource::Local(path) => format!("run script {:?} (via local)", path.display()),
            ScriptSource::Remote(url) => format!("run script {url:?} (via remote)"),
        }
    }

    fn run(&self, cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            return Ok(());
        }
        match &self.source {
            ScriptSource::Local(path) => Self::exec_file(path, cancel),
            ScriptSource::Remote(url) => Self::run_remote(url, cancel),
        }
    }
}
