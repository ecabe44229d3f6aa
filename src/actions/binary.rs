//! Single-file binary download and install.
use anyhow::{Context as _, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Action, dry_run, fs};
use crate::config::BinarySpec;
use crate::error::BuildError;
use crate::exec::CancelToken;
use crate::platform::{Os, expand_path};

/// Default install directory.
pub const DEFAULT_INSTALL_DIR: &str = "~/.local/bin";

/// User-Agent sent with every download.
const USER_AGENT: &str = "dotkit/1";

const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar.xz", ".tar.bz2", ".zip"];

/// Whether `url` points at an archive rather than a bare binary.
#[must_use]
pub fn is_archive(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Stream `url` into `out`, requiring HTTP 200.
///
/// # Errors
///
/// Returns an error on network failure, a non-200 status, or a write failure.
pub(crate) fn download(url: &str, cancel: &CancelToken, out: &mut impl Write) -> Result<()> {
    if cancel.is_cancelled() {
        bail!("download {url} cancelled");
    }
    let mut response = ureq::get(url)
        .header("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("download {url}"))?;
    let status = response.status().as_u16();
    if status != 200 {
        bail!("download {url}: HTTP {status}");
    }
    let mut reader = response.body_mut().as_reader();
    std::io::copy(&mut reader, out).with_context(|| format!("reading body of {url}"))?;
    Ok(())
}

/// Downloads a binary and installs it with mode 0755.
#[derive(Debug, Clone)]
pub struct BinaryAction {
    name: String,
    version: Option<String>,
    url: String,
    install_dir: PathBuf,
    sha256: Option<String>,
}

impl BinaryAction {
    /// Build the action for `os`; `Ok(None)` when no source URL is given for it.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ArchiveSource`] when the URL names an archive.
    pub fn build(spec: &BinarySpec, os: Os) -> Result<Option<Self>, BuildError> {
        let Some(url) = spec.source.for_os(os) else {
            return Ok(None);
        };
        if is_archive(url) {
            return Err(BuildError::ArchiveSource {
                name: spec.name.clone(),
                url: url.to_string(),
            });
        }
        let install_to = spec.install_to.as_deref().unwrap_or(DEFAULT_INSTALL_DIR);
        Ok(Some(Self {
            name: spec.name.clone(),
            version: spec.version.clone(),
            url: url.to_string(),
            install_dir: expand_path(install_to),
            sha256: spec.sha256.clone(),
        }))
    }

    fn destination(&self) -> PathBuf {
        self.install_dir.join(&self.name)
    }

    fn install(&self, cancel: &CancelToken) -> Result<()> {
        std::fs::create_dir_all(&self.install_dir)
            .with_context(|| format!("create install dir: {}", self.install_dir.display()))?;

        // Stage next to the destination so the final rename is atomic.
        let mut tmp = tempfile::Builder::new()
            .prefix(".dotkit-bin-")
            .tempfile_in(&self.install_dir)
            .context("create temp file")?;
        download(&self.url, cancel, tmp.as_file_mut())?;
        tmp.as_file_mut().flush().context("flush download")?;

        if let Some(expected) = &self.sha256 {
            verify_checksum(tmp.path(), expected, &self.name)?;
        }

        let dest = self.destination();
        tmp.persist(&dest)
            .with_context(|| format!("install {}", dest.display()))?;
        fs::enforce_mode(&dest, 0o755)
    }
}

fn verify_checksum(path: &Path, expected: &str, name: &str) -> Result<()> {
    let actual = fs::compute_sha256(path)?;
    if actual != expected {
        bail!("checksum mismatch for {name}: expected {expected}, got {actual}");
    }
    Ok(())
}

impl Action for BinaryAction {
    fn describe(&self) -> String {
        let version = self
            .version
            .as_deref()
            .map(|v| format!("@{v}"))
            .unwrap_or_default();
        format!(
            "install binary {}{version} -> {}",
            self.name,
            self.install_dir.display()
        )
    }

    fn run(&self, cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            return Ok(());
        }
        self.install(cancel)
    }

    fn snapshot_target(&self) -> Option<PathBuf> {
        Some(self.destination())
    }
}
