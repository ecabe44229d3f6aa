// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed repository/home pair and a fluent
// builder so each integration test can set up an isolated environment
// without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotkit_cli::apply::{ModuleExecutor, Options};
use dotkit_cli::audit::MemoryAuditSink;
use dotkit_cli::config::{Config, DEFAULT_CONFIG_FILE};
use dotkit_cli::exec::CancelToken;
use dotkit_cli::logging::Logger;
use dotkit_cli::platform::Os;

/// Placeholder in config text replaced with the fake home directory.
pub const HOME: &str = "{home}";

/// An isolated repository and home directory backed by a [`tempfile::TempDir`].
///
/// Layout: `<tmp>/repo/dotkit.toml` plus sources, and `<tmp>/home/` standing
/// in for the user's home directory.
pub struct TestRepo {
    /// Temporary directory holding both trees.
    pub root: tempfile::TempDir,
}

impl TestRepo {
    /// Create empty `repo/` and `home/` directories.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("repo")).expect("create repo dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create home dir");
        Self { root }
    }

    /// Repository directory (where `dotkit.toml` lives).
    pub fn repo(&self) -> PathBuf {
        self.root.path().join("repo")
    }

    /// Fake home directory.
    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    /// Read a file under the fake home, if it exists.
    pub fn home_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.home().join(name)).ok()
    }

    /// Read a file under the repository, if it exists.
    pub fn repo_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.repo().join(name)).ok()
    }

    /// Load the configuration written by [`TestRepoBuilder::with_config`].
    pub fn load(&self) -> Config {
        Config::load(&self.repo().join(DEFAULT_CONFIG_FILE)).expect("load config")
    }
}

/// Fluent builder for [`TestRepo`].
pub struct TestRepoBuilder {
    repo: TestRepo,
}

impl TestRepoBuilder {
    /// Begin building a new, empty repository.
    pub fn new() -> Self {
        Self {
            repo: TestRepo::new(),
        }
    }

    /// Write `content` to `dotkit.toml`, replacing every `{home}` with the
    /// fake home directory.
    pub fn with_config(self, content: &str) -> Self {
        let home = self.repo.home().display().to_string();
        let text = content.replace(HOME, &home);
        std::fs::write(self.repo.repo().join(DEFAULT_CONFIG_FILE), text)
            .expect("write config file");
        self
    }

    /// Create a source file in the repository.
    pub fn with_source(self, name: &str, content: &str) -> Self {
        write_file(&self.repo.repo().join(name), content);
        self
    }

    /// Create a pre-existing file under the fake home.
    pub fn with_home_file(self, name: &str, content: &str) -> Self {
        write_file(&self.repo.home().join(name), content);
        self
    }

    /// Finish building and return the repository.
    pub fn build(self) -> TestRepo {
        self.repo
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write file");
}

/// An executor on the real shell with in-memory auditing.
pub struct TestRun {
    /// The executor under test.
    pub executor: ModuleExecutor,
    /// Audit entries it produced.
    pub audit: Arc<MemoryAuditSink>,
    /// Logger holding the module summary.
    pub log: Arc<Logger>,
}

impl TestRun {
    /// Build an executor with `configure` applied to default Linux options.
    pub fn new(configure: impl FnOnce(&mut Options)) -> Self {
        let mut opts = Options::new("apply", Os::Linux);
        configure(&mut opts);
        let audit = Arc::new(MemoryAuditSink::new());
        let log = Arc::new(Logger::new("test"));
        let executor = ModuleExecutor::new(opts, log.clone(), CancelToken::new())
            .with_audit(audit.clone());
        Self {
            executor,
            audit,
            log,
        }
    }

    /// Default atomic, non-dry-run executor.
    pub fn atomic() -> Self {
        Self::new(|_| {})
    }
}
