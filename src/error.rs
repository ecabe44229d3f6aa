//! Domain-specific error types for the apply engine.
//!
//! Internal modules return typed errors (e.g., [`ApplyError`], [`ConfigError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! ApplyError  { module, item, phase, source }  : module/item execution
//! ConfigError                                  : loading and validating dotkit.toml
//! BuildError                                   : item → action conversion
//! ```

use std::fmt;
use thiserror::Error;

/// Boxed cause carried by [`ApplyError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which hook fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    /// Runs before the module or item is applied.
    BeforeApply,
    /// Runs after the module or item was applied successfully.
    AfterApply,
    /// Runs before sync-direction work.
    BeforeSync,
    /// Runs after sync-direction work.
    AfterSync,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeApply => write!(f, "before_apply"),
            Self::AfterApply => write!(f, "after_apply"),
            Self::BeforeSync => write!(f, "before_sync"),
            Self::AfterSync => write!(f, "after_sync"),
        }
    }
}

/// The step of the apply sequence at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Converting the item into an action.
    Build,
    /// Evaluating the item's `skip_if` guard.
    SkipIf,
    /// Asking the action whether it is already applied.
    Idempotency,
    /// Running a module- or item-scoped hook.
    Hook(HookKind),
    /// Creating the module snapshot or recording a path into it.
    Snapshot,
    /// Running the action.
    Run,
    /// Running the item's `verify` command.
    Verify,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::SkipIf => write!(f, "skip_if"),
            Self::Idempotency => write!(f, "idempotency check"),
            Self::Hook(kind) => write!(f, "{kind} hook"),
            Self::Snapshot => write!(f, "snapshot"),
            Self::Run => write!(f, "run"),
            Self::Verify => write!(f, "verify"),
        }
    }
}

/// A module apply failure, carrying where it happened and the original cause.
#[derive(Error, Debug)]
#[error("module {module:?}{}: {phase} failed: {source}", item_suffix(.item.as_deref()))]
pub struct ApplyError {
    /// Name of the module being applied.
    pub module: String,
    /// Description of the item being applied, if the failure is item-scoped.
    pub item: Option<String>,
    /// Step of the apply sequence that failed.
    pub phase: Phase,
    /// Underlying cause.
    #[source]
    pub source: BoxError,
}

fn item_suffix(item: Option<&str>) -> String {
    item.map_or_else(String::new, |i| format!(", item {i:?}"))
}

impl ApplyError {
    /// Create a module-scoped error (no item).
    pub fn module(module: &str, phase: Phase, source: impl Into<BoxError>) -> Self {
        Self {
            module: module.to_string(),
            item: None,
            phase,
            source: source.into(),
        }
    }

    /// Create an item-scoped error.
    pub fn item(module: &str, item: &str, phase: Phase, source: impl Into<BoxError>) -> Self {
        Self {
            module: module.to_string(),
            item: Some(item.to_string()),
            phase,
            source: source.into(),
        }
    }
}

/// Errors that arise from loading and validating the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        /// Path to the file that failed to parse.
        path: String,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// An item declares no primary field.
    #[error("module {module:?}: item #{index} has no kind (expected one of package, script, file, directory, binary, run, setting)")]
    MissingKind {
        /// Owning module.
        module: String,
        /// Zero-based position of the item in the module.
        index: usize,
    },

    /// An item declares more than one primary field.
    #[error("module {module:?}: item #{index} declares several kinds: {}", .kinds.join(", "))]
    AmbiguousKind {
        /// Owning module.
        module: String,
        /// Zero-based position of the item in the module.
        index: usize,
        /// Primary fields that were set.
        kinds: Vec<&'static str>,
    },

    /// An item field has an unusable value.
    #[error("module {module:?}: item #{index}: {message}")]
    InvalidItem {
        /// Owning module.
        module: String,
        /// Zero-based position of the item in the module.
        index: usize,
        /// What is wrong.
        message: String,
    },

    /// Two modules share a name.
    #[error("duplicate module name {0:?}")]
    DuplicateModule(String),

    /// A module named on the command line does not exist.
    #[error("unknown module {0:?}")]
    UnknownModule(String),
}

/// Errors that arise when an item cannot be turned into an action.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The package manager named by `via` has no known install command.
    #[error("unsupported package manager {0:?}")]
    UnknownManager(String),

    /// A binary source points at an archive, which is not extracted.
    #[error("binary {name:?}: archive sources are not supported ({url})")]
    ArchiveSource {
        /// Binary name.
        name: String,
        /// Offending download URL.
        url: String,
    },

    /// The item is structurally valid but cannot be resolved.
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;

    // -----------------------------------------------------------------------
    // ApplyError
    // -----------------------------------------------------------------------

    #[test]
    fn apply_error_item_display() {
        let e = ApplyError::item("shell", "run: false", Phase::Run, "exit 1");
        assert_eq!(
            e.to_string(),
            "module \"shell\", item \"run: false\": run failed: exit 1"
        );
    }

    #[test]
    fn apply_error_module_display() {
        let e = ApplyError::module("shell", Phase::Hook(HookKind::BeforeApply), "boom");
        assert_eq!(
            e.to_string(),
            "module \"shell\": before_apply hook failed: boom"
        );
    }

    #[test]
    fn apply_error_preserves_source() {
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let e = ApplyError::module("m", Phase::Snapshot, io);
        let source = e.source().expect("source");
        let io = source.downcast_ref::<io::Error>().expect("io error");
        assert_eq!(io.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn apply_error_from_anyhow_keeps_message() {
        let cause = anyhow::anyhow!("inner").context("outer");
        let e = ApplyError::item("m", "i", Phase::Verify, BoxError::from(cause));
        assert!(e.to_string().contains("verify failed: outer"));
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Build.to_string(), "build");
        assert_eq!(Phase::SkipIf.to_string(), "skip_if");
        assert_eq!(Phase::Idempotency.to_string(), "idempotency check");
        assert_eq!(
            Phase::Hook(HookKind::AfterSync).to_string(),
            "after_sync hook"
        );
    }

    // -----------------------------------------------------------------------
    // ConfigError
    // -----------------------------------------------------------------------

    #[test]
    fn config_error_io_display() {
        let e = ConfigError::Io {
            path: "/conf/dotkit.toml".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/conf/dotkit.toml"));
        assert!(e.source().is_some());
    }

    #[test]
    fn config_error_missing_kind_display() {
        let e = ConfigError::MissingKind {
            module: "git".to_string(),
            index: 2,
        };
        assert_eq!(
            e.to_string(),
            "module \"git\": item #2 has no kind (expected one of package, script, file, directory, binary, run, setting)"
        );
    }

    #[test]
    fn config_error_ambiguous_kind_display() {
        let e = ConfigError::AmbiguousKind {
            module: "git".to_string(),
            index: 0,
            kinds: vec!["package", "run"],
        };
        assert_eq!(
            e.to_string(),
            "module \"git\": item #0 declares several kinds: package, run"
        );
    }

    #[test]
    fn config_error_unknown_module_display() {
        let e = ConfigError::UnknownModule("nvim".to_string());
        assert_eq!(e.to_string(), "unknown module \"nvim\"");
    }

    // -----------------------------------------------------------------------
    // BuildError
    // -----------------------------------------------------------------------

    #[test]
    fn build_error_display() {
        assert_eq!(
            BuildError::UnknownManager("zypper".to_string()).to_string(),
            "unsupported package manager \"zypper\""
        );
        let e = BuildError::ArchiveSource {
            name: "rg".to_string(),
            url: "https://x/rg.tar.gz".to_string(),
        };
        assert!(e.to_string().contains("archive sources are not supported"));
    }

    // -----------------------------------------------------------------------
    // Send + Sync bounds
    // -----------------------------------------------------------------------

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn all_error_types_are_send_sync() {
        assert_send_sync::<ApplyError>();
        assert_send_sync::<ConfigError>();
        assert_send_sync::<BuildError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let _a: anyhow::Error = ConfigError::DuplicateModule("x".to_string()).into();
        let _b: anyhow::Error = BuildError::Invalid("x".to_string()).into();
        let _c: anyhow::Error = ApplyError::module("m", Phase::Run, "x").into();
    }
}
