//! Item schema: the flat on-disk record and the validated [`ItemKind`] union.
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::module::Hooks;
use crate::platform::Os;

/// Transfer direction for file and directory items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Repository → system.
    #[default]
    Push,
    /// System → repository.
    Pull,
    /// Whichever side is missing is filled from the other.
    Sync,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::Pull => write!(f, "pull"),
            Self::Sync => write!(f, "sync"),
        }
    }
}

/// A value that is either shared by every OS or given per OS.
///
/// ```toml
/// destination = "~/"
/// destination = { macos = "~/Library/Preferences", linux = "~/.config" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PlatformValue {
    /// One value for every OS.
    Any(String),
    /// Explicit per-OS values; a missing OS means "not applicable there".
    PerOs {
        /// macOS value.
        #[serde(default)]
        macos: Option<String>,
        /// Windows value.
        #[serde(default)]
        windows: Option<String>,
        /// Linux value.
        #[serde(default)]
        linux: Option<String>,
    },
}

impl PlatformValue {
    /// Resolve the value for `os`; `None` (or empty) means not applicable.
    #[must_use]
    pub fn for_os(&self, os: Os) -> Option<&str> {
        let value = match self {
            Self::Any(v) => Some(v.as_str()),
            Self::PerOs {
                macos,
                windows,
                linux,
            } => match os {
                Os::MacOs => macos.as_deref(),
                Os::Windows => windows.as_deref(),
                Os::Linux => linux.as_deref(),
            },
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Typed value for a system setting.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

impl TryFrom<toml::Value> for SettingValue {
    type Error = String;

    fn try_from(value: toml::Value) -> Result<Self, Self::Error> {
        match value {
            toml::Value::Boolean(b) => Ok(Self::Bool(b)),
            toml::Value::Integer(i) => Ok(Self::Int(i)),
            toml::Value::Float(f) => Ok(Self::Float(f)),
            toml::Value::String(s) => Ok(Self::String(s)),
            other => Err(format!(
                "setting value must be a bool, integer, float or string, got {}",
                other.type_str()
            )),
        }
    }
}

/// Where a script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// A script file on disk.
    Local(PathBuf),
    /// A URL downloaded before execution.
    Remote(String),
}

/// Shared fields of file and directory items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSpec {
    /// Repository-side path.
    pub source: PathBuf,
    /// System-side destination (may contain `~` and `$VARS`).
    pub destination: PlatformValue,
    /// Declared direction.
    pub direction: Direction,
    /// Symlink instead of copying.
    pub link: bool,
    /// Unix mode enforced after every write.
    pub permissions: Option<u32>,
}

/// A downloadable single-file binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySpec {
    /// Installed file name.
    pub name: String,
    /// Version, for display only.
    pub version: Option<String>,
    /// Download URL per OS.
    pub source: PlatformValue,
    /// Install directory (defaults to `~/.local/bin`).
    pub install_to: Option<String>,
    /// Expected SHA-256 of the download, lowercase hex.
    pub sha256: Option<String>,
}

/// The kind of an item, with the fields that kind needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Install a package with a package manager.
    Package {
        /// Package name.
        name: String,
        /// Package manager (`brew`, `apt`, `winget`, ...).
        manager: String,
    },
    /// Run a script file.
    Script(ScriptSource),
    /// Copy or link a single file.
    File(TransferSpec),
    /// Copy or link a directory tree.
    Directory(TransferSpec),
    /// Download and install a binary.
    Binary(BinarySpec),
    /// Run an inline shell command.
    Run {
        /// Command passed to the platform shell.
        command: String,
        /// Informational ordering note.
        after: Option<String>,
    },
    /// Write a system setting.
    Setting {
        /// macOS defaults domain or Windows registry path.
        domain: String,
        /// Setting key.
        key: String,
        /// Value to write.
        value: SettingValue,
    },
}

impl ItemKind {
    /// Short kind name, matching the primary config field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Package { .. } => "package",
            Self::Script(_) => "script",
            Self::File(_) => "file",
            Self::Directory(_) => "directory",
            Self::Binary(_) => "binary",
            Self::Run { .. } => "run",
            Self::Setting { .. } => "setting",
        }
    }

    /// Transfer fields for file and directory items.
    #[must_use]
    pub const fn transfer(&self) -> Option<&TransferSpec> {
        match self {
            Self::File(spec) | Self::Directory(spec) => Some(spec),
            _ => None,
        }
    }
}

/// A validated configuration item.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// What the item does.
    pub kind: ItemKind,
    /// Shell guard; exit zero skips the item.
    pub skip_if: Option<String>,
    /// Post-apply check; non-zero exit fails the item.
    pub verify: Option<String>,
    /// Item-scoped hooks.
    pub hooks: Hooks,
}

impl Item {
    /// Create an item with no guards or hooks.
    #[must_use]
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            skip_if: None,
            verify: None,
            hooks: Hooks::default(),
        }
    }

    /// Effective direction for file/directory items.
    ///
    /// Link items are always push. Otherwise `override_dir` wins over the
    /// declared direction. Other kinds have no direction.
    #[must_use]
    pub fn effective_direction(&self, override_dir: Option<Direction>) -> Option<Direction> {
        let spec = self.kind.transfer()?;
        if spec.link {
            return Some(Direction::Push);
        }
        Some(override_dir.unwrap_or(spec.direction))
    }

    /// Whether this item runs in sync direction.
    #[must_use]
    pub fn is_sync(&self, override_dir: Option<Direction>) -> bool {
        self.effective_direction(override_dir) == Some(Direction::Sync)
    }

    /// Short label used before an action exists (e.g. in build errors).
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            ItemKind::Package { name, .. } => format!("package {name}"),
            ItemKind::Script(ScriptSource::Local(p)) => format!("script {}", p.display()),
            ItemKind::Script(ScriptSource::Remote(url)) => format!("script {url}"),
            ItemKind::File(spec) | ItemKind::Directory(spec) => {
                format!("{} {}", self.kind.name(), spec.source.display())
            }
            ItemKind::Binary(spec) => format!("binary {}", spec.name),
            ItemKind::Run { command, .. } => format!("run {command}"),
            ItemKind::Setting { domain, key, .. } => format!("setting {domain} {key}"),
        }
    }

    /// Resolve relative repository paths against `base` (the config file's directory).
    pub(super) fn resolve_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        match &mut self.kind {
            ItemKind::File(spec) | ItemKind::Directory(spec) => rebase(&mut spec.source),
            ItemKind::Script(ScriptSource::Local(path)) => rebase(path),
            _ => {}
        }
    }
}

/// Why a raw item could not become an [`Item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemError {
    /// No primary field set.
    NoKind,
    /// More than one primary field set.
    Ambiguous(Vec<&'static str>),
    /// A field value is unusable.
    Invalid(String),
}

/// Flat on-disk item record; exactly one primary field must be set.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawItem {
    package: Option<String>,
    script: Option<String>,
    file: Option<String>,
    directory: Option<String>,
    binary: Option<String>,
    run: Option<String>,
    setting: Option<String>,

    via: Option<String>,
    key: Option<String>,
    value: Option<toml::Value>,
    destination: Option<PlatformValue>,
    direction: Option<Direction>,
    #[serde(default)]
    link: bool,
    permissions: Option<String>,
    version: Option<String>,
    source: Option<PlatformValue>,
    install_to: Option<String>,
    sha256: Option<String>,
    after: Option<String>,

    skip_if: Option<String>,
    verify: Option<String>,
    #[serde(default)]
    hooks: Hooks,
}

/// Parse a Unix octal mode string such as `"0600"` or `"755"`.
fn parse_mode(s: &str) -> Result<u32, ItemError> {
    let valid_len = (3..=4).contains(&s.len());
    match u32::from_str_radix(s, 8) {
        Ok(mode) if valid_len && mode <= 0o7777 => Ok(mode),
        _ => Err(ItemError::Invalid(format!(
            "invalid permissions {s:?}: expected an octal mode like \"0644\""
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawItem {
    fn primary_fields(&self) -> Vec<&'static str> {
        [
            ("package", self.package.is_some()),
            ("script", self.script.is_some()),
            ("file", self.file.is_some()),
            ("directory", self.directory.is_some()),
            ("binary", self.binary.is_some()),
            ("run", self.run.is_some()),
            ("setting", self.setting.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    fn transfer(&mut self, source: String) -> Result<TransferSpec, ItemError> {
        let destination = self
            .destination
            .take()
            .ok_or_else(|| ItemError::Invalid(format!("{source:?} requires a destination")))?;
        let permissions = self.permissions.as_deref().map(parse_mode).transpose()?;
        Ok(TransferSpec {
            source: PathBuf::from(source),
            destination,
            direction: self.direction.unwrap_or_default(),
            link: self.link,
            permissions,
        })
    }
}

impl TryFrom<RawItem> for Item {
    type Error = ItemError;

    fn try_from(mut raw: RawItem) -> Result<Self, Self::Error> {
        let kinds = raw.primary_fields();
        if kinds.len() > 1 {
            return Err(ItemError::Ambiguous(kinds));
        }

        let kind = if let Some(name) = raw.package.take() {
            let manager = non_empty(raw.via.take()).ok_or_else(|| {
                ItemError::Invalid(format!("package {name:?} requires `via` (package manager)"))
            })?;
            ItemKind::Package { name, manager }
        } else if let Some(script) = raw.script.take() {
            match raw.via.as_deref() {
                None | Some("" | "local") => ItemKind::Script(ScriptSource::Local(script.into())),
                Some("remote") => ItemKind::Script(ScriptSource::Remote(script)),
                Some(other) => {
                    return Err(ItemError::Invalid(format!(
                        "unknown script source {other:?}; expected \"local\" or \"remote\""
                    )));
                }
            }
        } else if let Some(file) = raw.file.take() {
            ItemKind::File(raw.transfer(file)?)
        } else if let Some(dir) = raw.directory.take() {
            ItemKind::Directory(raw.transfer(dir)?)
        } else if let Some(name) = raw.binary.take() {
            let source = raw
                .source
                .take()
                .ok_or_else(|| ItemError::Invalid(format!("binary {name:?} requires `source`")))?;
            ItemKind::Binary(BinarySpec {
                name,
                version: non_empty(raw.version.take()),
                source,
                install_to: non_empty(raw.install_to.take()),
                sha256: non_empty(raw.sha256.take()).map(|s| s.to_ascii_lowercase()),
            })
        } else if let Some(command) = raw.run.take() {
            ItemKind::Run {
                command,
                after: non_empty(raw.after.take()),
            }
        } else if let Some(domain) = raw.setting.take() {
            let key = non_empty(raw.key.take())
                .ok_or_else(|| ItemError::Invalid(format!("setting {domain:?} requires `key`")))?;
            let value = raw
                .value
                .take()
                .ok_or_else(|| ItemError::Invalid(format!("setting {domain:?} requires `value`")))?;
            ItemKind::Setting {
                domain,
                key,
                value: SettingValue::try_from(value).map_err(ItemError::Invalid)?,
            }
        } else {
            return Err(ItemError::NoKind);
        };

        Ok(Self {
            kind,
            skip_if: non_empty(raw.skip_if),
            verify: non_empty(raw.verify),
            hooks: raw.hooks,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Result<Item, ItemError> {
        let raw: RawItem = toml::from_str(src).expect("valid toml");
        Item::try_from(raw)
    }

    #[test]
    fn package_requires_via() {
        let item = parse("package = \"git\"\nvia = \"brew\"").unwrap();
        assert_eq!(
            item.kind,
            ItemKind::Package {
                name: "git".to_string(),
                manager: "brew".to_string()
            }
        );
        assert!(matches!(parse("package = \"git\""), Err(ItemError::Invalid(_))));
    }

    #[test]
    fn no_primary_field_is_rejected() {
        assert_eq!(parse("verify = \"true\""), Err(ItemError::NoKind));
    }

    #[test]
    fn several_primary_fields_are_rejected() {
        assert_eq!(
            parse("package = \"git\"\nrun = \"true\"\nvia = \"apt\""),
            Err(ItemError::Ambiguous(vec!["package", "run"]))
        );
    }

    #[test]
    fn unknown_field_is_a_parse_error() {
        assert!(toml::from_str::<RawItem>("run = \"true\"\nbogus = 1").is_err());
    }

    #[test]
    fn file_with_string_destination() {
        let item = parse("file = \".vimrc\"\ndestination = \"~/\"").unwrap();
        let ItemKind::File(spec) = &item.kind else {
            panic!("expected file item");
        };
        assert_eq!(spec.source, PathBuf::from(".vimrc"));
        assert_eq!(spec.destination.for_os(Os::Linux), Some("~/"));
        assert_eq!(spec.direction, Direction::Push);
        assert!(!spec.link);
    }

    #[test]
    fn file_with_per_os_destination() {
        let item = parse(
            "file = \"settings.json\"\ndirection = \"sync\"\npermissions = \"0600\"\n\
             destination = { macos = \"~/Library/Code\" }",
        )
        .unwrap();
        let spec = item.kind.transfer().unwrap();
        assert_eq!(spec.destination.for_os(Os::MacOs), Some("~/Library/Code"));
        assert_eq!(spec.destination.for_os(Os::Linux), None);
        assert_eq!(spec.permissions, Some(0o600));
        assert!(item.is_sync(None));
    }

    #[test]
    fn file_requires_destination() {
        assert!(matches!(parse("file = \"a\""), Err(ItemError::Invalid(_))));
    }

    #[test]
    fn invalid_permissions_are_rejected() {
        assert!(parse("file = \"a\"\ndestination = \"~/\"\npermissions = \"0999\"").is_err());
        assert!(parse("file = \"a\"\ndestination = \"~/\"\npermissions = \"64\"").is_err());
    }

    #[test]
    fn link_items_ignore_direction_override() {
        let item = parse("file = \"a\"\ndestination = \"~/\"\nlink = true\ndirection = \"sync\"")
            .unwrap();
        assert_eq!(item.effective_direction(Some(Direction::Pull)), Some(Direction::Push));
        assert!(!item.is_sync(Some(Direction::Sync)));
    }

    #[test]
    fn override_replaces_declared_direction() {
        let item = parse("directory = \"nvim\"\ndestination = \"~/.config/\"").unwrap();
        assert_eq!(item.effective_direction(None), Some(Direction::Push));
        assert!(item.is_sync(Some(Direction::Sync)));
    }

    #[test]
    fn non_transfer_items_have_no_direction() {
        let item = parse("run = \"true\"").unwrap();
        assert_eq!(item.effective_direction(Some(Direction::Sync)), None);
    }

    #[test]
    fn script_sources() {
        let local = parse("script = \"install.sh\"").unwrap();
        assert_eq!(
            local.kind,
            ItemKind::Script(ScriptSource::Local(PathBuf::from("install.sh")))
        );
        let remote = parse("script = \"https://x/i.sh\"\nvia = \"remote\"").unwrap();
        assert_eq!(
            remote.kind,
            ItemKind::Script(ScriptSource::Remote("https://x/i.sh".to_string()))
        );
        assert!(parse("script = \"x\"\nvia = \"ftp\"").is_err());
    }

    #[test]
    fn setting_values_are_typed() {
        let item = parse("setting = \"com.apple.dock\"\nkey = \"autohide\"\nvalue = true").unwrap();
        let ItemKind::Setting { value, .. } = item.kind else {
            panic!("expected setting");
        };
        assert_eq!(value, SettingValue::Bool(true));
        assert!(parse("setting = \"d\"\nkey = \"k\"\nvalue = [1]").is_err());
        assert!(parse("setting = \"d\"\nvalue = 1").is_err());
    }

    #[test]
    fn binary_lowercases_checksum() {
        let item = parse(
            "binary = \"rg\"\nsha256 = \"ABCD\"\nsource = { linux = \"https://x/rg\" }",
        )
        .unwrap();
        let ItemKind::Binary(spec) = item.kind else {
            panic!("expected binary");
        };
        assert_eq!(spec.sha256.as_deref(), Some("abcd"));
        assert_eq!(spec.source.for_os(Os::Windows), None);
    }

    #[test]
    fn hooks_and_guards_are_kept() {
        let item = parse(
            "run = \"make\"\nskip_if = \"test -f out\"\nverify = \"test -f out\"\n\
             [hooks]\nbefore_apply = \"echo hi\"",
        )
        .unwrap();
        assert_eq!(item.skip_if.as_deref(), Some("test -f out"));
        assert_eq!(item.hooks.before_apply.as_deref(), Some("echo hi"));
    }

    #[test]
    fn resolve_paths_rebases_relative_sources() {
        let mut item = parse("file = \"zshrc\"\ndestination = \"~/\"").unwrap();
        item.resolve_paths(Path::new("/repo"));
        assert_eq!(item.kind.transfer().unwrap().source, PathBuf::from("/repo/zshrc"));
    }

    #[test]
    fn labels() {
        assert_eq!(parse("run = \"true\"").unwrap().label(), "run true");
        assert_eq!(
            parse("package = \"git\"\nvia = \"apt\"").unwrap().label(),
            "package git"
        );
    }
}
