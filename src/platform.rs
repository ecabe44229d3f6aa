//! Operating system detection, path expansion, and package-manager affinity.
use std::fmt;
use std::path::PathBuf;

/// Detected operating system platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// Linux and other Unix-like systems that are not macOS.
    Linux,
    /// Apple macOS.
    MacOs,
    /// Microsoft Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

impl Os {
    /// Detect the operating system this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            // Default to Linux for other Unix-like systems
            Self::Linux
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture as reported by the Rust target (`x86_64`, `aarch64`, ...).
    pub arch: &'static str,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub const fn detect() -> Self {
        Self {
            os: Os::current(),
            arch: std::env::consts::ARCH,
        }
    }

    /// Create a platform with an explicit OS (for testing).
    #[must_use]
    pub const fn new(os: Os) -> Self {
        Self {
            os,
            arch: std::env::consts::ARCH,
        }
    }
}

/// Map a package manager name to the OS it runs on.
///
/// Returns `None` for managers that are not tied to one OS (nix, flatpak, …).
#[must_use]
pub fn package_manager_os(manager: &str) -> Option<Os> {
    match manager {
        "brew" | "brew-cask" | "mas" => Some(Os::MacOs),
        "winget" | "choco" | "scoop" => Some(Os::Windows),
        "apt" | "apt-get" | "dnf" | "yum" | "pacman" | "snap" => Some(Os::Linux),
        _ => None,
    }
}

/// Return the user's home directory from `HOME` (or `USERPROFILE` on Windows).
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(target_os = "windows") {
        std::env::var("USERPROFILE").or_else(|_| std::env::var("HOME"))
    } else {
        std::env::var("HOME")
    };
    var.ok().filter(|h| !h.is_empty()).map(PathBuf::from)
}

/// Expand a leading `~` and any `$VAR` / `${VAR}` references in `path`.
///
/// Unset variables expand to the empty string. When the home directory
/// cannot be determined the tilde is left untouched.
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    let home = home_dir();
    let with_home = match (path, home) {
        ("~", Some(home)) => return PathBuf::from(expand_env(&home.to_string_lossy())),
        (p, Some(home)) if p.starts_with("~/") || p.starts_with("~\\") => {
            home.join(p.get(2..).unwrap_or_default())
                .to_string_lossy()
                .into_owned()
        }
        (p, _) => p.to_string(),
    };
    PathBuf::from(expand_env(&with_home))
}

/// Expand `$VAR` and `${VAR}` references using the process environment.
fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let name: String = if chars.peek() == Some(&'{') {
            chars.next();
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            name
        };
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }
    out
}
