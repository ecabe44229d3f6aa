//! Package installation through a named package manager.
use anyhow::Result;

use super::{Action, Idempotent, dry_run};
use crate::error::BuildError;
use crate::exec::{self, CancelToken};
use crate::platform::{Os, package_manager_os};

/// Install command for `name` with `manager`, program first.
fn install_command(manager: &str, name: &str) -> Option<Vec<String>> {
    let args: &[&str] = match manager {
        "brew" => &["brew", "install", name],
        "brew-cask" => &["brew", "install", "--cask", name],
        "mas" => &["mas", "install", name],
        "winget" => &[
            "winget",
            "install",
            "--id",
            name,
            "-e",
            "--accept-source-agreements",
        ],
        "choco" => &["choco", "install", name, "-y"],
        "scoop" => &["scoop", "install", name],
        "apt" | "apt-get" => &["sudo", "apt-get", "install", "-y", name],
        "dnf" => &["sudo", "dnf", "install", "-y", name],
        "yum" => &["sudo", "yum", "install", "-y", name],
        "pacman" => &["sudo", "pacman", "-S", "--noconfirm", name],
        "snap" => &["sudo", "snap", "install", name],
        "flatpak" => &["flatpak", "install", "-y", name],
        "nix" => &["nix-env", "-iA", name],
        _ => return None,
    };
    Some(args.iter().map(ToString::to_string).collect())
}

/// Query command that exits zero when `name` is installed.
fn check_command(manager: &str, name: &str) -> Option<Vec<String>> {
    let args: &[&str] = match manager {
        "brew" => &["brew", "list", "--formula", name],
        "brew-cask" => &["brew", "list", "--cask", name],
        "mas" => &["mas", "list"],
        "winget" => &["winget", "list", "--id", name, "-e"],
        "choco" => &["choco", "list", "--local-only", name],
        "scoop" => &["scoop", "info", name],
        "apt" | "apt-get" => &["dpkg", "-s", name],
        "dnf" | "yum" => &["rpm", "-q", name],
        "pacman" => &["pacman", "-Q", name],
        "snap" => &["snap", "list", name],
        "flatpak" => &["flatpak", "info", name],
        _ => return None,
    };
    Some(args.iter().map(ToString::to_string).collect())
}

/// Whether `manager` has an install command.
#[must_use]
pub fn is_known_manager(manager: &str) -> bool {
    install_command(manager, "").is_some()
}

/// Installs one package.
#[derive(Debug, Clone)]
pub struct PackageAction {
    name: String,
    manager: String,
    install: Vec<String>,
    check: Option<Vec<String>>,
}

impl PackageAction {
    /// Build the action for `os`; `Ok(None)` when the manager belongs to
    /// another OS.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnknownManager`] if `manager` is not supported.
    pub fn build(name: &str, manager: &str, os: Os) -> Result<Option<Self>, BuildError> {
        if package_manager_os(manager).is_some_and(|owner| owner != os) {
            return Ok(None);
        }
        let install = install_command(manager, name)
            .ok_or_else(|| BuildError::UnknownManager(manager.to_string()))?;
        Ok(Some(Self {
            name: name.to_string(),
            manager: manager.to_string(),
            install,
            check: check_command(manager, name),
        }))
    }
}

fn split(argv: &[String]) -> Option<(&str, Vec<&str>)> {
    let (program, args) = argv.split_first()?;
    Some((program.as_str(), args.iter().map(String::as_str).collect()))
}

impl Action for PackageAction {
    fn describe(&self) -> String {
        format!("install package {} via {}", self.name, self.manager)
    }

    fn run(&self, cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&format!("would run: {}", self.install.join(" ")));
            return Ok(());
        }
        let Some((program, args)) = split(&self.install) else {
            anyhow::bail!("empty install command for {}", self.name);
        };
        exec::run_interactive(program, &args, cancel)
    }

    fn idempotency(&self) -> Option<&dyn Idempotent> {
        Some(self)
    }
}

impl Idempotent for PackageAction {
    /// Any failure to run the check counts as "not installed".
    fn is_applied(&self, cancel: &CancelToken) -> Result<bool> {
        let Some((program, args)) = self.check.as_deref().and_then(split) else {
            return Ok(false);
        };
        if cancel.is_cancelled() {
            anyhow::bail!("{program} cancelled");
        }
        Ok(exec::succeeds(program, &args, cancel).unwrap_or(false))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn known_managers() {
        for m in [
            "brew", "brew-cask", "mas", "winget", "choco", "scoop", "apt", "apt-get", "dnf",
            "yum", "pacman", "snap", "flatpak", "nix",
        ] {
            assert!(is_known_manager(m), "{m} should be known");
        }
        assert!(!is_known_manager("zypper"));
    }

    #[test]
    fn install_commands() {
        assert_eq!(
            install_command("apt", "git").unwrap().join(" "),
            "sudo apt-get install -y git"
        );
        assert_eq!(
            install_command("winget", "Git.Git").unwrap().join(" "),
            "winget install --id Git.Git -e --accept-source-agreements"
        );
        assert_eq!(
            install_command("brew-cask", "wezterm").unwrap().join(" "),
            "brew install --cask wezterm"
        );
    }

    #[test]
    fn nix_has_no_check() {
        assert!(check_command("nix", "nixpkgs.git").is_none());
        let action = PackageAction::build("nixpkgs.git", "nix", Os::Linux)
            .unwrap()
            .unwrap();
        assert!(!action.is_applied(&CancelToken::new()).unwrap());
    }

    #[test]
    fn foreign_manager_builds_nothing() {
        assert!(PackageAction::build("git", "brew", Os::Linux).unwrap().is_none());
        assert!(PackageAction::build("git", "apt", Os::MacOs).unwrap().is_none());
        assert!(PackageAction::build("git", "flatpak", Os::MacOs).unwrap().is_some());
    }

    #[test]
    fn unknown_manager_is_error_on_any_os() {
        assert!(matches!(
            PackageAction::build("git", "zypper", Os::Linux),
            Err(BuildError::UnknownManager(_))
        ));
    }

    #[test]
    fn missing_check_program_means_not_applied() {
        let action = PackageAction {
            name: "x".to_string(),
            manager: "apt".to_string(),
            install: vec![],
            check: Some(vec!["dotkit-no-such-program".to_string()]),
        };
        assert!(!action.is_applied(&CancelToken::new()).unwrap());
    }

    #[test]
    fn dry_run_does_not_execute() {
        let action = PackageAction {
            name: "x".to_string(),
            manager: "apt".to_string(),
            install: vec!["dotkit-no-such-program".to_string()],
            check: None,
        };
        action.run(&CancelToken::new(), true).unwrap();
        assert_eq!(action.describe(), "install package x via apt");
    }
}
