//! System preference writes: macOS `defaults` and the Windows registry.
use anyhow::Result;

use super::{Action, dry_run};
use crate::config::SettingValue;
use crate::exec::{self, CancelToken};
use crate::platform::Os;

/// Writes one system setting.
#[derive(Debug, Clone)]
pub struct SettingAction {
    domain: String,
    key: String,
    value: SettingValue,
    os: Os,
}

impl SettingAction {
    /// Build for `os`; `None` where system settings are not supported (Linux).
    #[must_use]
    pub fn build(domain: &str, key: &str, value: &SettingValue, os: Os) -> Option<Self> {
        (os != Os::Linux).then(|| Self {
            domain: domain.to_string(),
            key: key.to_string(),
            value: value.clone(),
            os,
        })
    }

    /// `defaults write` argument vector (without the program).
    fn defaults_args(&self) -> Vec<String> {
        let (flag, value) = match &self.value {
            SettingValue::Bool(b) => ("-bool", b.to_string()),
            SettingValue::Int(i) => ("-int", i.to_string()),
            SettingValue::Float(f) => ("-float", f.to_string()),
            SettingValue::String(s) => ("-string", s.clone()),
        };
        vec![
            "write".to_string(),
            self.domain.clone(),
            self.key.clone(),
            flag.to_string(),
            value,
        ]
    }

    /// PowerShell script writing the value under the registry key `domain`.
    fn registry_script(&self) -> String {
        let (kind, value) = match &self.value {
            SettingValue::Bool(b) => ("DWord", u8::from(*b).to_string()),
            SettingValue::Int(i) if i32::try_from(*i).is_ok() => ("DWord", i.to_string()),
            SettingValue::Int(i) => ("QWord", i.to_string()),
            SettingValue::Float(f) => ("String", quote(&f.to_string())),
            SettingValue::String(s) => ("String", quote(s)),
        };
        let path = quote(&self.domain);
        format!(
            "if (-not (Test-Path {path})) {{ New-Item -Path {path} -Force | Out-Null }}; \
             New-ItemProperty -Path {path} -Name {name} -Value {value} \
             -PropertyType {kind} -Force | Out-Null",
            name = quote(&self.key),
        )
    }
}

/// Single-quote a PowerShell string literal.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl Action for SettingAction {
    fn describe(&self) -> String {
        format!("set {} {} = {}", self.domain, self.key, self.value)
    }

    fn run(&self, cancel: &CancelToken, dry_run_mode: bool) -> Result<()> {
        if dry_run_mode {
            dry_run(&self.describe());
            return Ok(());
        }
        match self.os {
            Os::MacOs => {
                let args = self.defaults_args();
                let args: Vec<&str> = args.iter().map(String::as_str).collect();
                exec::run_interactive("defaults", &args, cancel)
            }
            Os::Windows => {
                let script = self.registry_script();
                exec::run_interactive(
                    "powershell",
                    &["-NoProfile", "-Command", &script],
                    cancel,
                )
            }
            Os::Linux => anyhow::bail!("system settings are not supported on {}", self.os),
        }
    }
}
