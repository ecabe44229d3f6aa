//! Log file location, ANSI stripping and timestamps.
use std::fs;
use std::path::PathBuf;

/// Remove ANSI escape sequences so the log file stays plain text.
///
/// A CSI sequence (`ESC [`) runs up to its final byte in `@..=~`. A lone
/// `ESC` swallows the following character.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// `$XDG_CACHE_HOME/dotkit`, falling back to `~/.cache/dotkit`. Created on
/// demand.
fn log_dir() -> Option<PathBuf> {
    let cache = match std::env::var_os("XDG_CACHE_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => crate::platform::home_dir()?.join(".cache"),
    };
    let dir = cache.join("dotkit");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Path of the log file for `command`, e.g. `~/.cache/dotkit/apply.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    log_dir().map(|dir| dir.join(format!("{command}.log")))
}

/// Current UTC date and time, `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Current UTC time of day, `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_colour_codes() {
        assert_eq!(
            strip_ansi("\x1b[1;36m==>\x1b[0m \x1b[1mApplying shell\x1b[0m"),
            "==> Applying shell"
        );
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi(""), "");
    }

    #[test]
    fn strip_ansi_removes_cursor_sequences() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1Gdone"), "done");
        assert_eq!(strip_ansi("\x1bMup"), "up");
    }

    #[test]
    fn timestamps_have_fixed_width() {
        let time = format_utc_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);

        let datetime = format_utc_datetime();
        assert_eq!(datetime.len(), 19);
        assert!(datetime.contains(' '));
    }
}
