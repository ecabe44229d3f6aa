//! ANSI styling for console messages.
//!
//! The file layer strips these codes again, so styled text is safe to log.

/// Visual weight of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Bold green.
    Pass,
    /// Bold red.
    Fail,
    /// Dim.
    Muted,
}

impl Tone {
    const fn sgr(self) -> &'static str {
        match self {
            Self::Pass => "\x1b[1;32m",
            Self::Fail => "\x1b[1;31m",
            Self::Muted => "\x1b[2m",
        }
    }
}

/// Wrap `text` in the escape codes for `tone`, resetting afterwards.
#[must_use]
pub fn paint(tone: Tone, text: &str) -> String {
    format!("{}{text}\x1b[0m", tone.sgr())
}
