//! Command: print version information.

/// Version string: the build-time `DOTKIT_VERSION` if set, else the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("DOTKIT_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the dotkit version to stdout.
pub fn run() {
    println!("dotkit {}", version());
}
