//! Command: `platform`.
use anyhow::Result;

use crate::platform::Platform;
use crate::tags::TagStore;

/// Print the detected OS, architecture and machine tags.
///
/// # Errors
///
/// Returns an error if the tag file exists but cannot be read.
pub fn run() -> Result<()> {
    let platform = Platform::detect();
    let store = TagStore::default_location();
    let machine = store.load()?;
    println!("os:    {}", platform.os);
    println!("arch:  {}", platform.arch);
    if machine.tags.is_empty() {
        println!("tags:  (none, {} not initialised)", store.path().display());
    } else {
        println!("tags:  {}", machine.tags.join(", "));
    }
    Ok(())
}
