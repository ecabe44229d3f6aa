//! Command: `tag list` / `tag add`.
use anyhow::Result;

use crate::cli::TagCommand;
use crate::tags::TagStore;

/// Run a tag subcommand against the default tag file.
///
/// # Errors
///
/// Returns an error if the tag file cannot be read or written.
pub fn run(command: &TagCommand) -> Result<()> {
    let store = TagStore::default_location();
    for line in execute(&store, command)? {
        println!("{line}");
    }
    Ok(())
}

/// Perform `command` on `store` and return the lines to print.
fn execute(store: &TagStore, command: &TagCommand) -> Result<Vec<String>> {
    store.ensure_initialised()?;
    match command {
        TagCommand::List => Ok(store.load()?.tags),
        TagCommand::Add { tag } => {
            let tag = tag.trim();
            if tag.is_empty() {
                anyhow::bail!("tag must not be empty");
            }
            let line = if store.add(tag)? {
                format!("added tag {tag:?}")
            } else {
                format!("tag {tag:?} already present")
            };
            Ok(vec![line])
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tags;

    fn store() -> (tempfile::TempDir, TagStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TagStore::new(dir.path().join("dotkit").join("machine.toml"));
        (dir, store)
    }

    #[test]
    fn list_seeds_detected_tags() {
        let (_dir, store) = store();
        let lines = execute(&store, &TagCommand::List).unwrap();
        assert_eq!(lines, tags::auto_detect());
    }

    #[test]
    fn add_is_deduplicated() {
        let (_dir, store) = store();
        let add = TagCommand::Add {
            tag: "work".to_string(),
        };
        assert_eq!(execute(&store, &add).unwrap(), ["added tag \"work\""]);
        assert_eq!(
            execute(&store, &add).unwrap(),
            ["tag \"work\" already present"]
        );
        assert!(store.load().unwrap().tags.contains(&"work".to_string()));
    }

    #[test]
    fn blank_tag_is_rejected() {
        let (_dir, store) = store();
        let add = TagCommand::Add {
            tag: "  ".to_string(),
        };
        assert!(execute(&store, &add).is_err());
    }
}
