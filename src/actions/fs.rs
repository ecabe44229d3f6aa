//! File-system helpers shared by the file, directory and binary actions,
//! and by the snapshot manager.
use anyhow::{Context as _, Result, bail};
use std::path::{Path, PathBuf};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Whether anything (including a dangling symlink) exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Whether `path` is a symlink (dangling or not).
#[must_use]
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_symlink())
}

/// Remove whatever lives at `path`: a file, a symlink, or a whole directory tree.
///
/// Symlinks are removed without touching what they point to. Does nothing
/// if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("remove directory: {}", path.display()))
    } else {
        remove_link_or_file(path)
    }
}

fn remove_link_or_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Windows directory symlinks must be removed with remove_dir.
        #[cfg(windows)]
        Err(_) if path.is_dir() => std::fs::remove_dir(path)
            .with_context(|| format!("remove existing: {}", path.display())),
        Err(e) => Err(e).with_context(|| format!("remove existing: {}", path.display())),
    }
}

/// Copy a regular file, replacing a symlink at `dst` instead of writing
/// through it.
///
/// # Errors
///
/// Returns an error if the parent cannot be created or the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    ensure_parent_dir(dst)?;
    if is_symlink(dst) {
        remove_link_or_file(dst)?;
    }
    std::fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Recursively copy a directory tree into `dst`, creating it if needed.
///
/// Files already in `dst` that are absent from `src` are left alone.
/// Symlinks inside `src` are followed and their content is copied.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            copy_file(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Copy a directory tree exactly: symlinks inside `src` are recreated as
/// links to the same target, never followed.
///
/// # Errors
///
/// Returns an error if an entry cannot be read, copied or relinked.
pub fn copy_tree_preserving_links(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("reading type of {}", src_path.display()))?;
        if file_type.is_symlink() {
            let target = std::fs::read_link(&src_path)
                .with_context(|| format!("reading link {}", src_path.display()))?;
            create_symlink(&target, &dst_path)?;
        } else if file_type.is_dir() {
            copy_tree_preserving_links(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Byte-for-byte comparison of two files.
///
/// # Errors
///
/// Returns an error if either file cannot be read.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let left = std::fs::read(a).with_context(|| format!("reading {}", a.display()))?;
    let right = std::fs::read(b).with_context(|| format!("reading {}", b.display()))?;
    Ok(left == right)
}

/// Absolute form of `path`, without resolving symlinks.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolving {}", path.display()))
}

/// Compare two paths, ignoring the Windows verbatim prefix (`\\?\`).
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Whether `link` is a symlink pointing at exactly `source` (made absolute).
#[must_use]
pub fn links_to(link: &Path, source: &Path) -> bool {
    let Ok(current) = std::fs::read_link(link) else {
        return false;
    };
    absolute(source).is_ok_and(|abs| paths_equal(&current, &abs))
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(windows)]
    {
        let result = if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        result.with_context(|| {
            format!(
                "creating symlink {} -> {} (requires Developer Mode or admin)",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(not(any(unix, windows)))]
    {
        bail!("symlinks are not supported on this platform: {}", link.display())
    }
}

/// Set the Unix permission bits of `path` to `mode` if they differ.
///
/// Does nothing if `path` does not exist or on non-Unix platforms.
///
/// # Errors
///
/// Returns an error if the mode cannot be read or changed.
pub fn enforce_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let Ok(meta) = std::fs::metadata(path) else {
            return Ok(());
        };
        if meta.permissions().mode() & 0o7777 != mode {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .with_context(|| format!("chmod {mode:04o} {}", path.display()))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

/// Apply [`enforce_mode`] to every regular file below `dir`.
///
/// # Errors
///
/// Returns an error if the tree cannot be read or a mode cannot be changed.
pub fn enforce_mode_in_tree(dir: &Path, mode: u32) -> Result<()> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
    {
        let path = entry
            .with_context(|| format!("reading entry in {}", dir.display()))?
            .path();
        if path.is_dir() {
            enforce_mode_in_tree(&path, mode)?;
        } else {
            enforce_mode(&path, mode)?;
        }
    }
    Ok(())
}

/// Current permission bits of `path`, if it exists (Unix only).
#[must_use]
pub fn current_mode(path: &Path) -> Option<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .ok()
            .map(|m| m.permissions().mode() & 0o7777)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

/// Lowercase hex SHA-256 of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let bytes = std::fs::read(path)
        .with_context(|| format!("reading {} for checksum", path.display()))?;
    let digest = Sha256::digest(&bytes);
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible; unwrap_or(()) makes that explicit.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    Ok(hex)
}

/// Refuse to replace a real directory at `path`.
///
/// # Errors
///
/// Returns an error if `path` is a directory that is not a symlink.
pub fn refuse_real_dir(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok_and(|m| m.is_dir()) {
        bail!("destination exists and is not a symlink: {}", path.display());
    }
    Ok(())
}
