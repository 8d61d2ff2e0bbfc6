//! Prepares output directories, optionally clearing previous contents.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Creates `parent/name` (the whole chain) and returns its path.
///
/// With `clear` set, a pre-existing file or symlink is removed and a
/// pre-existing directory is removed with its entire tree before creation.
/// A path of any other kind is a fatal error rather than something to
/// silently work around.
pub fn create_dir(parent: &Path, name: &str, clear: bool) -> Result<PathBuf> {
    let path = parent.join(name);

    if clear {
        let meta = fs::symlink_metadata(&path);
        if let Ok(meta) = meta {
            let file_type = meta.file_type();
            if file_type.is_symlink() || file_type.is_file() {
                fs::remove_file(&path)
                    .with_context(|| format!("removing `{}`", path.display()))?;
            } else if file_type.is_dir() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("clearing `{}`", path.display()))?;
            } else {
                bail!(
                    "`{}` already exists and is neither a regular file, symlink nor directory",
                    path.display()
                );
            }
        }
    }

    fs::create_dir_all(&path).with_context(|| format!("creating `{}`", path.display()))?;

    Ok(path)
}

// -- Tests -------------------------------------------------------------------
