//! Path canonicalization and access checks.
//!
//! Fingerprints hash paths, so every path entering the system goes through
//! [`resolve`] first: absolute, symlinks resolved, `.`/`..` folded.

use crate::utils::errors::{Result, TinyBackupError};
use nix::unistd::{access, AccessFlags};
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against the current working directory.
pub fn resolve(path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(resolve_from(&cwd, path))
}

/// Resolve `path` against `base`.
///
/// Existing paths are canonicalized. A missing leaf under an existing parent
/// keeps the canonical parent, so a deleted source file still maps to the
/// same identity it was installed with. Anything else is folded lexically.
pub fn resolve_from(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    if let Ok(real) = std::fs::canonicalize(&joined) {
        return real;
    }

    let folded = fold_lexically(&joined);
    match (folded.parent(), folded.file_name()) {
        (Some(parent), Some(name)) => match std::fs::canonicalize(parent) {
            Ok(real_parent) => real_parent.join(name),
            Err(_) => folded,
        },
        _ => folded,
    }
}

fn fold_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Fail unless `path` is a regular file this process can read.
pub fn ensure_readable_file(path: &Path) -> Result<()> {
    if path.is_file() && access(path, AccessFlags::R_OK).is_ok() {
        Ok(())
    } else {
        Err(TinyBackupError::InvalidInput(format!(
            "'{}' is not a readable file",
            path.display()
        )))
    }
}

/// Fail unless `path` is a directory this process can write into.
pub fn ensure_writable_dir(path: &Path) -> Result<()> {
    if path.is_dir() && access(path, AccessFlags::W_OK | AccessFlags::X_OK).is_ok() {
        Ok(())
    } else {
        Err(TinyBackupError::InvalidInput(format!(
            "'{}' is not a writable directory",
            path.display()
        )))
    }
}
