// ABOUTME: Resolves user-supplied relative paths while keeping them inside a root directory.
// ABOUTME: Used by the browse and download endpoints to reject directory traversal.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path escapes the permitted root: {0}")]
    OutsideRoot(String),
}

/// Join `relative` onto `root`, normalizing `.` and `..` lexically, and fail
/// if the result would leave `root`. When the target exists, symlinks are
/// resolved and the canonical path is checked as well.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let outside = || PathError::OutsideRoot(relative.to_string());
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(outside());
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }

    if let (Ok(canonical_root), Ok(canonical)) = (root.canonicalize(), resolved.canonicalize())
        && !canonical.starts_with(&canonical_root)
    {
        return Err(outside());
    }

    Ok(resolved)
}
