// ABOUTME: Read-only directory listing of a library instance for the browse views.
// ABOUTME: Entries are sorted directories first, then case-insensitively by name.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::paths::{PathError, resolve_within};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Outside(#[from] PathError),

    #[error("Directory not found: {0}")]
    NotFound(String),

    #[error("Permission denied accessing directory: {0}")]
    PermissionDenied(String),

    #[error("Could not list directory {path}: {source}")]
    Io { path: String, source: io::Error },
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Path relative to the browsed library root, for navigation links.
    pub rel_path: String,
    /// Path relative to the download root, for files only.
    pub download_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    /// Displayed path relative to the library root (`.` for the root itself).
    pub path: String,
    /// Relative path of the parent, when not at the root.
    pub parent: Option<String>,
    pub entries: Vec<DirEntry>,
}

/// List `relative` inside `library_root`. Download paths are expressed
/// relative to `download_root`, which must contain `library_root`.
pub fn list_directory(
    library_root: &Path,
    relative: &str,
    download_root: &Path,
) -> Result<DirectoryListing, ListingError> {
    let target = resolve_within(library_root, relative)?;
    let display = rel_string(&target, library_root);

    let read = fs::read_dir(&target).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ListingError::NotFound(display.clone()),
        io::ErrorKind::PermissionDenied => ListingError::PermissionDenied(display.clone()),
        _ => ListingError::Io {
            path: display.clone(),
            source: e,
        },
    })?;

    let mut entries = Vec::new();
    for entry in read.flatten() {
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::error!("OS error stating file {}: {}", path.display(), e);
                continue;
            }
        };
        let is_dir = meta.is_dir();
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            size: if is_dir { 0 } else { meta.len() },
            modified,
            rel_path: rel_string(&path, library_root),
            download_path: (!is_dir)
                .then(|| path.strip_prefix(download_root).ok())
                .flatten()
                .map(to_slash),
        });
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    let parent = (target != library_root)
        .then(|| target.parent().map(|p| rel_string(p, library_root)))
        .flatten();

    Ok(DirectoryListing {
        path: display,
        parent,
        entries,
    })
}

fn rel_string(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => to_slash(rel),
        Err(_) => ".".to_string(),
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn library() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let output = dir.path().to_path_buf();
        let lib = output.join("library").join("easyeda_lib_default");
        fs::create_dir_all(lib.join("symbols")).unwrap();
        fs::create_dir_all(lib.join("footprints")).unwrap();
        fs::write(lib.join("footprints").join("R0603.kicad_mod"), "abc").unwrap();
        fs::write(lib.join("Zeta.txt"), "z").unwrap();
        fs::write(lib.join("alpha.txt"), "a").unwrap();
        (dir, output, lib)
    }

    #[test]
    fn root_listing_puts_directories_first() {
        let (_dir, output, lib) = library();
        let listing = list_directory(&lib, ".", &output).unwrap();

        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["footprints", "symbols", "alpha.txt", "Zeta.txt"]);
        assert_eq!(listing.path, ".");
        assert!(listing.parent.is_none());
    }

    #[test]
    fn nested_listing_has_parent_and_download_paths() {
        let (_dir, output, lib) = library();
        let listing = list_directory(&lib, "footprints", &output).unwrap();

        assert_eq!(listing.path, "footprints");
        assert_eq!(listing.parent.as_deref(), Some("."));
        let entry = &listing.entries[0];
        assert_eq!(entry.size, 3);
        assert_eq!(entry.rel_path, "footprints/R0603.kicad_mod");
        assert_eq!(
            entry.download_path.as_deref(),
            Some("library/easyeda_lib_default/footprints/R0603.kicad_mod")
        );
    }

    #[test]
    fn missing_directory_is_not_found() {
        let (_dir, output, lib) = library();
        assert!(matches!(
            list_directory(&lib, "nope", &output),
            Err(ListingError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_is_rejected() {
        let (_dir, output, lib) = library();
        assert!(matches!(
            list_directory(&lib, "../..", &output),
            Err(ListingError::Outside(_))
        ));
    }
}
