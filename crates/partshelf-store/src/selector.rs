// ABOUTME: Discovers library instances under the library root and picks the active one.
// ABOUTME: The active instance is the most recently modified folder sharing the configured prefix.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that make the library tree unusable for the current request.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("cannot create or access library root {path}: {source}")]
    Root {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create library instance {path}: {source}")]
    Instance {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid library instance name: {0}")]
    InvalidName(String),
}

/// One self-contained library folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryInstance {
    pub name: String,
    pub root_path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl LibraryInstance {
    fn from_dir(path: &Path) -> std::io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            root_path: path.to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
        })
    }
}

/// All instances under `root` whose name starts with `prefix`, newest first.
/// Equal modification times are ordered by descending name.
pub fn list_instances(root: &Path, prefix: &str) -> std::io::Result<Vec<LibraryInstance>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut instances = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if !path.is_dir() || !name.to_string_lossy().starts_with(prefix) {
            continue;
        }
        match LibraryInstance::from_dir(&path) {
            Ok(instance) => instances.push(instance),
            Err(e) => {
                tracing::warn!("Could not get mtime for {}, skipping: {}", path.display(), e);
            }
        }
    }

    instances.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });
    Ok(instances)
}

/// The most recently modified instance, or `None` when there is none yet.
/// A missing root is created.
pub fn select_active(root: &Path, prefix: &str) -> std::io::Result<Option<LibraryInstance>> {
    if !root.exists() {
        fs::create_dir_all(root)?;
        tracing::info!("Created library root directory: {}", root.display());
        return Ok(None);
    }
    let instances = list_instances(root, prefix)?;
    tracing::debug!("found {} library instances", instances.len());
    Ok(instances.into_iter().next())
}

/// The active instance, falling back to `default_name` (created on demand).
pub fn resolve_active(
    root: &Path,
    prefix: &str,
    default_name: &str,
) -> Result<LibraryInstance, SelectorError> {
    let root_err = |source| SelectorError::Root {
        path: root.to_path_buf(),
        source,
    };
    fs::create_dir_all(root).map_err(root_err)?;

    if let Some(instance) = select_active(root, prefix).map_err(root_err)? {
        return Ok(instance);
    }

    let path = root.join(default_name);
    let instance_err = |source| SelectorError::Instance {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(&path).map_err(instance_err)?;
    LibraryInstance::from_dir(&path).map_err(instance_err)
}

/// Create a new instance named `<prefix>_<tag>`. Being the newest folder, it
/// becomes the active instance.
pub fn create_instance(root: &Path, prefix: &str, tag: &str) -> Result<LibraryInstance, SelectorError> {
    if tag.is_empty() || tag.contains(['/', '\\']) || tag.contains("..") {
        return Err(SelectorError::InvalidName(tag.to_string()));
    }
    fs::create_dir_all(root).map_err(|source| SelectorError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let path = root.join(format!("{prefix}_{tag}"));
    let instance_err = |source| SelectorError::Instance {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(&path).map_err(instance_err)?;
    // Touch so an existing folder of the same name also becomes the newest
    filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(SystemTime::now()))
        .map_err(instance_err)?;
    tracing::info!("Created library instance {}", path.display());
    LibraryInstance::from_dir(&path).map_err(instance_err)
}
