// ABOUTME: Hot-reloadable runtime settings read from a JSON file on every request.
// ABOUTME: Controls the retention sweeper; a missing or broken file falls back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use partshelf_store::RetentionPolicy;

/// Default retention window in days.
pub const DEFAULT_CLEANUP_DAYS: u64 = 7;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration file not found at: {0}")]
    Missing(PathBuf),

    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Settings an operator can change while the server runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub disable_auto_cleanup: bool,
    pub cleanup_days: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            disable_auto_cleanup: false,
            cleanup_days: DEFAULT_CLEANUP_DAYS,
        }
    }
}

impl RuntimeSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SettingsError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file, logging and falling back to defaults on any problem.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => {
                tracing::debug!(
                    "Automatic cleanup is {} based on config.",
                    if settings.disable_auto_cleanup { "disabled" } else { "enabled" }
                );
                settings
            }
            Err(SettingsError::Missing(path)) => {
                tracing::debug!(
                    "Configuration file not found at: {}. Using default cleanup settings.",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                tracing::error!("Error reading add-on configuration: {}", e);
                tracing::warn!("Using default cleanup settings.");
                Self::default()
            }
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(!self.disable_auto_cleanup, self.cleanup_days)
    }
}
