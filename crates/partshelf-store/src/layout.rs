// ABOUTME: Fixed directory and file names of a library instance.
// ABOUTME: Every instance holds symbols/, footprints/, 3dshapes/ and a hidden ledger file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hidden per-instance file listing processed identifiers.
pub const LEDGER_FILE_NAME: &str = ".processed_lcsc_ids.log";

pub const SYMBOLS_DIR: &str = "symbols";
pub const FOOTPRINTS_DIR: &str = "footprints";
pub const MODELS_DIR: &str = "3dshapes";

/// Destination subdirectories of one library instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDirs {
    pub symbols: PathBuf,
    pub footprints: PathBuf,
    pub models: PathBuf,
}

impl LibraryDirs {
    pub fn for_instance(library_dir: &Path) -> Self {
        Self {
            symbols: library_dir.join(SYMBOLS_DIR),
            footprints: library_dir.join(FOOTPRINTS_DIR),
            models: library_dir.join(MODELS_DIR),
        }
    }

    /// Create all three subdirectories if missing.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.symbols)?;
        fs::create_dir_all(&self.footprints)?;
        fs::create_dir_all(&self.models)?;
        Ok(())
    }
}

pub fn ledger_path(library_dir: &Path) -> PathBuf {
    library_dir.join(LEDGER_FILE_NAME)
}
