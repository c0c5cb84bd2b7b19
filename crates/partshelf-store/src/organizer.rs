// ABOUTME: Moves converter output found under a temp prefix into a library instance's layout.
// ABOUTME: Each step reports independently and every source artifact is removed on all exit paths.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use filetime::FileTime;
use regex::Regex;

use crate::layout::LibraryDirs;

pub const SYMBOL_SUFFIX: &str = ".kicad_sym";
pub const FOOTPRINT_DIR_SUFFIX: &str = ".pretty";
pub const MODEL_DIR_SUFFIX: &str = ".3dshapes";
pub const FOOTPRINT_EXTENSION: &str = "kicad_mod";
pub const MODEL_EXTENSIONS: &[&str] = &["step", "wrl"];

static HAZARDOUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?* ]"#).expect("sanitize pattern is valid"));

/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    HAZARDOUS_RE.replace_all(name, "_").into_owned()
}

/// Where the converter is expected to have written its artifacts for a given
/// output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub prefix: PathBuf,
    pub symbol: PathBuf,
    pub footprint_dir: PathBuf,
    pub model_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn from_prefix(prefix: &Path) -> Self {
        let with_suffix = |suffix: &str| {
            let mut os = prefix.as_os_str().to_owned();
            os.push(suffix);
            PathBuf::from(os)
        };
        Self {
            prefix: prefix.to_path_buf(),
            symbol: with_suffix(SYMBOL_SUFFIX),
            footprint_dir: with_suffix(FOOTPRINT_DIR_SUFFIX),
            model_dir: with_suffix(MODEL_DIR_SUFFIX),
        }
    }

    /// Every artifact path that currently exists, including the bare prefix
    /// directory the converter was pointed at.
    pub fn existing(&self) -> Vec<PathBuf> {
        [&self.symbol, &self.footprint_dir, &self.model_dir, &self.prefix]
            .into_iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }
}

/// Result of one copy step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The source category was not produced. Not an error.
    Absent,
    /// The step was not attempted because an earlier step failed.
    Skipped,
    Done { copied: usize },
    Failed { copied: usize, errors: Vec<String> },
}

impl StepStatus {
    pub fn copied(&self) -> usize {
        match self {
            StepStatus::Done { copied } | StepStatus::Failed { copied, .. } => *copied,
            StepStatus::Absent | StepStatus::Skipped => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }

    fn from_counts(copied: usize, errors: Vec<String>) -> Self {
        if errors.is_empty() {
            StepStatus::Done { copied }
        } else {
            StepStatus::Failed { copied, errors }
        }
    }
}

/// Result of removing source artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub errors: Vec<String>,
}

/// Per-step results of one organize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizeReport {
    pub ensure_dirs: Result<(), String>,
    pub symbol: StepStatus,
    pub footprints: StepStatus,
    pub models: StepStatus,
    pub cleanup: CleanupReport,
}

impl OrganizeReport {
    pub fn copied(&self) -> usize {
        self.symbol.copied() + self.footprints.copied() + self.models.copied()
    }

    /// True when no directory, copy, or cleanup error occurred. Missing
    /// artifact categories do not count as errors.
    pub fn is_success(&self) -> bool {
        self.ensure_dirs.is_ok()
            && !self.symbol.is_failure()
            && !self.footprints.is_failure()
            && !self.models.is_failure()
            && self.cleanup.errors.is_empty()
    }
}

/// Copy the converter output found under `prefix` into `library_dir`, then
/// delete every source artifact that existed, whether or not its copy worked.
pub fn organize(prefix: &Path, library_dir: &Path) -> OrganizeReport {
    let sources = ArtifactPaths::from_prefix(prefix);
    let dirs = LibraryDirs::for_instance(library_dir);
    let label = prefix
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    tracing::info!("--- Starting file organization for {} ---", label);
    tracing::debug!("prefix {} -> library {}", prefix.display(), library_dir.display());

    // Collected before copying so cleanup covers exactly what the converter produced
    let to_cleanup = sources.existing();

    let ensure_dirs = ensure_destination(&dirs);
    let (symbol, footprints, models) = if ensure_dirs.is_ok() {
        (
            copy_symbol(&sources, &dirs),
            copy_footprints(&sources, &dirs),
            copy_models(&sources, &dirs),
        )
    } else {
        (StepStatus::Skipped, StepStatus::Skipped, StepStatus::Skipped)
    };

    tracing::info!("--- Cleaning up temporary items for {} ---", label);
    let cleanup = remove_sources(&to_cleanup);

    let report = OrganizeReport {
        ensure_dirs,
        symbol,
        footprints,
        models,
        cleanup,
    };

    if !report.is_success() {
        tracing::error!(
            "--- Organization finished: errors were encountered for {}. Copied {} files.",
            label,
            report.copied()
        );
    } else if report.copied() == 0 {
        tracing::warn!(
            "--- Organization finished: no files were copied for {} (sources might be missing or empty).",
            label
        );
    } else {
        tracing::info!(
            "--- Organization finished successfully for {}. Copied {} files.",
            label,
            report.copied()
        );
    }

    report
}

/// Create the symbols/footprints/3dshapes subdirectories.
pub fn ensure_destination(dirs: &LibraryDirs) -> Result<(), String> {
    dirs.ensure().map_err(|e| {
        tracing::error!("failed to create library subdirectories: {}", e);
        format!("could not create library subdirectories: {e}")
    })
}

/// Copy the symbol library file, if the converter produced one.
pub fn copy_symbol(sources: &ArtifactPaths, dirs: &LibraryDirs) -> StepStatus {
    if !sources.symbol.is_file() {
        tracing::warn!("Symbol file not found: {}", sources.symbol.display());
        return StepStatus::Absent;
    }

    let mut errors = Vec::new();
    let copied = copy_one(&sources.symbol, &dirs.symbols, true, "symbol", &mut errors);
    StepStatus::from_counts(copied as usize, errors)
}

/// Copy every `.kicad_mod` file from the footprint directory.
pub fn copy_footprints(sources: &ArtifactPaths, dirs: &LibraryDirs) -> StepStatus {
    copy_directory(
        &sources.footprint_dir,
        &dirs.footprints,
        &[FOOTPRINT_EXTENSION],
        true,
        "footprint",
    )
}

/// Copy every `.step`/`.wrl` file from the model directory. Model names are
/// chosen by the converter and are copied unchanged.
pub fn copy_models(sources: &ArtifactPaths, dirs: &LibraryDirs) -> StepStatus {
    copy_directory(&sources.model_dir, &dirs.models, MODEL_EXTENSIONS, false, "3D model")
}

fn copy_directory(
    source_dir: &Path,
    dest_dir: &Path,
    extensions: &[&str],
    sanitize: bool,
    kind: &str,
) -> StepStatus {
    if !source_dir.is_dir() {
        tracing::warn!("{} directory not found: {}", kind, source_dir.display());
        return StepStatus::Absent;
    }

    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("FAILED to list {} directory {}: {}", kind, source_dir.display(), e);
            return StepStatus::Failed {
                copied: 0,
                errors: vec![format!("could not list {}: {e}", source_dir.display())],
            };
        }
    };

    let mut copied = 0;
    let mut errors = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                errors.push(format!("could not read entry in {}: {e}", source_dir.display()));
                continue;
            }
        };
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if matches && path.is_file() && copy_one(&path, dest_dir, sanitize, kind, &mut errors) {
            copied += 1;
        }
    }

    StepStatus::from_counts(copied, errors)
}

fn copy_one(
    source: &Path,
    dest_dir: &Path,
    sanitize: bool,
    kind: &str,
    errors: &mut Vec<String>,
) -> bool {
    let Some(file_name) = source.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        errors.push(format!("{} has no file name", source.display()));
        return false;
    };
    let dest_name = if sanitize {
        sanitize_file_name(&file_name)
    } else {
        file_name
    };
    let dest = dest_dir.join(&dest_name);

    if dest.exists() {
        tracing::warn!("    Overwriting existing {}: {}", kind, dest.display());
    }

    match copy_preserving_mtime(source, &dest) {
        Ok(()) => {
            tracing::info!("    Successfully copied {}: {}", kind, dest_name);
            true
        }
        Err(e) => {
            tracing::error!(
                "    FAILED to copy {} {} to {}: {}",
                kind,
                source.display(),
                dest.display(),
                e
            );
            errors.push(format!("copy {} -> {}: {e}", source.display(), dest.display()));
            false
        }
    }
}

fn copy_preserving_mtime(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;
    let meta = fs::metadata(source)?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
}

/// Delete each path (file or directory). A path that has already vanished
/// is only a warning.
pub fn remove_sources(paths: &[PathBuf]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for path in paths {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => {
                tracing::debug!("    Removed temp item: {}", path.display());
                report.removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("    Item to cleanup not found: {}", path.display());
            }
            Err(e) => {
                tracing::error!("    FAILED to cleanup temporary item {}: {}", path.display(), e);
                report.errors.push(format!("cleanup {}: {e}", path.display()));
            }
        }
    }
    report
}
