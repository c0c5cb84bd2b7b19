// ABOUTME: Append-only ledger of identifiers already converted into a library instance.
// ABOUTME: One identifier per line on disk, mirrored by an in-memory set rebuilt on load.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading or appending to the ledger file.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("could not read processed IDs log {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not append to processed IDs log {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The processed-identifier set of one library instance.
///
/// Appending is the only mutation. A record is written and fsynced before it
/// is added to the in-memory set; if the write fails the identifier is still
/// added in memory so the running process does not convert it again.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    ids: HashSet<String>,
}

impl Ledger {
    /// Read the full ledger file. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let mut ids = HashSet::new();

        if path.exists() {
            let read_err = |source| LedgerError::Read {
                path: path.to_path_buf(),
                source,
            };
            let file = File::open(path).map_err(read_err)?;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(read_err)?;
                let id = line.trim();
                if !id.is_empty() {
                    ids.insert(id.to_string());
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            ids,
        })
    }

    /// Like [`Ledger::load`], but an unreadable file yields an empty ledger
    /// together with the error so the caller can surface a warning.
    pub fn load_or_empty(path: &Path) -> (Self, Option<LedgerError>) {
        match Self::load(path) {
            Ok(ledger) => (ledger, None),
            Err(e) => {
                tracing::error!("{}", e);
                let ledger = Self {
                    path: path.to_path_buf(),
                    ids: HashSet::new(),
                };
                (ledger, Some(e))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Durably append `id`. Recording an identifier that is already present
    /// is a no-op so the file never holds duplicates written by this process.
    pub fn record(&mut self, id: &str) -> Result<(), LedgerError> {
        if self.ids.contains(id) {
            return Ok(());
        }

        let result = self.append_line(id);
        self.ids.insert(id.to_string());
        result.map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn append_line(&self, id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", id)?;
        file.sync_all()
    }
}
