//! JSON file holding every completed session.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::progress::entry::{ProgressEntry, ProgressLog};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("progress file I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("progress file {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-modify-write access to the progress file.
///
/// Every append re-reads the file, so entries written by another instance
/// in the meantime are kept.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the log.  A missing file is an empty log.
    pub fn load(&self) -> Result<ProgressLog, StoreError> {
        if !self.path.exists() {
            return Ok(ProgressLog::default());
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| self.io(source))?;
        if text.trim().is_empty() {
            return Ok(ProgressLog::default());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Append one session and rewrite the file.
    pub fn append(&self, entry: ProgressEntry) -> Result<(), StoreError> {
        let mut log = self.load()?;
        log.sessions.push(entry);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }
        let json = serde_json::to_string_pretty(&log).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        std::fs::write(&self.path, json).map_err(|source| self.io(source))?;

        log::info!(
            "progress: saved session {} to {}",
            log.sessions.len(),
            self.path.display()
        );
        Ok(())
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
