/// Shared data structures for the upload lifecycle
///
/// These structs represent the data model that flows between
/// the database layer and the web layer.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// One uploaded or derived artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Unique database ID
    pub id: i64,
    /// Sanitized filename, shared by an upload and its colorized output
    pub filename: String,
    /// When the artifact was written (UTC)
    pub upload_time: DateTime<Utc>,
    /// false = raw upload, true = colorized derivative
    pub is_output: bool,
}

/// The directories backing the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDirs {
    pub uploads: PathBuf,
    pub outputs: PathBuf,
}

impl ArtifactDirs {
    pub fn new(uploads: impl Into<PathBuf>, outputs: impl Into<PathBuf>) -> Self {
        Self {
            uploads: uploads.into(),
            outputs: outputs.into(),
        }
    }

    /// Directory holding artifacts of the given kind
    pub fn dir_for(&self, is_output: bool) -> &Path {
        if is_output {
            &self.outputs
        } else {
            &self.uploads
        }
    }

    /// Full path of an artifact
    pub fn path_for(&self, filename: &str, is_output: bool) -> PathBuf {
        self.dir_for(is_output).join(filename)
    }

    /// Create both directories if they don't exist
    pub fn create_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.outputs)
    }
}

/// Outcome of one expiry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub records_removed: usize,
    pub files_removed: usize,
}
