use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a migration or rollback. Validation problems are not
/// errors; they are returned as data in `MigrationResult`.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("persistence error during {step}: {source}")]
    Persistence {
        step: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("backup io error at {}: {source}", .path.to_string_lossy())]
    BackupIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup file {} is not valid JSON: {source}", .path.to_string_lossy())]
    BackupFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported backup format {format:?} in {}", .path.to_string_lossy())]
    UnsupportedBackup { path: PathBuf, format: String },

    #[error("backup {id} checksum mismatch (expected {expected}, got {actual})")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("io error at {}: {source}", .path.to_string_lossy())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot open migration log {}: {source}", .path.to_string_lossy())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrationError {
    pub fn persistence(step: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Persistence {
            step: step.into(),
            source,
        }
    }
}
