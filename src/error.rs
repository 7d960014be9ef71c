use std::path::PathBuf;
use thiserror::Error;

/// Failure modes a tag strategy can report for a single file.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("not an audio file: {0}")]
    NotAudio(PathBuf),

    #[error("unreadable file {0}: {1}")]
    Unreadable(PathBuf, String),

    #[error("corrupt tag block in {0}: {1}")]
    Corrupt(PathBuf, String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("schema node {0} does not exist")]
    UnknownNode(i64),
}

impl StoreError {
    /// True when the store rejected a write because a UNIQUE, NOT NULL or
    /// FOREIGN KEY constraint would have been broken.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Why one file of a scan did not make it into the library.
#[derive(Debug, Error)]
pub enum ScanFileError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ScannerError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}
