use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to back up {path}: {source}")]
    Backup { path: PathBuf, source: io::Error },

    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to lock {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: csv::Error },
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("failed to save device names: {0}")]
    Names(#[source] StoreError),

    #[error("failed to save device icons: {0}")]
    Icons(#[source] StoreError),
}
