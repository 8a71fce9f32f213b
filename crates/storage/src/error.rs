use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A required file or directory is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}:{line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },
}

impl StorageError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::Configuration(_))
    }
}

/// Wraps an `io::Error` with the path it happened on.
pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
