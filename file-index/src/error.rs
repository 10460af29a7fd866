//! Error types for the file index.

use thiserror::Error;

/// Result type alias for file index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur while scanning, watching or indexing files.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A selector glob could not be compiled.
    #[error("invalid glob pattern: {0}")]
    InvalidPattern(String),

    /// The cache or registry was disposed while the operation was pending.
    #[error("disposed: {0}")]
    Disposed(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking scan task panicked or was cancelled.
    #[error("scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Configuration access failed.
    #[error(transparent)]
    Selectors(#[from] tidy_selectors::SelectorError),
}
