//! Error types for the explorer.

use thiserror::Error;

/// Result type alias for explorer operations.
pub type Result<T> = std::result::Result<T, ExplorerError>;

/// Errors that can occur while reconciling selectors with the file index.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// Selector state error.
    #[error("selector error: {0}")]
    Selectors(#[from] tidy_selectors::SelectorError),

    /// File index error.
    #[error("file index error: {0}")]
    Index(#[from] tidy_file_index::IndexError),

    /// The explorer was disposed.
    #[error("explorer disposed")]
    Disposed,
}
