//! Error types for selector state resolution.

use thiserror::Error;

use crate::selector::SelectorSetting;

/// Result type alias for selector operations.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Errors that can occur while resolving or persisting selector state.
#[derive(Error, Debug)]
pub enum SelectorError {
    /// A selector was asked to become default-hidden while not inactive.
    #[error("selector {id} cannot become default-hidden from '{current}'")]
    InvalidStateTransition {
        id: String,
        current: SelectorSetting,
    },

    /// A scope refers to a workspace folder that is not part of the workspace.
    #[error("unresolvable configuration scope: {0}")]
    UnresolvableScope(String),

    /// A configuration or persisted-store write did not go through.
    #[error("transient io failure: {0}")]
    TransientIoFailure(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
