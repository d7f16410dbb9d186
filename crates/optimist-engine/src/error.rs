use std::io;

use optimist_types::MutationError;
use thiserror::Error;

/// A snapshot transition could not address the requested slot.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// No entry exists at the key.
    #[error("no entry at key {0}")]
    KeyNotFound(String),

    /// A sequence insert past the end.
    #[error("index {index} out of bounds for sequence of length {len}")]
    OutOfBounds { index: usize, len: usize },
}

impl From<TransitionError> for MutationError {
    fn from(_: TransitionError) -> Self {
        MutationError::IndexNotFound
    }
}

/// Errors produced while loading a [`crate::ContainerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid container config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Convenience alias for transition results.
pub type TransitionResult<T> = Result<T, TransitionError>;
