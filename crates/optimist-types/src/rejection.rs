//! Handler failures and their normalization into display strings.

use std::fmt;

/// Message stored when a handler fails without anything printable.
pub const REJECTED_WITHOUT_MESSAGE: &str = "Preload or action promise rejected without message";

/// The failure value of a preload, action, or error handler.
///
/// Handlers may fail with a plain message, any error type, or nothing at
/// all. [`normalize_error`] turns each of these into the string that ends
/// up in a snapshot's `error` field.
#[derive(Debug)]
pub enum Rejection {
    /// A bare message, used verbatim.
    Message(String),
    /// An error-like value; its display message is used.
    Error(anyhow::Error),
    /// A failure carrying no message.
    Opaque,
}

impl Rejection {
    /// Wrap any standard error.
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Error(anyhow::Error::new(error))
    }

    /// Returns `true` when no message can be recovered from this failure.
    pub fn is_opaque(&self) -> bool {
        match self {
            Self::Message(_) => false,
            Self::Error(e) => e.to_string().is_empty(),
            Self::Opaque => true,
        }
    }
}

impl From<&str> for Rejection {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for Rejection {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<anyhow::Error> for Rejection {
    fn from(error: anyhow::Error) -> Self {
        Self::Error(error)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&normalize_error(self))
    }
}

/// Convert a handler failure into a display string.
///
/// Messages pass through untouched, error values yield their message, and
/// anything without a message collapses to [`REJECTED_WITHOUT_MESSAGE`].
pub fn normalize_error(rejection: &Rejection) -> String {
    match rejection {
        Rejection::Message(message) => message.clone(),
        Rejection::Error(error) => {
            let message = error.to_string();
            if message.is_empty() {
                REJECTED_WITHOUT_MESSAGE.to_string()
            } else {
                message
            }
        }
        Rejection::Opaque => REJECTED_WITHOUT_MESSAGE.to_string(),
    }
}
