use thiserror::Error;

use crate::rejection::{normalize_error, Rejection};

pub const INDEX_NOT_FOUND: &str = "indexNotFound";
pub const ACTION_RETURNED_NULL: &str = "actionReturnedNull";
pub const UNKNOWN_PRELOAD_OR_ACTION_REJECT: &str = "unknownPreloadOrActionReject";
pub const ERROR_CALLBACK_REJECTED: &str = "errorCallbackRejected";

/// Why a mutation call rejected.
///
/// The four fixed kinds display as their string constants so callers can
/// match on either the variant or the message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    /// The resolved key does not address an existing entry.
    #[error("indexNotFound")]
    IndexNotFound,

    /// An action resolved with no value where one was required.
    #[error("actionReturnedNull")]
    ActionReturnedNull,

    /// A preload or action failed without any message.
    #[error("unknownPreloadOrActionReject")]
    UnknownPreloadOrActionReject,

    /// The error handler itself failed. Supersedes the original failure.
    #[error("errorCallbackRejected")]
    ErrorCallbackRejected,

    /// A preload or action failed with this normalized message.
    #[error("{0}")]
    Rejected(String),
}

impl MutationError {
    /// Map a handler failure to the error a caller sees.
    pub fn from_rejection(rejection: &Rejection) -> Self {
        if rejection.is_opaque() {
            Self::UnknownPreloadOrActionReject
        } else {
            Self::Rejected(normalize_error(rejection))
        }
    }
}

/// Convenience alias for mutation results.
pub type MutationResult<T> = Result<T, MutationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_kinds_display_as_constants() {
        assert_eq!(MutationError::IndexNotFound.to_string(), INDEX_NOT_FOUND);
        assert_eq!(MutationError::ActionReturnedNull.to_string(), ACTION_RETURNED_NULL);
        assert_eq!(
            MutationError::UnknownPreloadOrActionReject.to_string(),
            UNKNOWN_PRELOAD_OR_ACTION_REJECT
        );
        assert_eq!(
            MutationError::ErrorCallbackRejected.to_string(),
            ERROR_CALLBACK_REJECTED
        );
    }

    #[test]
    fn rejected_displays_underlying_message() {
        let err = MutationError::from_rejection(&"X".into());
        assert_eq!(err, MutationError::Rejected("X".into()));
        assert_eq!(err.to_string(), "X");
    }

    #[test]
    fn opaque_rejection_is_unknown() {
        let err = MutationError::from_rejection(&Rejection::Opaque);
        assert_eq!(err, MutationError::UnknownPreloadOrActionReject);
    }
}
