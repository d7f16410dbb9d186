use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of the most recent mutation against a container or entry.
///
/// No state is terminal: any status moves back to `Loading` when a new
/// operation starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing has run yet.
    #[default]
    Unsent,
    /// A preload or action is in flight.
    Loading,
    /// The last action resolved.
    Success,
    /// The last operation failed.
    Error,
}

impl Status {
    /// Returns `true` for `Success` and `Error`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Returns `true` while an operation is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsent => "unsent",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unsent() {
        assert_eq!(Status::default(), Status::Unsent);
        assert!(!Status::Unsent.is_settled());
    }

    #[test]
    fn settled_states() {
        assert!(Status::Success.is_settled());
        assert!(Status::Error.is_settled());
        assert!(!Status::Loading.is_settled());
        assert!(Status::Loading.is_loading());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Status::Loading).unwrap();
        assert_eq!(json, "\"loading\"");
        let back: Status = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(back, Status::Error);
        assert_eq!(Status::Success.to_string(), "success");
    }
}
