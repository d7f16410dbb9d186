use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Behavior switches for a container. Every field has a default, so an
/// empty TOML document is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Name attached to every log line emitted for this container.
    pub label: String,
    /// Stateful containers only: single-entry operations also drive the
    /// container's own status. Flat containers always do.
    pub update_root_status: bool,
    /// When a failed replace or update gets no replacement from its error
    /// handler, restore the value from before the call instead of keeping
    /// whatever the preload left behind.
    pub rollback_on_error: bool,
    /// Run keyed operations on the same key one after another instead of
    /// letting them interleave.
    pub serialize_per_key: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            label: "container".into(),
            update_root_status: false,
            rollback_on_error: false,
            serialize_per_key: false,
        }
    }
}

impl ContainerConfig {
    /// Default config with a custom log label.
    pub fn named(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_root_status(mut self, enabled: bool) -> Self {
        self.update_root_status = enabled;
        self
    }

    pub fn with_rollback(mut self, enabled: bool) -> Self {
        self.rollback_on_error = enabled;
        self
    }

    pub fn with_per_key_serialization(mut self, enabled: bool) -> Self {
        self.serialize_per_key = enabled;
        self
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = ContainerConfig::default();
        assert_eq!(c.label, "container");
        assert!(!c.update_root_status);
        assert!(!c.rollback_on_error);
        assert!(!c.serialize_per_key);
    }

    #[test]
    fn empty_toml_is_default() {
        let c = ContainerConfig::from_toml_str("").unwrap();
        assert_eq!(c, ContainerConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let c = ContainerConfig::from_toml_str(
            r#"
            label = "todos"
            update_root_status = true
            "#,
        )
        .unwrap();
        assert_eq!(c.label, "todos");
        assert!(c.update_root_status);
        assert!(!c.serialize_per_key);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = ContainerConfig::from_toml_str("rollback_on_error = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "serialize_per_key = true").unwrap();
        let c = ContainerConfig::load(file.path()).unwrap();
        assert!(c.serialize_per_key);
        assert_eq!(c.label, "container");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContainerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn builders_compose() {
        let c = ContainerConfig::named("users")
            .with_root_status(true)
            .with_rollback(true)
            .with_per_key_serialization(true);
        assert_eq!(c.label, "users");
        assert!(c.update_root_status && c.rollback_on_error && c.serialize_per_key);
    }
}
