//! TOML configuration for the `jsbridge` binary.
//!
//! A [`ConfigFile`] carries the [`BridgeConfig`] sections at top level plus
//! any number of `[[preload]]` scripts ([`PreloadEntry`]).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BridgeConfig;

/// Parsed configuration file.
///
/// # Example
///
/// ```toml
/// [engine]
/// default_origin = "<stdin>"
///
/// [resolver]
/// root_dir = "./modules"
/// extensions = ["js", "mjs"]
///
/// [logging]
/// filter = "info"
/// json = false
///
/// [[preload]]
/// path = "./prelude.js"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Bridge configuration (engine, resolver and logging sections).
    #[serde(flatten)]
    pub bridge: BridgeConfig,

    /// Scripts run, in order, on every new engine before the entry point.
    #[serde(default)]
    pub preload: Vec<PreloadEntry>,
}

impl ConfigFile {
    /// Read and parse the file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigFileError::Io`] if the file is unreadable,
    /// [`ConfigFileError::Parse`] if its contents are not valid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml(&text)
    }

    /// Parse TOML text; absent sections take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigFileError::Parse`] on malformed TOML or mistyped fields.
    pub fn from_toml(text: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(text).map_err(|err| ConfigFileError::Parse {
            message: err.to_string(),
        })
    }
}

/// A script evaluated before the entry point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PreloadEntry {
    /// Path to the script file.
    pub path: String,

    /// Origin used in stack traces; defaults to the path.
    #[serde(default)]
    pub origin: Option<String>,
}

impl PreloadEntry {
    /// The origin this script is attributed to.
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or(&self.path)
    }
}

/// Errors loading a [`ConfigFile`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// The file could not be read.
    #[error("Cannot read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The contents are not a valid configuration.
    #[error("Invalid config file: {message}")]
    Parse { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = ConfigFile::default();

        assert_eq!(config.bridge.engine.default_origin, "<anonymous>");
        assert_eq!(config.bridge.resolver.root_dir, ".");
        assert!(config.preload.is_empty());
    }

    #[test]
    fn test_single_section() {
        let config = ConfigFile::from_toml("[resolver]\nroot_dir = \"./lib\"\n").unwrap();

        assert_eq!(config.bridge.resolver.root_dir, "./lib");
        assert_eq!(config.bridge.resolver.extensions, vec!["js", "mjs"]);
        assert!(!config.bridge.logging.json);
    }

    #[test]
    fn test_every_section() {
        let text = r#"
            [engine]
            default_origin = "<stdin>"

            [resolver]
            root_dir = "/srv/modules"
            extensions = ["mjs"]

            [logging]
            filter = "warn"
            json = true

            [[preload]]
            path = "./prelude.js"

            [[preload]]
            path = "./polyfill.js"
            origin = "polyfill"
        "#;

        let config = ConfigFile::from_toml(text).unwrap();

        assert_eq!(config.bridge.engine.default_origin, "<stdin>");
        assert_eq!(config.bridge.resolver.root_dir, "/srv/modules");
        assert_eq!(config.bridge.resolver.extensions, vec!["mjs"]);
        assert_eq!(config.bridge.logging.filter, "warn");
        assert!(config.bridge.logging.json);
        assert_eq!(config.preload.len(), 2);
        assert_eq!(config.preload[0].origin(), "./prelude.js");
        assert_eq!(config.preload[1].origin(), "polyfill");
    }

    #[test]
    fn test_mistyped_field() {
        let err = ConfigFile::from_toml("[logging]\njson = \"yes\"\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { .. }));
        assert!(err.to_string().starts_with("Invalid config file"));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigFile::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigFileError::Io { .. })));
    }
}
