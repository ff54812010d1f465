//! Configuration structures for jsbridge.
//!
//! This module defines configuration options for various components:
//! - [`BridgeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Script evaluation defaults
//! - [`ResolverConfig`]: Filesystem module resolution
//! - [`LoggingConfig`]: Tracing subscriber settings

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
///
/// It can be loaded from files (TOML, JSON) or built in code.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Script evaluation defaults.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Module resolution settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Script evaluation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Origin attributed to source that has no file name (e.g. stdin).
    #[serde(default = "defaults::default_origin")]
    pub default_origin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_origin: defaults::default_origin(),
        }
    }
}

/// Filesystem module resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Directory bare specifiers are resolved against.
    #[serde(default = "defaults::root_dir")]
    pub root_dir: String,

    /// Extensions tried, in order, when a specifier names no existing file.
    #[serde(default = "defaults::extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
            extensions: defaults::extensions(),
        }
    }
}

/// Tracing subscriber settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "defaults::filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: defaults::filter(),
            json: false,
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub fn default_origin() -> String {
        "<anonymous>".to_string()
    }

    pub fn root_dir() -> String {
        ".".to_string()
    }

    pub fn extensions() -> Vec<String> {
        vec!["js".to_string(), "mjs".to_string()]
    }

    pub fn filter() -> String {
        "info,jsbridge=debug".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert_eq!(config.engine.default_origin, "<anonymous>");
        assert_eq!(config.resolver.root_dir, ".");
        assert_eq!(config.resolver.extensions, vec!["js", "mjs"]);
        assert_eq!(config.logging.filter, "info,jsbridge=debug");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_config_serialization() {
        let config = BridgeConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BridgeConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.resolver.extensions, deserialized.resolver.extensions);
        assert_eq!(config.engine.default_origin, deserialized.engine.default_origin);
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"resolver": {"root_dir": "/srv/modules"}}"#;
        let config: BridgeConfig = serde_json::from_str(json).unwrap();

        // Explicitly set value
        assert_eq!(config.resolver.root_dir, "/srv/modules");
        // Default values for unspecified fields
        assert_eq!(config.resolver.extensions, vec!["js", "mjs"]);
        assert_eq!(config.engine.default_origin, "<anonymous>");
    }
}
