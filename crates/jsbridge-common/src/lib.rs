//! Common types, errors, and configuration for jsbridge.
//!
//! This crate provides shared functionality used across the jsbridge workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine, resolver and logging settings

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{BridgeConfig, EngineConfig, LoggingConfig, ResolverConfig};
pub use config_file::{ConfigFile, ConfigFileError, PreloadEntry};
pub use error::{BridgeError, ScriptError};
