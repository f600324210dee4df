//! # Configuration Modules
//!
//! Layered runtime configuration shared by the CLI and the HTTP server.

/// CLI/env/file/default layering and the resolved [`Settings`].
pub mod app_config;

pub use app_config::{load_config, Config, ConfigError, Settings, DEFAULT_CONFIG_FILE, DEFAULT_PORT};
