//! Configuration module for assetflow
//!
//! Provides types and loading for the `config.yml` settings file.

pub mod loader;
pub mod schema;

pub use loader::{config_path, default_settings, load_settings, resolve_path, ConfigError};
pub use schema::*;
