//! Settings file loading
//!
//! The settings file is read exactly once at startup. YAML (`.yml`, `.yaml`)
//! and TOML (`.toml`) are both accepted; the extension picks the parser.

use super::schema::{PathSet, PurgeOptions, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default settings file name, looked up in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// YAML parsing error
    #[error("Failed to parse {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    /// TOML parsing error
    #[error("Failed to parse {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Validation error
    #[error("Config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}

/// Settings file format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file path. Anything that is not `.toml` is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Locate the settings file: an explicit path wins, otherwise
/// `config.yml` in the project root.
pub fn config_path(project_root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => resolve_path(project_root, path),
        None => project_root.join(DEFAULT_CONFIG_FILE),
    }
}

/// Load and validate settings from a file.
///
/// # Returns
/// - `Ok(Settings)` on success
/// - `Err(ConfigError)` if the file is missing, malformed, or invalid
///
/// # Example
/// ```ignore
/// let settings = load_settings(Path::new("config.yml"))?;
/// println!("Serving on port {}", settings.port);
/// ```
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let contents = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let settings = parse_settings(&contents, ConfigFormat::from_path(path), path)?;

    let errors = settings.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    tracing::debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

fn parse_settings(
    contents: &str,
    format: ConfigFormat,
    path: &Path,
) -> Result<Settings, ConfigError> {
    match format {
        ConfigFormat::Yaml => serde_yaml_ng::from_str(contents)
            .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source }),
        ConfigFormat::Toml => toml::from_str(contents)
            .map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source }),
    }
}

/// Settings used when building programmatically without a settings file.
///
/// All paths take their defaults; output goes to `dist`.
pub fn default_settings() -> Settings {
    Settings {
        compatibility: vec!["last 2 versions".to_string()],
        port: 8000,
        proxy: None,
        purge: PurgeOptions::default(),
        paths: PathSet::with_dist("dist"),
        theme: vec![],
    }
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
