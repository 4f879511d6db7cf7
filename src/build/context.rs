//! Build context containing configuration and state for a build.

use crate::config::Settings;
use crate::serve::ReloadHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build variant, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Source maps, no minification
    #[default]
    Development,
    /// Minified, compressed, optionally purged output
    Production,
}

impl BuildMode {
    /// Mode from the `--production` command-line switch.
    pub fn from_flag(production: bool) -> Self {
        if production {
            BuildMode::Production
        } else {
            BuildMode::Development
        }
    }

    /// Whether this is a production build.
    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}

/// Build context containing configuration and paths for a build operation.
///
/// The settings are shared read-only; cloning a context is cheap.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded settings
    settings: Arc<Settings>,
    /// Project root directory (relative paths in settings resolve against it)
    project_root: PathBuf,
    /// Development or production
    mode: BuildMode,
    /// Live-reload channel, present while the dev server runs
    reload: Option<ReloadHandle>,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// # Arguments
    /// - `settings` - The loaded settings
    /// - `project_root` - The project root directory
    pub fn new(settings: Settings, project_root: PathBuf) -> Self {
        Self {
            settings: Arc::new(settings),
            project_root,
            mode: BuildMode::default(),
            reload: None,
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.settings.paths.dist)
    }

    /// Get the build mode.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Get the live-reload handle, if a dev server is attached.
    pub fn reload(&self) -> Option<&ReloadHandle> {
        self.reload.as_ref()
    }

    /// Set the build mode.
    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a live-reload handle.
    pub fn with_reload(mut self, reload: ReloadHandle) -> Self {
        self.reload = Some(reload);
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::resolve_path(&self.project_root, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_settings;

    #[test]
    fn test_build_context_new() {
        let root = PathBuf::from("/project");
        let ctx = BuildContext::new(default_settings(), root.clone());

        assert_eq!(ctx.project_root(), &root);
        assert_eq!(ctx.mode(), BuildMode::Development);
        assert!(ctx.reload().is_none());
    }

    #[test]
    fn test_build_context_with_mode() {
        let ctx = BuildContext::new(default_settings(), PathBuf::from("/project"))
            .with_mode(BuildMode::from_flag(true));

        assert!(ctx.mode().is_production());
    }

    #[test]
    fn test_build_context_with_reload() {
        let ctx = BuildContext::new(default_settings(), PathBuf::from("/project"))
            .with_reload(ReloadHandle::new());

        assert!(ctx.reload().is_some());
    }

    #[test]
    fn test_build_context_resolve_path() {
        let ctx = BuildContext::new(default_settings(), PathBuf::from("/project"));

        assert_eq!(ctx.resolve_path(Path::new("/other/path")), PathBuf::from("/other/path"));
        assert_eq!(ctx.resolve_path(Path::new("src/assets")), PathBuf::from("/project/src/assets"));
    }

    #[test]
    fn test_build_context_out_dir() {
        let ctx = BuildContext::new(default_settings(), PathBuf::from("/project"));
        assert_eq!(ctx.out_dir(), PathBuf::from("/project/dist"));
    }

    #[test]
    fn test_build_mode_display() {
        assert_eq!(BuildMode::Development.to_string(), "development");
        assert_eq!(BuildMode::Production.to_string(), "production");
    }
}
