//! Verbatim file copies (static assets and theme files).

use super::{copy_output, Task, TaskError, TaskOutput};
use crate::build::discovery::{DiscoveryError, GlobGroup};
use std::path::PathBuf;

/// Copies every file selected by a glob group into a destination directory,
/// preserving the path relative to each pattern's base.
#[derive(Debug, Clone)]
pub struct CopyFiles {
    name: String,
    root: PathBuf,
    globs: GlobGroup,
    dest: PathBuf,
}

impl CopyFiles {
    /// Create a copy task.
    ///
    /// # Arguments
    /// - `name` - Task name
    /// - `root` - Project root the globs are relative to
    /// - `globs` - Patterns selecting the files
    /// - `dest` - Destination directory
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        root: PathBuf,
        globs: &[S],
        dest: PathBuf,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self { name: name.into(), root, globs: GlobGroup::new(globs)?, dest })
    }
}

impl Task for CopyFiles {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        let mut outputs = Vec::new();
        for file in self.globs.discover(&self.root)? {
            let target = self.dest.join(&file.relative);
            copy_output(&file.path, &target)?;
            outputs.push(target);
        }
        tracing::debug!(task = %self.name, files = outputs.len(), "copied files");
        Ok(TaskOutput::with_outputs(outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_copy_assets_skips_pipeline_sources() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/assets/fonts/icons.woff", "font");
        touch(temp.path(), "src/assets/js/app.js", "js");
        touch(temp.path(), "src/assets/scss/style.scss", "scss");

        let dest = temp.path().join("dist/assets");
        let copy = CopyFiles::new(
            "copy",
            temp.path().to_path_buf(),
            &["src/assets/**/*", "!src/assets/{img,js,scss}/**/*"],
            dest.clone(),
        )
        .unwrap();

        let output = copy.run().unwrap();
        assert_eq!(output.outputs, vec![dest.join("fonts/icons.woff")]);
        assert_eq!(fs::read_to_string(dest.join("fonts/icons.woff")).unwrap(), "font");
        assert!(!dest.join("js").exists());
    }

    #[test]
    fn test_copy_theme_to_root_is_idempotent() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/index.php", "<?php echo 1;");
        touch(temp.path(), "src/parts/header.php", "<header>");

        let dest = temp.path().join("dist");
        let theme =
            CopyFiles::new("theme", temp.path().to_path_buf(), &["src/**/*.php"], dest.clone())
                .unwrap();

        theme.run().unwrap();
        let output = theme.run().unwrap();

        assert_eq!(output.outputs.len(), 2);
        assert_eq!(fs::read_to_string(dest.join("parts/header.php")).unwrap(), "<header>");
    }
}
