//! Script pipeline: transpile, concatenate, then minify or map.

use super::sourcemap::{inline_comment, CommentStyle};
use super::{display_name, write_output, Task, TaskError, TaskOutput};
use crate::build::context::BuildMode;
use crate::build::discovery::{DiscoveryError, GlobGroup};
use minify_js::{minify, Session, TopLevelMode};
use parcel_sourcemap::{OriginalLocation, SourceMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the script bundle inside the scripts output directory.
pub const BUNDLE_NAME: &str = "app.js";

/// Source-to-source transform applied to each script before concatenation.
pub trait Transpiler: Send + Sync {
    fn transpile(&self, path: &Path, source: String) -> Result<String, String>;
}

/// Leaves sources untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transpiler for Passthrough {
    fn transpile(&self, _path: &Path, source: String) -> Result<String, String> {
        Ok(source)
    }
}

/// Bundles every matched script into `app.js`.
#[derive(Clone)]
pub struct ScriptPipeline {
    root: PathBuf,
    sources: GlobGroup,
    out_dir: PathBuf,
    mode: BuildMode,
    transpiler: Arc<dyn Transpiler>,
}

impl std::fmt::Debug for ScriptPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptPipeline")
            .field("root", &self.root)
            .field("sources", &self.sources)
            .field("out_dir", &self.out_dir)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ScriptPipeline {
    /// Create a script pipeline writing `out_dir/app.js`.
    pub fn new<S: AsRef<str>>(
        root: PathBuf,
        globs: &[S],
        out_dir: PathBuf,
        mode: BuildMode,
    ) -> Result<Self, DiscoveryError> {
        Ok(Self {
            root,
            sources: GlobGroup::new(globs)?,
            out_dir,
            mode,
            transpiler: Arc::new(Passthrough),
        })
    }

    /// Replace the per-file transpile step.
    pub fn with_transpiler(mut self, transpiler: Arc<dyn Transpiler>) -> Self {
        self.transpiler = transpiler;
        self
    }

    /// Output path of the bundle.
    pub fn output_path(&self) -> PathBuf {
        self.out_dir.join(BUNDLE_NAME)
    }
}

/// One transpiled input.
struct Chunk {
    name: String,
    content: String,
}

/// Join chunks with `\n`, mapping each bundle line back to its source line.
fn concat(chunks: &[Chunk], map: Option<&mut SourceMap>) -> Result<String, String> {
    let bundle = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n");

    if let Some(map) = map {
        let mut offset = 0u32;
        for chunk in chunks {
            let source = map.add_source(&chunk.name);
            map.set_source_content(source as usize, &chunk.content)
                .map_err(|e| format!("{:?}", e))?;
            let lines = chunk.content.split('\n').count() as u32;
            for line in 0..lines {
                let original = OriginalLocation::new(line, 0, source, None);
                map.add_mapping(offset + line, 0, Some(original));
            }
            offset += lines;
        }
    }
    Ok(bundle)
}

impl Task for ScriptPipeline {
    fn name(&self) -> &str {
        "scripts"
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        let mut chunks = Vec::new();
        for file in self.sources.discover(&self.root)? {
            let source = fs::read_to_string(&file.path).map_err(TaskError::io(&file.path))?;
            let name = display_name(&self.root, &file.path);
            match self.transpiler.transpile(&file.path, source) {
                Ok(content) => chunks.push(Chunk { name, content }),
                Err(message) => {
                    tracing::error!(file = %name, "{}", message);
                    return Ok(TaskOutput::warning(format!("{}: {}", name, message)));
                }
            }
        }

        let output = self.output_path();
        let code = if self.mode.is_production() {
            let bundle = concat(&chunks, None).map_err(TaskError::Render)?;
            let session = Session::new();
            let mut out = Vec::new();
            if let Err(e) = minify(&session, TopLevelMode::Global, bundle.as_bytes(), &mut out) {
                let message = format!("minification failed: {:?}", e);
                tracing::error!(bundle = BUNDLE_NAME, "{}", message);
                return Ok(TaskOutput::warning(message));
            }
            out
        } else {
            let mut map = SourceMap::new("/");
            let mut bundle = concat(&chunks, Some(&mut map)).map_err(TaskError::Render)?;
            if !bundle.ends_with('\n') {
                bundle.push('\n');
            }
            let comment = inline_comment(&mut map, CommentStyle::Js).map_err(TaskError::Render)?;
            bundle.push_str(&comment);
            bundle.into_bytes()
        };

        write_output(&output, code)?;
        tracing::debug!(
            path = %output.display(),
            inputs = chunks.len(),
            mode = %self.mode,
            "wrote script bundle"
        );
        Ok(TaskOutput::with_outputs(vec![output]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::sourcemap::decode_inline;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn pipeline(root: &Path, mode: BuildMode) -> ScriptPipeline {
        ScriptPipeline::new(
            root.to_path_buf(),
            &["src/assets/js/**/*.js"],
            root.join("dist/assets/js"),
            mode,
        )
        .unwrap()
    }

    #[test]
    fn test_concatenates_in_glob_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/js/b.js", "var b = 2;");
        write(temp.path(), "src/assets/js/a.js", "var a = 1;");

        let scripts = pipeline(temp.path(), BuildMode::Development);
        scripts.run().unwrap();

        let bundle = fs::read_to_string(scripts.output_path()).unwrap();
        assert!(bundle.starts_with("var a = 1;\nvar b = 2;\n"));

        let map = decode_inline(&bundle).unwrap();
        let a = map.find("src/assets/js/a.js").unwrap();
        let b = map.find("src/assets/js/b.js").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_production_minifies() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "src/assets/js/app.js",
            "function greet(name) {\n    var message = 'hello ' + name;\n    return message;\n}\n",
        );

        let scripts = pipeline(temp.path(), BuildMode::Production);
        scripts.run().unwrap();

        let bundle = fs::read_to_string(scripts.output_path()).unwrap();
        assert!(!bundle.contains("sourceMappingURL"));
        assert!(bundle.len() < 80);
    }

    #[test]
    fn test_minify_error_is_a_warning() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/js/broken.js", "function ( {");

        let scripts = pipeline(temp.path(), BuildMode::Production);
        let output = scripts.run().unwrap();

        assert_eq!(output.warnings.len(), 1);
        assert!(!scripts.output_path().exists());
    }

    struct Failing;

    impl Transpiler for Failing {
        fn transpile(&self, _path: &Path, _source: String) -> Result<String, String> {
            Err("unexpected token".to_string())
        }
    }

    #[test]
    fn test_transpile_error_is_a_warning() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/assets/js/a.js", "let a = 1;");

        let scripts =
            pipeline(temp.path(), BuildMode::Development).with_transpiler(Arc::new(Failing));
        let output = scripts.run().unwrap();

        assert!(output.warnings[0].contains("unexpected token"));
        assert!(output.outputs.is_empty());
    }

    #[test]
    fn test_empty_source_set_writes_empty_bundle() {
        let temp = TempDir::new().unwrap();
        let scripts = pipeline(temp.path(), BuildMode::Development);

        scripts.run().unwrap();
        assert!(scripts.output_path().exists());
    }
}
