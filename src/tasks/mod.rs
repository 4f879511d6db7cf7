//! Build tasks.
//!
//! Each task is a short pipeline: select files, hand them to an external
//! transformer, write the results under the output directory. Tasks take the
//! configuration they need as constructor arguments and run synchronously;
//! the scheduler and watcher move them onto the blocking thread pool.

pub mod clean;
pub mod copy;
pub mod images;
pub mod purge;
pub mod scripts;
pub mod sourcemap;
pub mod styleguide;
pub mod styles;

pub use clean::Clean;
pub use copy::CopyFiles;
pub use images::ImagePipeline;
pub use purge::Purger;
pub use scripts::{Passthrough, ScriptPipeline, Transpiler, BUNDLE_NAME};
pub use styleguide::StyleGuide;
pub use styles::{StyleOptions, StylePipeline, STYLESHEET_NAME};

use crate::build::discovery::DiscoveryError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A unit of build work.
pub trait Task: Send + Sync {
    /// Short name used in logs and results.
    fn name(&self) -> &str;

    /// Run the task to completion.
    ///
    /// Recoverable problems (a stylesheet that fails to compile, a minifier
    /// error) are reported as warnings in the output; an `Err` fails the run.
    fn run(&self) -> Result<TaskOutput, TaskError>;
}

/// What a task produced.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Recoverable problems, already logged
    pub warnings: Vec<String>,
}

impl TaskOutput {
    /// Output listing the given files.
    pub fn with_outputs(outputs: Vec<PathBuf>) -> Self {
        Self { outputs, warnings: vec![] }
    }

    /// Output with no files and a single warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self { outputs: vec![], warnings: vec![message.into()] }
    }
}

/// Fatal task failure.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Filesystem error
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Glob or directory walk error
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// A required input file does not exist
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),
    /// Template or Markdown rendering failed
    #[error("Render failed: {0}")]
    Render(String),
    /// Invalid task configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl TaskError {
    /// Build a closure that wraps an `io::Error` with the path it concerns.
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> TaskError + '_ {
        move |source| TaskError::Io { path: path.to_path_buf(), source }
    }
}

/// Write a file, creating parent directories as needed.
pub fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    fs::write(path, contents).map_err(TaskError::io(path))
}

/// Copy a file, creating parent directories as needed.
pub fn copy_output(from: &Path, to: &Path) -> Result<(), TaskError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(TaskError::io(parent))?;
    }
    fs::copy(from, to).map_err(TaskError::io(from))?;
    Ok(())
}

/// Display name of a file relative to the project root, with `/` separators.
pub(crate) fn display_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
