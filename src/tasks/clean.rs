//! Output directory removal.

use super::{Task, TaskError, TaskOutput};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Recursively deletes the output directory.
#[derive(Debug, Clone)]
pub struct Clean {
    dir: PathBuf,
}

impl Clean {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Task for Clean {
    fn name(&self) -> &str {
        "clean"
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(dir = %self.dir.display(), "removed output directory");
                Ok(TaskOutput::default())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TaskOutput::default()),
            Err(e) => Err(TaskError::Io { path: self.dir.clone(), source: e }),
        }
    }
}
