//! Source file discovery for the build system.
//!
//! Glob groups follow the usual shell-style conventions: `**` crosses directories, `*` does
//! not, `{a,b}` alternation is supported, and a leading `!` excludes matches
//! from the rest of the group. Every positive pattern has a *base*, its
//! leading literal directories, and discovered files remember their path
//! relative to that base so outputs can mirror the source layout.

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Error during source discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, #[source] globset::Error),
    /// Directory walk error
    #[error("Error while scanning {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// A file selected by a glob group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Full path of the file
    pub path: PathBuf,
    /// Path relative to the base of the pattern that matched it
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct IncludePattern {
    base: PathBuf,
    matcher: GlobMatcher,
}

/// A compiled list of include and `!`-exclude globs.
#[derive(Debug, Clone)]
pub struct GlobGroup {
    patterns: Vec<String>,
    includes: Vec<IncludePattern>,
    excludes: GlobSet,
}

fn compile(pattern: &str) -> Result<Glob, DiscoveryError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| DiscoveryError::InvalidPattern(pattern.to_string(), e))
}

fn normalize_pattern(pattern: &str) -> &str {
    pattern.trim().trim_start_matches("./")
}

impl GlobGroup {
    /// Compile a list of patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DiscoveryError> {
        let mut includes = Vec::new();
        let mut excludes = GlobSetBuilder::new();

        for raw in patterns {
            let raw = raw.as_ref();
            match raw.trim().strip_prefix('!') {
                Some(negated) => {
                    excludes.add(compile(normalize_pattern(negated))?);
                }
                None => {
                    let pattern = normalize_pattern(raw);
                    includes.push(IncludePattern {
                        base: glob_base(pattern),
                        matcher: compile(pattern)?.compile_matcher(),
                    });
                }
            }
        }

        let excludes = excludes
            .build()
            .map_err(|e| DiscoveryError::InvalidPattern(patterns_display(patterns), e))?;

        Ok(Self {
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            includes,
            excludes,
        })
    }

    /// The patterns this group was built from.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check if the group has no include patterns.
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Base directories of the include patterns, in pattern order.
    pub fn bases(&self) -> Vec<&Path> {
        self.includes.iter().map(|i| i.base.as_path()).collect()
    }

    /// Check whether a path (relative to the project root) is selected.
    pub fn is_match(&self, path: &Path) -> bool {
        let candidate = to_slash(path);
        !self.excludes.is_match(&candidate)
            && self.includes.iter().any(|i| i.matcher.is_match(&candidate))
    }

    /// Find every file selected by the group under `root`.
    ///
    /// Order is deterministic: pattern order first, then a sorted directory
    /// walk. A file selected by several patterns is reported once, for the
    /// first pattern that matched it.
    pub fn discover(&self, root: &Path) -> Result<Vec<MatchedFile>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for include in &self.includes {
            let dir = root.join(&include.base);
            if !dir.exists() {
                continue;
            }

            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry =
                    entry.map_err(|source| DiscoveryError::Walk { path: dir.clone(), source })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let candidate = to_slash(path.strip_prefix(root).unwrap_or(path));
                if !include.matcher.is_match(&candidate) || self.excludes.is_match(&candidate) {
                    continue;
                }

                if seen.insert(path.to_path_buf()) {
                    let relative = path.strip_prefix(&dir).unwrap_or(path).to_path_buf();
                    files.push(MatchedFile { path: path.to_path_buf(), relative });
                }
            }
        }

        Ok(files)
    }
}

fn patterns_display<S: AsRef<str>>(patterns: &[S]) -> String {
    patterns.iter().map(|p| p.as_ref()).collect::<Vec<_>>().join(", ")
}

/// Render a path with `/` separators for glob matching.
fn to_slash(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            other => parts.push(other.as_os_str().to_string_lossy()),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Compute the base directory of a glob: its leading components that contain
/// no glob syntax. A pattern without glob syntax names a single file, so its
/// base is the parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);
    let mut base =
        if pattern.starts_with('/') { PathBuf::from("/") } else { PathBuf::new() };

    let parts: Vec<&str> = pattern.split('/').filter(|p| !p.is_empty()).collect();
    for (i, part) in parts.iter().enumerate() {
        let is_glob = part.contains(|c| matches!(c, '*' | '?' | '[' | '{'));
        if is_glob || i + 1 == parts.len() {
            break;
        }
        base.push(part);
    }
    base
}
