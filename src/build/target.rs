//! Build target definitions.
//!
//! A build target is one node of the task graph: a named task plus the ids
//! of the targets that must succeed before it starts.

use crate::tasks::Task;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Type of build target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Output directory removal
    Clean,
    /// Theme files copied to the output root
    Theme,
    /// Stylesheet compile
    Styles,
    /// Script bundle
    Scripts,
    /// Image copy and compression
    Images,
    /// Static asset copy
    Copy,
    /// Style guide page
    StyleGuide,
}

impl TargetKind {
    /// Target id used in plans and logs.
    pub fn id(self) -> &'static str {
        match self {
            TargetKind::Clean => "clean",
            TargetKind::Theme => "theme",
            TargetKind::Styles => "styles",
            TargetKind::Scripts => "scripts",
            TargetKind::Images => "images",
            TargetKind::Copy => "copy",
            TargetKind::StyleGuide => "styleguide",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A build target representing work to be done.
#[derive(Clone)]
pub struct BuildTarget {
    /// Unique identifier for this target
    pub id: String,
    /// What kind of target this is
    pub kind: TargetKind,
    /// The work itself
    pub task: Arc<dyn Task>,
    /// Dependencies (other target IDs that must succeed first)
    pub dependencies: Vec<String>,
}

impl std::fmt::Debug for BuildTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildTarget")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("task", &self.task.name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl BuildTarget {
    /// Create a target whose id is the kind's name.
    pub fn new(kind: TargetKind, task: Arc<dyn Task>) -> Self {
        Self { id: kind.id().to_string(), kind, task, dependencies: vec![] }
    }

    /// Add a dependency to this target.
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Add multiple dependencies to this target.
    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }
}

/// A collection of build targets with dependency information.
#[derive(Debug, Default)]
pub struct BuildPlan {
    /// All targets in the build
    targets: Vec<BuildTarget>,
}

impl BuildPlan {
    /// Create a new empty build plan.
    pub fn new() -> Self {
        Self { targets: vec![] }
    }

    /// Add a target to the plan.
    pub fn add_target(&mut self, target: BuildTarget) {
        self.targets.push(target);
    }

    /// Get all targets in the plan.
    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    /// Look up a target by id.
    pub fn get(&self, id: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Get the number of targets in the plan.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Check ids are unique and every dependency names a target in the plan.
    pub fn validate(&self) -> Result<(), BuildOrderError> {
        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.id.as_str()) {
                return Err(BuildOrderError::DuplicateTarget(target.id.clone()));
            }
        }
        for target in &self.targets {
            for dep in &target.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(BuildOrderError::UnknownDependency {
                        target: target.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Get targets in build order (respecting dependencies).
    ///
    /// Returns targets sorted so that dependencies come before dependents.
    /// Returns an error for unknown dependencies or circular dependencies.
    pub fn build_order(&self) -> Result<Vec<&BuildTarget>, BuildOrderError> {
        self.validate()?;

        let by_id: HashMap<&str, &BuildTarget> =
            self.targets.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();

        for target in &self.targets {
            visit_target(target, &by_id, &mut visited, &mut visiting, &mut result)?;
        }

        Ok(result)
    }

    /// Group targets into levels whose dependencies all sit in earlier levels.
    pub fn levels(&self) -> Result<Vec<Vec<&BuildTarget>>, BuildOrderError> {
        let order = self.build_order()?;
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<&BuildTarget>> = Vec::new();

        for target in order {
            let level = target
                .dependencies
                .iter()
                .filter_map(|d| depth.get(d.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            depth.insert(target.id.as_str(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(target);
        }

        Ok(levels)
    }
}

fn visit_target<'a>(
    target: &'a BuildTarget,
    by_id: &HashMap<&str, &'a BuildTarget>,
    visited: &mut HashSet<&'a str>,
    visiting: &mut HashSet<&'a str>,
    result: &mut Vec<&'a BuildTarget>,
) -> Result<(), BuildOrderError> {
    if visited.contains(target.id.as_str()) {
        return Ok(());
    }

    if !visiting.insert(target.id.as_str()) {
        return Err(BuildOrderError::CyclicDependency(target.id.clone()));
    }

    // Visit dependencies first
    for dep_id in &target.dependencies {
        if let Some(dep) = by_id.get(dep_id.as_str()) {
            visit_target(dep, by_id, visited, visiting, result)?;
        }
    }

    visiting.remove(target.id.as_str());
    visited.insert(target.id.as_str());
    result.push(target);

    Ok(())
}

/// Error during build order calculation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildOrderError {
    /// Circular dependency detected
    #[error("Circular dependency detected involving target '{0}'")]
    CyclicDependency(String),
    /// A dependency names no target in the plan
    #[error("Target '{target}' depends on unknown target '{dependency}'")]
    UnknownDependency { target: String, dependency: String },
    /// Two targets share an id
    #[error("Duplicate target '{0}'")]
    DuplicateTarget(String),
}
