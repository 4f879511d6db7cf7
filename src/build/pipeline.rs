//! Build pipeline orchestration.
//!
//! Wires the settings into concrete tasks and arranges them into the build
//! graph: `clean` first, then theme/styles/scripts/images/copy side by side,
//! then the style guide.

use crate::build::discovery::DiscoveryError;
use crate::build::{
    BuildContext, BuildOrderError, BuildPlan, BuildResult, BuildTarget, ParallelBuild, TargetKind,
};
use crate::tasks::{
    display_name, Clean, CopyFiles, ImagePipeline, Purger, ScriptPipeline, StyleGuide,
    StyleOptions, StylePipeline, Task, TaskError,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Error during build setup or execution.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Build order error (circular or unknown dependencies)
    #[error("Build order error: {0}")]
    BuildOrder(#[from] BuildOrderError),
    /// A task could not be constructed
    #[error("Task setup failed: {0}")]
    Task(#[from] TaskError),
    /// Generic build error
    #[error("Build error: {0}")]
    Build(String),
}

/// One constructed task per build target.
#[derive(Clone)]
pub struct TaskSet {
    pub clean: Arc<dyn Task>,
    pub theme: Arc<dyn Task>,
    pub styles: Arc<dyn Task>,
    pub scripts: Arc<dyn Task>,
    pub images: Arc<dyn Task>,
    pub copy: Arc<dyn Task>,
    pub styleguide: Arc<dyn Task>,
}

impl TaskSet {
    /// Construct every task from the context's settings.
    pub fn from_context(context: &BuildContext) -> Result<Self, BuildError> {
        let settings = context.settings();
        let paths = &settings.paths;
        let root = context.project_root().to_path_buf();
        let out_dir = context.out_dir();
        let mode = context.mode();

        let entry = context.resolve_path(&paths.style_entry);
        let purge = Purger::from_options(root.clone(), &settings.purge)?;
        let styles = StylePipeline::new(StyleOptions {
            source_name: display_name(&root, &entry),
            entry,
            include_paths: paths.sass.iter().map(|p| context.resolve_path(Path::new(p))).collect(),
            browsers: settings.compatibility.clone(),
            purge,
            out_dir: out_dir.clone(),
            mode,
        })
        .with_reload(context.reload().cloned());

        let guide = &paths.styleguide;

        Ok(Self {
            clean: Arc::new(Clean::new(out_dir.clone())),
            theme: Arc::new(CopyFiles::new(
                "theme",
                root.clone(),
                &settings.theme_globs(),
                out_dir.clone(),
            )?),
            styles: Arc::new(styles),
            scripts: Arc::new(ScriptPipeline::new(
                root.clone(),
                &paths.javascript,
                out_dir.join("assets/js"),
                mode,
            )?),
            images: Arc::new(ImagePipeline::new(
                root.clone(),
                &paths.images,
                out_dir.join("assets/img"),
                mode,
            )?),
            copy: Arc::new(CopyFiles::new("copy", root, &paths.assets, out_dir.join("assets"))?),
            styleguide: Arc::new(StyleGuide::new(
                context.resolve_path(&guide.source),
                context.resolve_path(&guide.template),
                out_dir.join(&guide.output),
            )),
        })
    }
}

/// Build pipeline for executing builds.
pub struct BuildPipeline {
    /// Build context
    context: BuildContext,
    /// Constructed tasks
    tasks: TaskSet,
}

impl BuildPipeline {
    /// Create a new build pipeline, constructing every task up front.
    pub fn new(context: BuildContext) -> Result<Self, BuildError> {
        let tasks = TaskSet::from_context(&context)?;
        Ok(Self { context, tasks })
    }

    /// The constructed tasks, shared with the watcher.
    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    /// The build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// The build graph.
    pub fn plan(&self) -> BuildPlan {
        let t = &self.tasks;
        let parallel = [
            (TargetKind::Theme, &t.theme),
            (TargetKind::Styles, &t.styles),
            (TargetKind::Scripts, &t.scripts),
            (TargetKind::Images, &t.images),
            (TargetKind::Copy, &t.copy),
        ];

        let mut plan = BuildPlan::new();
        plan.add_target(BuildTarget::new(TargetKind::Clean, Arc::clone(&t.clean)));
        for &(kind, task) in &parallel {
            plan.add_target(
                BuildTarget::new(kind, Arc::clone(task)).with_dependency(TargetKind::Clean.id()),
            );
        }
        plan.add_target(
            BuildTarget::new(TargetKind::StyleGuide, Arc::clone(&t.styleguide))
                .with_dependencies(parallel.iter().map(|(kind, _)| kind.id())),
        );
        plan
    }

    /// Run the full build.
    pub async fn build(&self) -> Result<BuildResult, BuildError> {
        tracing::info!(
            mode = %self.context.mode(),
            out_dir = %self.context.out_dir().display(),
            "building"
        );
        ParallelBuild::new().run(&self.plan()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildMode;
    use crate::config::default_settings;
    use tempfile::TempDir;

    #[test]
    fn test_plan_shape() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_settings(), temp.path().to_path_buf());
        let pipeline = BuildPipeline::new(ctx).unwrap();

        let plan = pipeline.plan();
        let levels = plan.levels().unwrap();
        let ids: Vec<Vec<&str>> =
            levels.iter().map(|l| l.iter().map(|t| t.id.as_str()).collect()).collect();

        assert_eq!(
            ids,
            vec![
                vec!["clean"],
                vec!["theme", "styles", "scripts", "images", "copy"],
                vec!["styleguide"]
            ]
        );
    }

    #[test]
    fn test_task_names() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_settings(), temp.path().to_path_buf())
            .with_mode(BuildMode::Production);
        let tasks = TaskSet::from_context(&ctx).unwrap();

        assert_eq!(tasks.clean.name(), "clean");
        assert_eq!(tasks.theme.name(), "theme");
        assert_eq!(tasks.copy.name(), "copy");
        assert_eq!(tasks.styleguide.name(), "styleguide");
    }

    #[test]
    fn test_invalid_purge_pattern_fails_setup() {
        let temp = TempDir::new().unwrap();
        let mut settings = default_settings();
        settings.purge.enabled = true;
        settings.purge.ignore = vec!["/[/".to_string()];

        let ctx = BuildContext::new(settings, temp.path().to_path_buf());
        assert!(matches!(BuildPipeline::new(ctx), Err(BuildError::Task(TaskError::Config(_)))));
    }

    #[tokio::test]
    async fn test_build_empty_project_fails_on_styleguide() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(default_settings(), temp.path().to_path_buf());

        let result = BuildPipeline::new(ctx).unwrap().build().await.unwrap();

        assert_eq!(result.failed_count(), 1);
        assert!(result.get("styleguide").unwrap().status.is_failure());
        assert!(result.get("styles").unwrap().is_success());
    }
}
