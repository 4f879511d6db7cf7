//! Parallel build execution.
//!
//! Targets start as soon as all of their dependencies have succeeded and run
//! on the blocking thread pool, so independent pipelines overlap.
//!
//! # How It Works
//!
//! 1. Validate the plan (unknown dependencies, cycles)
//! 2. Start every target whose dependencies are all done
//! 3. Wait for the next target to finish and record its result
//! 4. Repeat until nothing is running; targets never started are skipped
//!
//! # Example
//!
//! ```ignore
//! let plan = BuildPipeline::new(context)?.plan();
//! let result = ParallelBuild::new().run(&plan).await?;
//! println!("{}", result.summary());
//! ```

use crate::build::{format_duration, BuildError, BuildPlan, BuildResult, BuildTarget, TargetResult};
use crate::tasks::TaskOutput;
use std::collections::HashSet;
use std::time::Instant;
use tokio::task::JoinSet;

type Finished = (String, Result<TaskOutput, String>, Instant, Instant);

/// Parallel build executor.
#[derive(Debug, Clone)]
pub struct ParallelBuild {
    /// Whether to stop starting targets after the first failure
    fail_fast: bool,
}

impl Default for ParallelBuild {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelBuild {
    /// Create a new parallel build (fail-fast by default).
    pub fn new() -> Self {
        Self { fail_fast: true }
    }

    /// Set fail-fast mode (stop starting targets on first error).
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Run every target of the plan.
    pub async fn run(&self, plan: &BuildPlan) -> Result<BuildResult, BuildError> {
        let start = Instant::now();

        let levels = plan.levels()?;
        for (i, level) in levels.iter().enumerate() {
            let ids: Vec<_> = level.iter().map(|t| t.id.as_str()).collect();
            tracing::debug!(level = i, targets = ?ids, "build level");
        }

        let mut pending: Vec<&BuildTarget> = plan.build_order()?;
        let mut succeeded: HashSet<String> = HashSet::new();
        let mut running: JoinSet<Finished> = JoinSet::new();
        let mut stopped = false;
        let mut result = BuildResult::new();

        loop {
            if !stopped {
                let (ready, blocked): (Vec<_>, Vec<_>) = pending
                    .into_iter()
                    .partition(|t| t.dependencies.iter().all(|d| succeeded.contains(d)));
                pending = blocked;

                for target in ready {
                    tracing::info!("Starting '{}'...", target.id);
                    let id = target.id.clone();
                    let task = target.task.clone();
                    running.spawn_blocking(move || {
                        let started = Instant::now();
                        let run = task.run().map_err(|e| e.to_string());
                        (id, run, started, Instant::now())
                    });
                }
            }

            let Some(joined) = running.join_next().await else {
                break;
            };
            let (id, run, started, finished) =
                joined.map_err(|e| BuildError::Build(format!("task panicked: {}", e)))?;

            let target_result = TargetResult::from_run(id.clone(), run, started, finished);
            match &target_result.status {
                status if status.is_success() => {
                    tracing::info!(
                        "Finished '{}' after {}",
                        id,
                        format_duration(target_result.duration)
                    );
                    succeeded.insert(id);
                }
                status => {
                    tracing::error!(
                        "'{}' errored after {}: {}",
                        id,
                        format_duration(target_result.duration),
                        status
                    );
                    if self.fail_fast {
                        stopped = true;
                    }
                }
            }
            result.add_result(target_result);
        }

        for target in pending {
            tracing::debug!(target = %target.id, "skipped");
            result.add_result(TargetResult::skipped(target.id.clone()));
        }

        Ok(result.with_duration(start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildStatus, TargetKind};
    use crate::tasks::{Task, TaskError};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records its name into a shared log; optionally fails.
    struct Step {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
        delay: Duration,
    }

    impl Task for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn run(&self) -> Result<TaskOutput, TaskError> {
            std::thread::sleep(self.delay);
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(TaskError::MissingInput(PathBuf::from(self.name)))
            } else {
                Ok(TaskOutput::default())
            }
        }
    }

    fn target(
        kind: TargetKind,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
        delay_ms: u64,
    ) -> BuildTarget {
        BuildTarget::new(
            kind,
            Arc::new(Step {
                name: kind.id(),
                log: Arc::clone(log),
                fail,
                delay: Duration::from_millis(delay_ms),
            }),
        )
    }

    #[tokio::test]
    async fn test_dependencies_finish_before_dependents_start() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plan = BuildPlan::new();
        plan.add_target(target(TargetKind::Clean, &log, false, 20));
        plan.add_target(target(TargetKind::Styles, &log, false, 10).with_dependency("clean"));
        plan.add_target(target(TargetKind::Scripts, &log, false, 0).with_dependency("clean"));
        plan.add_target(
            target(TargetKind::StyleGuide, &log, false, 0).with_dependencies(["styles", "scripts"]),
        );

        let result = ParallelBuild::new().run(&plan).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.success_count(), 4);

        let clean = result.get("clean").unwrap();
        let guide = result.get("styleguide").unwrap();
        for id in ["styles", "scripts"] {
            let r = result.get(id).unwrap();
            assert!(r.started_at.unwrap() >= clean.finished_at.unwrap());
            assert!(guide.started_at.unwrap() >= r.finished_at.unwrap());
        }

        let log = log.lock().unwrap();
        assert_eq!(log.first(), Some(&"clean"));
        assert_eq!(log.last(), Some(&"styleguide"));
    }

    #[tokio::test]
    async fn test_failure_skips_unstarted_targets() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plan = BuildPlan::new();
        plan.add_target(target(TargetKind::Clean, &log, true, 0));
        plan.add_target(target(TargetKind::Styles, &log, false, 0).with_dependency("clean"));
        plan.add_target(target(TargetKind::Copy, &log, false, 0).with_dependency("clean"));

        let result = ParallelBuild::new().run(&plan).await.unwrap();

        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.skipped_count(), 2);
        assert_eq!(result.get("styles").unwrap().status, BuildStatus::Skipped);
        assert_eq!(*log.lock().unwrap(), vec!["clean"]);
    }

    #[tokio::test]
    async fn test_in_flight_targets_finish_after_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plan = BuildPlan::new();
        plan.add_target(target(TargetKind::Clean, &log, false, 0));
        plan.add_target(target(TargetKind::Theme, &log, true, 0).with_dependency("clean"));
        plan.add_target(target(TargetKind::Images, &log, false, 50).with_dependency("clean"));
        plan.add_target(
            target(TargetKind::StyleGuide, &log, false, 0).with_dependencies(["theme", "images"]),
        );

        let result = ParallelBuild::new().run(&plan).await.unwrap();

        assert!(result.get("images").unwrap().is_success());
        assert!(result.get("theme").unwrap().status.is_failure());
        assert_eq!(result.get("styleguide").unwrap().status, BuildStatus::Skipped);
    }

    #[tokio::test]
    async fn test_without_fail_fast_independent_targets_still_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plan = BuildPlan::new();
        plan.add_target(target(TargetKind::Theme, &log, true, 0));
        plan.add_target(target(TargetKind::Images, &log, false, 30));
        plan.add_target(target(TargetKind::Copy, &log, false, 0).with_dependency("images"));

        let result = ParallelBuild::new().with_fail_fast(false).run(&plan).await.unwrap();

        assert!(result.get("copy").unwrap().is_success());
        assert_eq!(result.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_before_running() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut plan = BuildPlan::new();
        plan.add_target(target(TargetKind::Styles, &log, false, 0).with_dependency("scripts"));
        plan.add_target(target(TargetKind::Scripts, &log, false, 0).with_dependency("styles"));

        assert!(matches!(ParallelBuild::new().run(&plan).await, Err(BuildError::BuildOrder(_))));
        assert!(log.lock().unwrap().is_empty());
    }
}
