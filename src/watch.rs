//! Watch mode: re-run the matching pipeline when sources change
//!
//! File events are debounced, classified into categories by glob, and queued
//! to one consumer per category. A consumer runs its task to completion before
//! taking the next event, so a category never runs twice at once while
//! different categories proceed independently.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::build::{format_duration, DiscoveryError, GlobGroup, TaskSet};
use crate::config::Settings;
use crate::serve::ReloadHandle;
use crate::tasks::Task;

/// Quiet period before a burst of file events is handled.
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Invalid watch glob
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// The event channel closed
    #[error("Watch channel closed")]
    ChannelClosed,
}

/// What kind of source changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchCategory {
    Assets,
    Theme,
    Styles,
    Scripts,
    Images,
    StyleGuide,
}

impl std::fmt::Display for WatchCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WatchCategory::Assets => "assets",
            WatchCategory::Theme => "theme",
            WatchCategory::Styles => "styles",
            WatchCategory::Scripts => "scripts",
            WatchCategory::Images => "images",
            WatchCategory::StyleGuide => "styleguide",
        };
        f.write_str(name)
    }
}

/// Maps changed paths to watch categories.
#[derive(Debug, Clone)]
pub struct WatchRouter {
    root: PathBuf,
    routes: Vec<(WatchCategory, GlobGroup)>,
}

impl WatchRouter {
    pub fn new(root: PathBuf, routes: Vec<(WatchCategory, GlobGroup)>) -> Self {
        Self { root, routes }
    }

    /// Routes for every watched path group in the settings.
    pub fn from_settings(root: PathBuf, settings: &Settings) -> Result<Self, DiscoveryError> {
        let paths = &settings.paths;
        let routes = vec![
            (WatchCategory::Assets, GlobGroup::new(&paths.assets)?),
            (WatchCategory::Theme, GlobGroup::new(&paths.templates)?),
            (WatchCategory::Styles, GlobGroup::new(&paths.styles)?),
            (WatchCategory::Scripts, GlobGroup::new(&paths.javascript)?),
            (WatchCategory::Images, GlobGroup::new(&paths.images)?),
            (WatchCategory::StyleGuide, GlobGroup::new(&paths.styleguide.watch)?),
        ];
        Ok(Self::new(root, routes))
    }

    /// Categories whose globs select `path` (absolute, or relative to the root).
    pub fn classify(&self, path: &Path) -> BTreeSet<WatchCategory> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        self.routes
            .iter()
            .filter(|(_, globs)| globs.is_match(relative))
            .map(|(category, _)| *category)
            .collect()
    }

    /// Directories to watch recursively: existing glob bases, nested ones dropped.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .routes
            .iter()
            .flat_map(|(_, globs)| globs.bases())
            .map(|base| self.root.join(base))
            .filter(|dir| {
                let exists = dir.is_dir();
                if !exists {
                    tracing::debug!(dir = %dir.display(), "not watching missing directory");
                }
                exists
            })
            .collect();
        dirs.sort();
        dirs.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            if !roots.iter().any(|r| dir.starts_with(r)) {
                roots.push(dir);
            }
        }
        roots
    }
}

/// What to run when a category changes.
#[derive(Clone)]
pub struct Reaction {
    pub task: Arc<dyn Task>,
    /// Reload browsers after a successful run
    pub reload_after: bool,
}

impl Reaction {
    pub fn new(task: Arc<dyn Task>, reload_after: bool) -> Self {
        Self { task, reload_after }
    }
}

/// The reaction table used by `dev`.
///
/// Assets are copied without a reload; styles stream their own CSS update.
pub fn reactions(tasks: &TaskSet) -> BTreeMap<WatchCategory, Reaction> {
    BTreeMap::from([
        (WatchCategory::Assets, Reaction::new(Arc::clone(&tasks.copy), false)),
        (WatchCategory::Theme, Reaction::new(Arc::clone(&tasks.theme), true)),
        (WatchCategory::Styles, Reaction::new(Arc::clone(&tasks.styles), false)),
        (WatchCategory::Scripts, Reaction::new(Arc::clone(&tasks.scripts), true)),
        (WatchCategory::Images, Reaction::new(Arc::clone(&tasks.images), true)),
        (WatchCategory::StyleGuide, Reaction::new(Arc::clone(&tasks.styleguide), true)),
    ])
}

/// Running per-category consumers.
pub struct WatchSession {
    router: WatchRouter,
    queues: BTreeMap<WatchCategory, mpsc::UnboundedSender<()>>,
    consumers: Vec<JoinHandle<()>>,
}

impl WatchSession {
    /// Spawn one consumer per reaction. Must be called inside a Tokio runtime.
    pub fn start(
        router: WatchRouter,
        reactions: BTreeMap<WatchCategory, Reaction>,
        reload: Option<ReloadHandle>,
    ) -> Self {
        let mut queues = BTreeMap::new();
        let mut consumers = Vec::new();

        for (category, reaction) in reactions {
            let (tx, rx) = mpsc::unbounded_channel();
            queues.insert(category, tx);
            consumers.push(tokio::spawn(consume(category, reaction, rx, reload.clone())));
        }

        Self { router, queues, consumers }
    }

    pub fn router(&self) -> &WatchRouter {
        &self.router
    }

    /// Queue one run per category touched by a batch of changed paths.
    pub fn dispatch(&self, paths: &[PathBuf]) -> BTreeSet<WatchCategory> {
        let categories: BTreeSet<WatchCategory> =
            paths.iter().flat_map(|p| self.router.classify(p)).collect();

        for category in &categories {
            if let Some(queue) = self.queues.get(category) {
                if queue.send(()).is_err() {
                    tracing::warn!(%category, "watch consumer stopped");
                }
            }
        }
        categories
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        for consumer in &self.consumers {
            consumer.abort();
        }
    }
}

async fn consume(
    category: WatchCategory,
    reaction: Reaction,
    mut rx: mpsc::UnboundedReceiver<()>,
    reload: Option<ReloadHandle>,
) {
    while rx.recv().await.is_some() {
        let task = Arc::clone(&reaction.task);
        let name = task.name().to_string();
        tracing::info!("Starting '{}'...", name);
        let start = Instant::now();

        match tokio::task::spawn_blocking(move || task.run()).await {
            Ok(Ok(output)) => {
                tracing::info!("Finished '{}' after {}", name, format_duration(start.elapsed()));
                for warning in &output.warnings {
                    tracing::debug!(%category, "{}", warning);
                }
                if reaction.reload_after {
                    if let Some(reload) = &reload {
                        reload.reload();
                    }
                }
            }
            Ok(Err(e)) => tracing::error!("'{}' errored: {}", name, e),
            Err(e) => tracing::error!("'{}' panicked: {}", name, e),
        }
    }
}

/// Watch the router's directories and dispatch debounced batches until the
/// process exits.
pub async fn watch(session: WatchSession) -> Result<(), WatchError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })
    .map_err(WatchError::WatcherInit)?;

    for dir in session.router().watch_dirs() {
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath { path: dir.clone(), source })?;
        tracing::debug!(dir = %dir.display(), "watching");
    }
    tracing::info!("Watching for changes...");

    while let Some(result) = rx.recv().await {
        match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                let categories = session.dispatch(&paths);
                if !categories.is_empty() {
                    tracing::debug!(changed = paths.len(), ?categories, "file changes");
                }
            }
            Err(e) => tracing::warn!("Watch error: {}", e),
        }
    }

    Err(WatchError::ChannelClosed)
}
