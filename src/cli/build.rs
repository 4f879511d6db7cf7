//! Build and dev command implementations

use std::path::PathBuf;
use std::process::ExitCode;

use super::{RunOptions, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildPipeline, BuildResult};
use crate::config::{config_path, load_settings};
use crate::serve::{DevServer, ReloadHandle, ServeOptions};
use crate::watch::{reactions, watch, WatchRouter, WatchSession};

/// Load the settings and build the context, or report why not.
pub(crate) fn load_context(options: &RunOptions) -> Result<BuildContext, String> {
    let root = match &options.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()
            .map_err(|e| format!("Cannot determine current directory: {}", e))?,
    };

    let path = config_path(&root, options.config.as_deref());
    tracing::debug!(config = %path.display(), "using settings file");
    let settings = load_settings(&path).map_err(|e| e.to_string())?;

    Ok(BuildContext::new(settings, root).with_mode(options.mode))
}

fn report(result: &BuildResult) {
    for output in result.all_outputs() {
        tracing::debug!(path = %output.display(), "wrote");
    }
    if result.is_success() {
        tracing::info!("{}", result.summary());
    } else {
        tracing::error!("{}", result.summary());
    }
}

/// Build once, handing back the pipeline so its tasks can be reused.
async fn build_once(context: BuildContext) -> Result<BuildPipeline, String> {
    let pipeline = BuildPipeline::new(context).map_err(|e| e.to_string())?;
    let result = pipeline.build().await.map_err(|e| e.to_string())?;
    report(&result);
    if result.is_success() {
        Ok(pipeline)
    } else {
        Err(format!("{} task(s) failed", result.failed_count()))
    }
}

/// Run the build command
pub async fn run_build(options: &RunOptions) -> ExitCode {
    let context = match load_context(options) {
        Ok(context) => context,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match build_once(context).await {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the dev command: build, serve, then watch until interrupted.
pub async fn run_dev(options: &RunOptions) -> ExitCode {
    let reload = ReloadHandle::new();
    let context = match load_context(options) {
        Ok(context) => context.with_reload(reload.clone()),
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let pipeline = match build_once(context).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!("Build failed: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let context = pipeline.context();
    let settings = context.settings();
    let serve_options = ServeOptions {
        port: settings.port,
        proxy: settings.proxy.clone(),
        dist: context.out_dir(),
    };
    let server = match DevServer::start(serve_options, reload.clone()).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let root: PathBuf = context.project_root().to_path_buf();
    let router = match WatchRouter::from_settings(root, settings) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let session = WatchSession::start(router, reactions(pipeline.tasks()), Some(reload));

    tokio::select! {
        watched = watch(session) => match watched {
            Ok(()) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                tracing::error!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        },
        () = server.wait() => {
            tracing::error!("Dev server stopped");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
