//! Command-line interface implementation
//!
//! Parses arguments, sets up logging and the async runtime, then dispatches
//! to the `build` or `dev` command.

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::BuildMode;

/// Exit codes. Invalid arguments exit with clap's code 2.
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// assetflow - build front-end assets and serve them with live reload
#[derive(Parser, Debug)]
#[command(name = "assetflow")]
#[command(about = "Build theme assets and serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// Minify and compress output, no source maps
    #[arg(long, global = true)]
    pub production: bool,

    /// Settings file (default: config.yml in the project root)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Clean and build everything once
    Build,
    /// Build, then serve with live reload and rebuild on change (default)
    Dev,
}

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub mode: BuildMode,
    pub verbose: bool,
}

impl From<&Cli> for RunOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            root: cli.root.clone(),
            config: cli.config.clone(),
            mode: BuildMode::from_flag(cli.production),
            verbose: cli.verbose,
        }
    }
}

/// Main CLI entry point
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = RunOptions::from(&cli);
    crate::logging::init(options.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    runtime.block_on(async {
        match cli.command.unwrap_or(Commands::Dev) {
            Commands::Build => build::run_build(&options).await,
            Commands::Dev => build::run_dev(&options).await,
        }
    })
}
