//! Build system for assetflow
//!
//! Turns the settings into a graph of tasks and runs it.
//!
//! # Overview
//!
//! The build consists of:
//! - **Discovery**: Find source files using glob groups from the settings
//! - **Planning**: Arrange the tasks into a dependency graph
//! - **Execution**: Run ready tasks concurrently until the graph is done
//!
//! # Example
//!
//! ```ignore
//! use assetflow::build::{BuildContext, BuildPipeline};
//! use assetflow::config::load_settings;
//!
//! let settings = load_settings(Path::new("config.yml"))?;
//! let context = BuildContext::new(settings, project_root);
//! let pipeline = BuildPipeline::new(context)?;
//!
//! let result = pipeline.build().await?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod discovery;
pub mod parallel;
pub mod pipeline;
pub mod result;
pub mod target;

pub use context::*;
pub use discovery::*;
pub use parallel::*;
pub use pipeline::*;
pub use result::*;
pub use target::*;
