//! Assetflow - front-end asset pipeline for theme projects
//!
//! This library provides functionality to:
//! - Compile Sass into prefixed, minified or source-mapped CSS
//! - Bundle scripts, optimize images and copy static and theme files
//! - Render a Markdown style guide through an HTML template
//! - Serve the output (or proxy a local site) with live reload, rebuilding on change

pub mod build;
pub mod cli;
pub mod config;
pub mod logging;
pub mod serve;
pub mod tasks;
pub mod watch;
