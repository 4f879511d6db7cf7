//! Stylesheet pipeline: Sass compile, prefix, then purge and minify or map.

use super::purge::Purger;
use super::sourcemap::{inline_comment, CommentStyle};
use super::{write_output, Task, TaskError, TaskOutput};
use crate::build::context::BuildMode;
use crate::serve::ReloadHandle;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// File name of the compiled stylesheet inside the output directory.
pub const STYLESHEET_NAME: &str = "style.css";

/// Inputs of the style pipeline.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    /// Entry stylesheet
    pub entry: PathBuf,
    /// Extra directories searched for `@import`/`@use`
    pub include_paths: Vec<PathBuf>,
    /// Browserslist queries for prefixing
    pub browsers: Vec<String>,
    /// Unused-selector removal, production only
    pub purge: Option<Purger>,
    /// Directory `style.css` is written to
    pub out_dir: PathBuf,
    pub mode: BuildMode,
    /// Name recorded for the entry in the source map
    pub source_name: String,
}

/// Compiles the entry stylesheet into `style.css`.
#[derive(Debug, Clone)]
pub struct StylePipeline {
    options: StyleOptions,
    reload: Option<ReloadHandle>,
}

impl StylePipeline {
    pub fn new(options: StyleOptions) -> Self {
        Self { options, reload: None }
    }

    /// Stream the stylesheet to connected browsers after each successful run.
    pub fn with_reload(mut self, reload: Option<ReloadHandle>) -> Self {
        self.reload = reload;
        self
    }

    /// Output path of the stylesheet.
    pub fn output_path(&self) -> PathBuf {
        self.options.out_dir.join(STYLESHEET_NAME)
    }

    fn compile(&self) -> Result<String, String> {
        let options = grass::Options::default()
            .load_paths(&self.options.include_paths)
            .style(grass::OutputStyle::Expanded);
        grass::from_path(&self.options.entry, &options).map_err(|e| e.to_string())
    }

    fn targets(&self) -> Result<Targets, TaskError> {
        if self.options.browsers.is_empty() {
            return Ok(Targets::default());
        }
        let browsers = Browsers::from_browserslist(self.options.browsers.iter().map(String::as_str))
            .map_err(|e| TaskError::Config(format!("invalid COMPATIBILITY: {}", e)))?;
        Ok(Targets { browsers, ..Targets::default() })
    }

    /// Prefix, optionally purge and minify, and print the compiled CSS.
    ///
    /// Declarations the parser cannot read are dropped and returned as
    /// warnings; the rest of the stylesheet is kept.
    fn process(&self, css: &str) -> Result<(String, Vec<String>), String> {
        let production = self.options.mode.is_production();
        let targets = self.targets().map_err(|e| e.to_string())?;

        let recovered = Arc::new(RwLock::new(Vec::new()));
        let mut sheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: self.options.source_name.clone(),
                error_recovery: true,
                warnings: Some(Arc::clone(&recovered)),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| e.to_string())?;

        let warnings: Vec<String> = recovered
            .read()
            .map(|list| list.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default();
        for warning in &warnings {
            tracing::warn!(
                entry = %self.options.entry.display(),
                "skipped declaration: {}",
                warning
            );
        }

        // Vendor prefixes are added while lowering for `targets`.
        sheet
            .minify(MinifyOptions { targets: targets.clone(), ..MinifyOptions::default() })
            .map_err(|e| e.to_string())?;

        if production {
            if let Some(purger) = &self.options.purge {
                let used = purger.collect().map_err(|e| e.to_string())?;
                let removed = purger.purge_rules(&mut sheet.rules, &used);
                tracing::debug!(removed, "purged unused style rules");
            }
        }

        let mut map = if production {
            None
        } else {
            let mut map = SourceMap::new("/");
            let source = map.add_source(&format!("{} (compiled)", self.options.source_name));
            map.set_source_content(source as usize, css).map_err(|e| format!("{:?}", e))?;
            Some(map)
        };

        let printed = sheet
            .to_css(PrinterOptions {
                minify: production,
                targets,
                source_map: map.as_mut(),
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;

        let mut code = printed.code;
        if let Some(map) = map.as_mut() {
            if !code.ends_with('\n') {
                code.push('\n');
            }
            code.push_str(&inline_comment(map, CommentStyle::Css)?);
        }
        Ok((code, warnings))
    }
}

impl Task for StylePipeline {
    fn name(&self) -> &str {
        "styles"
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        let css = match self.compile() {
            Ok(css) => css,
            Err(message) => {
                tracing::error!(entry = %self.options.entry.display(), "{}", message);
                return Ok(TaskOutput::warning(message));
            }
        };

        let (code, warnings) = match self.process(&css) {
            Ok(processed) => processed,
            Err(message) => {
                tracing::error!(entry = %self.options.entry.display(), "{}", message);
                return Ok(TaskOutput::warning(message));
            }
        };

        let output = self.output_path();
        write_output(&output, code)?;
        tracing::debug!(path = %output.display(), mode = %self.options.mode, "wrote stylesheet");

        if let Some(reload) = &self.reload {
            reload.stream_css(STYLESHEET_NAME);
        }
        Ok(TaskOutput { outputs: vec![output], warnings })
    }
}
