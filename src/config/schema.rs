//! Configuration schema types for the settings file (`config.yml`)
//!
//! Top-level keys keep the upper-case names used by existing theme projects
//! (`COMPATIBILITY`, `PORT`, `PROXY`, `UNCSS_OPTIONS`, `PATHS`, `THEME`).
//! Every glob field accepts either a single string or a list of strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::build::discovery::{glob_base, GlobGroup};

/// Deserialize a field that may be written as a single glob or a list of globs.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(glob) => vec![glob],
        OneOrMany::Many(globs) => globs,
    })
}

/// Options for unused-selector removal (`UNCSS_OPTIONS`).
///
/// Only `enabled`, `html` and `ignore` are interpreted; any other keys are
/// preserved in `extra` so existing settings files keep loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PurgeOptions {
    /// Run the purge step in production builds
    #[serde(default)]
    pub enabled: bool,
    /// Globs of HTML/template files whose class and id names are kept
    #[serde(default, deserialize_with = "one_or_many")]
    pub html: Vec<String>,
    /// Selectors that are always kept. `/.../` entries are regular expressions.
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Unrecognized options, carried through untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Style guide inputs and output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleGuidePaths {
    /// Markdown source
    #[serde(default = "default_styleguide_source")]
    pub source: PathBuf,
    /// HTML (Tera) template
    #[serde(default = "default_styleguide_template")]
    pub template: PathBuf,
    /// Output file name, relative to `dist`
    #[serde(default = "default_styleguide_output")]
    pub output: PathBuf,
    /// Globs that trigger a style guide rebuild in watch mode
    #[serde(default = "default_styleguide_watch", deserialize_with = "one_or_many")]
    pub watch: Vec<String>,
}

impl Default for StyleGuidePaths {
    fn default() -> Self {
        Self {
            source: default_styleguide_source(),
            template: default_styleguide_template(),
            output: default_styleguide_output(),
            watch: default_styleguide_watch(),
        }
    }
}

fn default_styleguide_source() -> PathBuf {
    PathBuf::from("src/styleguide/index.md")
}

fn default_styleguide_template() -> PathBuf {
    PathBuf::from("src/styleguide/template.html")
}

fn default_styleguide_output() -> PathBuf {
    PathBuf::from("styleguide.html")
}

fn default_styleguide_watch() -> Vec<String> {
    vec!["src/styleguide/**".to_string()]
}

/// Named path groups (`PATHS`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSet {
    /// Output directory, wiped at the start of every build
    pub dist: PathBuf,
    /// Static assets copied to `dist/assets`
    #[serde(default = "default_assets", deserialize_with = "one_or_many")]
    pub assets: Vec<String>,
    /// Additional Sass include paths
    #[serde(default, deserialize_with = "one_or_many")]
    pub sass: Vec<String>,
    /// Script sources, concatenated in glob order
    #[serde(default = "default_javascript", deserialize_with = "one_or_many")]
    pub javascript: Vec<String>,
    /// Theme files copied verbatim to the `dist` root
    #[serde(default, deserialize_with = "one_or_many")]
    pub theme: Vec<String>,
    /// Stylesheet entry point
    #[serde(default = "default_style_entry")]
    pub style_entry: PathBuf,
    /// Stylesheet sources watched for changes
    #[serde(default = "default_styles", deserialize_with = "one_or_many")]
    pub styles: Vec<String>,
    /// Image sources
    #[serde(default = "default_images", deserialize_with = "one_or_many")]
    pub images: Vec<String>,
    /// Theme templates watched for changes
    #[serde(default = "default_templates", deserialize_with = "one_or_many")]
    pub templates: Vec<String>,
    /// Style guide sources
    #[serde(default)]
    pub styleguide: StyleGuidePaths,
}

fn default_assets() -> Vec<String> {
    vec!["src/assets/**/*".to_string(), "!src/assets/{img,js,scss}/**/*".to_string()]
}

fn default_javascript() -> Vec<String> {
    vec!["src/assets/js/**/*.js".to_string()]
}

fn default_style_entry() -> PathBuf {
    PathBuf::from("src/assets/scss/style.scss")
}

fn default_styles() -> Vec<String> {
    vec!["src/assets/scss/**/*.scss".to_string()]
}

fn default_images() -> Vec<String> {
    vec!["src/assets/img/**/*".to_string()]
}

fn default_templates() -> Vec<String> {
    vec!["src/**/*.{php,twig}".to_string()]
}

impl PathSet {
    /// Path set with every field at its default and the given output directory.
    pub fn with_dist(dist: impl Into<PathBuf>) -> Self {
        Self {
            dist: dist.into(),
            assets: default_assets(),
            sass: vec![],
            javascript: default_javascript(),
            theme: vec![],
            style_entry: default_style_entry(),
            styles: default_styles(),
            images: default_images(),
            templates: default_templates(),
            styleguide: StyleGuidePaths::default(),
        }
    }
}

fn default_port() -> u16 {
    8000
}

/// Complete settings file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Browserslist queries for vendor prefixing
    #[serde(rename = "COMPATIBILITY", default, deserialize_with = "one_or_many")]
    pub compatibility: Vec<String>,
    /// Dev server port
    #[serde(rename = "PORT", default = "default_port")]
    pub port: u16,
    /// Upstream for requests the dev server does not answer itself
    #[serde(rename = "PROXY", default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Unused-selector removal options
    #[serde(rename = "UNCSS_OPTIONS", default)]
    pub purge: PurgeOptions,
    /// Input globs and output directory
    #[serde(rename = "PATHS")]
    pub paths: PathSet,
    /// Extra theme globs, appended to `PATHS.theme`
    #[serde(rename = "THEME", default, deserialize_with = "one_or_many")]
    pub theme: Vec<String>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "PATHS.assets")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' {}", self.field, self.message)
    }
}

impl ConfigValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl Settings {
    /// Theme globs: `PATHS.theme` followed by the top-level `THEME` list.
    pub fn theme_globs(&self) -> Vec<String> {
        let mut globs = self.paths.theme.clone();
        for glob in &self.theme {
            if !globs.contains(glob) {
                globs.push(glob.clone());
            }
        }
        globs
    }

    /// Validate the settings, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.paths.dist.as_os_str().is_empty() {
            errors.push(ConfigValidationError::new("PATHS.dist", "must not be empty"));
        }
        if self.port == 0 {
            errors.push(ConfigValidationError::new("PORT", "must be between 1 and 65535"));
        }
        if let Some(proxy) = &self.proxy {
            if proxy.trim().is_empty() {
                errors.push(ConfigValidationError::new("PROXY", "must not be empty when set"));
            }
        }

        let groups: [(&str, &[String]); 7] = [
            ("PATHS.assets", &self.paths.assets),
            ("PATHS.javascript", &self.paths.javascript),
            ("PATHS.theme", &self.paths.theme),
            ("PATHS.styles", &self.paths.styles),
            ("PATHS.images", &self.paths.images),
            ("PATHS.templates", &self.paths.templates),
            ("UNCSS_OPTIONS.html", &self.purge.html),
        ];
        for (field, globs) in groups {
            if let Err(e) = GlobGroup::new(globs) {
                errors.push(ConfigValidationError::new(field, e.to_string()));
            }
        }
        if let Err(e) = GlobGroup::new(&self.theme) {
            errors.push(ConfigValidationError::new("THEME", e.to_string()));
        }

        errors.extend(self.overlap_errors());
        errors
    }

    /// The generic asset group must not pick up files owned by the style,
    /// script or image pipelines.
    fn overlap_errors(&self) -> Vec<ConfigValidationError> {
        let Ok(assets) = GlobGroup::new(&self.paths.assets) else {
            return vec![];
        };

        let mut samples: Vec<(&str, PathBuf)> =
            vec![("PATHS.style_entry", self.paths.style_entry.clone())];
        let owned: [(&str, &[String]); 3] = [
            ("PATHS.styles", &self.paths.styles),
            ("PATHS.javascript", &self.paths.javascript),
            ("PATHS.images", &self.paths.images),
        ];
        for (field, globs) in owned {
            for glob in globs.iter().filter(|g| !g.starts_with('!')) {
                samples.push((field, glob_base(glob).join("__sample__")));
            }
        }

        samples
            .into_iter()
            .filter(|(_, sample)| assets.is_match(sample))
            .map(|(field, sample)| {
                ConfigValidationError::new(
                    "PATHS.assets",
                    format!("overlaps {} ({})", field, sample.display()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_from_yaml(yaml: &str) -> Settings {
        serde_yaml_ng::from_str(yaml).expect("should parse settings")
    }

    #[test]
    fn test_minimal_settings_defaults() {
        let settings = settings_from_yaml("PATHS:\n  dist: dist\n");

        assert_eq!(settings.port, 8000);
        assert!(settings.proxy.is_none());
        assert!(settings.compatibility.is_empty());
        assert!(!settings.purge.enabled);
        assert_eq!(settings.paths.style_entry, PathBuf::from("src/assets/scss/style.scss"));
        assert_eq!(settings.paths.javascript, vec!["src/assets/js/**/*.js".to_string()]);
        assert_eq!(settings.paths.styleguide.output, PathBuf::from("styleguide.html"));
    }

    #[test]
    fn test_single_string_globs() {
        let settings = settings_from_yaml(
            r#"
COMPATIBILITY: "last 2 versions"
PATHS:
  dist: dist
  javascript: "src/js/*.js"
  sass: "node_modules/foundation-sites/scss"
"#,
        );

        assert_eq!(settings.compatibility, vec!["last 2 versions".to_string()]);
        assert_eq!(settings.paths.javascript, vec!["src/js/*.js".to_string()]);
        assert_eq!(settings.paths.sass.len(), 1);
    }

    #[test]
    fn test_purge_options_keep_unknown_keys() {
        let settings = settings_from_yaml(
            r#"
UNCSS_OPTIONS:
  html: ["src/**/*.html"]
  ignore: [".is-active", "/^\\.menu/"]
  timeout: 1000
PATHS:
  dist: dist
"#,
        );

        assert!(!settings.purge.enabled);
        assert_eq!(settings.purge.html.len(), 1);
        assert_eq!(settings.purge.ignore.len(), 2);
        assert_eq!(settings.purge.extra.get("timeout"), Some(&serde_json::json!(1000)));
    }

    #[test]
    fn test_theme_globs_union() {
        let mut settings = settings_from_yaml("PATHS:\n  dist: dist\n  theme: ['src/*.php']\n");
        settings.theme = vec!["src/*.php".to_string(), "src/screenshot.png".to_string()];

        assert_eq!(
            settings.theme_globs(),
            vec!["src/*.php".to_string(), "src/screenshot.png".to_string()]
        );
    }

    #[test]
    fn test_validate_default_paths_are_disjoint() {
        let settings = settings_from_yaml("PATHS:\n  dist: dist\n");
        assert!(settings.validate().is_empty(), "{:?}", settings.validate());
    }

    #[test]
    fn test_validate_assets_overlap() {
        let settings = settings_from_yaml("PATHS:\n  dist: dist\n  assets: 'src/assets/**/*'\n");
        let errors = settings.validate();

        assert!(errors
            .iter()
            .any(|e| e.field == "PATHS.assets" && e.message.contains("javascript")));
        assert!(errors.iter().any(|e| e.message.contains("images")));
    }

    #[test]
    fn test_validate_bad_values() {
        let settings = settings_from_yaml(
            "PORT: 0\nPROXY: ' '\nPATHS:\n  dist: ''\n  javascript: 'src/[js'\n",
        );
        let fields: Vec<_> = settings.validate().into_iter().map(|e| e.field).collect();

        assert!(fields.contains(&"PORT".to_string()));
        assert!(fields.contains(&"PROXY".to_string()));
        assert!(fields.contains(&"PATHS.dist".to_string()));
        assert!(fields.contains(&"PATHS.javascript".to_string()));
    }
}
