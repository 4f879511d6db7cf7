//! Unused-selector removal.
//!
//! Class and id names are collected from the configured HTML/template files.
//! A style rule survives when at least one of its selectors only needs names
//! that were found, or when it matches an `ignore` entry. Selectors are
//! compared textually; tag names, attributes and pseudo-class arguments are
//! never required.

use super::TaskError;
use crate::build::discovery::GlobGroup;
use crate::config::PurgeOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::PrinterOptions;
use lightningcss::traits::ToCss;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(class|id)\s*=\s*["']([^"']*)["']"#).expect("valid attribute regex")
    })
}

fn selector_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([.#])(-?[_a-zA-Z][_a-zA-Z0-9-]*)").expect("valid name regex"))
}

fn bracketed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("valid bracket regex"))
}

/// Class and id names referenced by the purge inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedNames {
    pub classes: HashSet<String>,
    pub ids: HashSet<String>,
}

impl UsedNames {
    /// Collect names from markup.
    pub fn scan(&mut self, markup: &str) {
        for caps in attribute_regex().captures_iter(markup) {
            let target = if caps[1].eq_ignore_ascii_case("class") {
                &mut self.classes
            } else {
                &mut self.ids
            };
            target.extend(caps[2].split_whitespace().map(str::to_string));
        }
    }
}

#[derive(Debug, Clone)]
enum IgnoreRule {
    Exact(String),
    Pattern(Regex),
}

impl IgnoreRule {
    fn parse(entry: &str) -> Result<Self, String> {
        match entry.strip_prefix('/').and_then(|e| e.strip_suffix('/')) {
            Some(pattern) if !pattern.is_empty() => Regex::new(pattern)
                .map(IgnoreRule::Pattern)
                .map_err(|e| format!("invalid ignore pattern '{}': {}", entry, e)),
            _ => Ok(IgnoreRule::Exact(entry.trim().to_string())),
        }
    }

    fn matches(&self, selector: &str) -> bool {
        match self {
            IgnoreRule::Exact(exact) => selector == exact,
            IgnoreRule::Pattern(re) => re.is_match(selector),
        }
    }
}

/// Removes style rules whose selectors reference no known markup.
#[derive(Debug, Clone)]
pub struct Purger {
    root: PathBuf,
    html: GlobGroup,
    ignore: Vec<IgnoreRule>,
}

impl Purger {
    /// Build a purger from `UNCSS_OPTIONS`. Returns `None` when purging is disabled.
    pub fn from_options(root: PathBuf, options: &PurgeOptions) -> Result<Option<Self>, TaskError> {
        if !options.enabled {
            return Ok(None);
        }
        for key in options.extra.keys() {
            tracing::debug!(option = %key, "ignoring unsupported purge option");
        }

        let html = GlobGroup::new(&options.html)?;
        let ignore = options
            .ignore
            .iter()
            .map(|entry| IgnoreRule::parse(entry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(TaskError::Config)?;

        Ok(Some(Self { root, html, ignore }))
    }

    /// Read every purge input and collect the names it uses.
    pub fn collect(&self) -> Result<UsedNames, TaskError> {
        let mut used = UsedNames::default();
        for file in self.html.discover(&self.root)? {
            let markup = fs::read_to_string(&file.path).map_err(TaskError::io(&file.path))?;
            used.scan(&markup);
        }
        Ok(used)
    }

    /// Decide whether a (comma-separated) selector list keeps its rule.
    pub fn keeps(&self, selectors: &str, used: &UsedNames) -> bool {
        selectors.split(',').map(str::trim).any(|selector| {
            self.ignore.iter().any(|rule| rule.matches(selector))
                || selector_is_used(selector, used)
        })
    }

    /// Drop unused style rules, descending into `@media` blocks and nested rules.
    ///
    /// Returns the number of rules removed.
    pub fn purge_rules<R>(&self, rules: &mut CssRuleList<'_, R>, used: &UsedNames) -> usize {
        let before = rules.0.len();
        let mut removed = 0;

        rules.0.retain_mut(|rule| match rule {
            CssRule::Style(style) => {
                let selectors = match style.selectors.to_css_string(PrinterOptions::default()) {
                    Ok(text) => text,
                    Err(_) => return true,
                };
                if !self.keeps(&selectors, used) {
                    return false;
                }
                removed += self.purge_rules(&mut style.rules, used);
                true
            }
            CssRule::Media(media) => {
                removed += self.purge_rules(&mut media.rules, used);
                !media.rules.0.is_empty()
            }
            _ => true,
        });

        removed + (before - rules.0.len())
    }
}

/// A selector is used when every class and id it names appears in the markup.
fn selector_is_used(selector: &str, used: &UsedNames) -> bool {
    let stripped = bracketed_regex().replace_all(selector, "");
    selector_name_regex().captures_iter(&stripped).all(|caps| match &caps[1] {
        "." => used.classes.contains(&caps[2]),
        _ => used.ids.contains(&caps[2]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightningcss::stylesheet::{ParserOptions, StyleSheet};
    use tempfile::TempDir;

    fn used(markup: &str) -> UsedNames {
        let mut names = UsedNames::default();
        names.scan(markup);
        names
    }

    fn purger(ignore: &[&str]) -> Purger {
        Purger {
            root: PathBuf::from("."),
            html: GlobGroup::new::<&str>(&[]).unwrap(),
            ignore: ignore.iter().map(|e| IgnoreRule::parse(e).unwrap()).collect(),
        }
    }

    #[test]
    fn test_scan_classes_and_ids() {
        let names = used(r#"<div class="card card--wide" id='main'><a CLASS="btn">x</a></div>"#);

        assert!(names.classes.contains("card"));
        assert!(names.classes.contains("card--wide"));
        assert!(names.classes.contains("btn"));
        assert!(names.ids.contains("main"));
    }

    #[test]
    fn test_keeps_selector_lists() {
        let names = used(r#"<p class="lead"></p>"#);
        let purger = purger(&[]);

        assert!(purger.keeps("p.lead", &names));
        assert!(purger.keeps(".missing, .lead", &names));
        assert!(!purger.keeps(".missing", &names));
        assert!(purger.keeps("body", &names));
        assert!(purger.keeps("a[href$=\".pdf\"]", &names));
        assert!(purger.keeps(".lead:not(.other)", &names));
    }

    #[test]
    fn test_ignore_rules() {
        let names = UsedNames::default();
        let purger = purger(&[".is-active", "/^\\.menu/"]);

        assert!(purger.keeps(".is-active", &names));
        assert!(purger.keeps(".menu-item > a", &names));
        assert!(!purger.keeps(".other", &names));
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        assert!(IgnoreRule::parse("/[/").is_err());
    }

    #[test]
    fn test_purge_rules_in_stylesheet() {
        let css = ".used { color: red } .unused { color: blue } \
                   @media (min-width: 10px) { .gone { color: green } }";
        let mut sheet = StyleSheet::parse(css, ParserOptions::default()).unwrap();
        let names = used(r#"<span class="used"></span>"#);

        let removed = purger(&[]).purge_rules(&mut sheet.rules, &names);
        let out = sheet.to_css(PrinterOptions::default()).unwrap().code;

        assert_eq!(removed, 3);
        assert!(out.contains(".used"));
        assert!(!out.contains(".unused"));
        assert!(!out.contains("@media"));
    }

    #[test]
    fn test_disabled_purger() {
        let options = PurgeOptions::default();
        assert!(Purger::from_options(PathBuf::from("."), &options).unwrap().is_none());
    }

    #[test]
    fn test_collect_from_globs() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/index.php"), r#"<main id="content" class="page">"#)
            .unwrap();

        let options =
            PurgeOptions {
                enabled: true,
                html: vec!["src/**/*.php".to_string()],
                ..Default::default()
            };
        let purger = Purger::from_options(temp.path().to_path_buf(), &options).unwrap().unwrap();
        let names = purger.collect().unwrap();

        assert!(names.ids.contains("content"));
        assert!(names.classes.contains("page"));
    }
}
