//! Style guide page: Markdown sections rendered through an HTML template.
//!
//! The source is split into sections on `---` lines (outside code fences).
//! Each section becomes `{ title, anchor, body }` in the template context
//! under `sections`. Fenced `html` blocks are emitted twice: once as a live
//! example and once as escaped code.

use super::{write_output, Task, TaskError, TaskOutput};
use pulldown_cmark_escape::escape_html;
use pulldown_cmark::{html::push_html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Tera};

/// One rendered section of the style guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub title: String,
    pub anchor: String,
    pub body: String,
}

/// Renders the style guide page.
#[derive(Debug, Clone)]
pub struct StyleGuide {
    source: PathBuf,
    template: PathBuf,
    output: PathBuf,
}

impl StyleGuide {
    pub fn new(source: PathBuf, template: PathBuf, output: PathBuf) -> Self {
        Self { source, template, output }
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed into single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_hyphen = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen {
            slug.push('-');
            prev_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Split Markdown on `---` separator lines that are not inside a code fence.
pub fn split_sections(markdown: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut fence: Option<&str> = None;

    for line in markdown.lines() {
        let trimmed = line.trim();
        match fence {
            Some(marker) if trimmed.starts_with(marker) => fence = None,
            Some(_) => {}
            None if trimmed.starts_with("```") => fence = Some("```"),
            None if trimmed.starts_with("~~~") => fence = Some("~~~"),
            None if trimmed == "---" => {
                sections.push(std::mem::take(&mut current));
                continue;
            }
            None => {}
        }
        current.push_str(line);
        current.push('\n');
    }
    sections.push(current);

    sections.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

/// Render one section, pulling its first heading out as the title.
fn render_section(markdown: &str) -> Section {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);

    let mut title: Option<String> = None;
    let mut in_heading = false;
    let mut heading_text = String::new();
    let mut example: Option<String> = None;
    let mut events: Vec<Event<'_>> = Vec::new();

    for event in parser {
        match &event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang)))
                if lang.split_whitespace().next() == Some("html") =>
            {
                example = Some(String::new());
            }
            Event::Text(text) if example.is_some() => {
                if let Some(code) = example.as_mut() {
                    code.push_str(text);
                }
            }
            Event::End(TagEnd::CodeBlock) if example.is_some() => {
                let code = example.take().unwrap_or_default();
                let mut html = format!("<div class=\"docs-code-live\">\n{}</div>\n", code);
                html.push_str("<pre><code class=\"language-html\">");
                // Writing into a String cannot fail.
                let _ = escape_html(&mut html, &code);
                html.push_str("</code></pre>\n");
                events.push(Event::Html(html.into()));
            }
            Event::Start(Tag::Heading { .. }) => {
                in_heading = title.is_none();
                events.push(event);
            }
            Event::End(TagEnd::Heading(_)) if in_heading => {
                in_heading = false;
                title = Some(std::mem::take(&mut heading_text));
                events.push(event);
            }
            Event::Text(text) | Event::Code(text) if in_heading => {
                heading_text.push_str(text);
                events.push(event);
            }
            _ => events.push(event),
        }
    }

    let mut body = String::new();
    push_html(&mut body, events.into_iter());

    let title = title.unwrap_or_default();
    Section { anchor: slugify(&title), title, body }
}

/// Render the full page from Markdown and template source.
pub fn render(markdown: &str, template: &str) -> Result<String, TaskError> {
    let sections: Vec<Section> =
        split_sections(markdown).iter().map(|s| render_section(s)).collect();

    let mut context = Context::new();
    context.insert("sections", &sections);
    Tera::one_off(template, &context, false).map_err(|e| {
        let mut message = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
        TaskError::Render(message)
    })
}

impl Task for StyleGuide {
    fn name(&self) -> &str {
        "styleguide"
    }

    fn run(&self) -> Result<TaskOutput, TaskError> {
        for input in [&self.source, &self.template] {
            if !input.is_file() {
                return Err(TaskError::MissingInput(input.clone()));
            }
        }
        let markdown = fs::read_to_string(&self.source).map_err(TaskError::io(&self.source))?;
        let template = fs::read_to_string(&self.template).map_err(TaskError::io(&self.template))?;

        let html = render(&markdown, &template)?;
        write_output(&self.output, html)?;
        tracing::debug!(path = %self.output.display(), "wrote style guide");
        Ok(TaskOutput::with_outputs(vec![self.output.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEMPLATE: &str = "<nav>{% for s in sections %}\
         <a href=\"#{{ s.anchor }}\">{{ s.title }}</a>{% endfor %}</nav>\
         {% for s in sections %}<section id=\"{{ s.anchor }}\">{{ s.body }}</section>{% endfor %}";

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Buttons & Links"), "buttons-links");
        assert_eq!(slugify("  Grid (v2) "), "grid-v2");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_split_sections_ignores_rules_in_fences() {
        let md = "# Colors\ntext\n---\n# Type\n```\n---\n```\n";
        let sections = split_sections(md);

        assert_eq!(sections.len(), 2);
        assert!(sections[1].contains("```\n---\n```"));
    }

    #[test]
    fn test_render_section_title_and_live_example() {
        let section =
            render_section("## Buttons\n\n```html\n<button class=\"btn\">Go</button>\n```\n");

        assert_eq!(section.title, "Buttons");
        assert_eq!(section.anchor, "buttons");
        assert!(section
            .body
            .contains("<div class=\"docs-code-live\">\n<button class=\"btn\">Go</button>"));
        assert!(section.body.contains("&lt;button class=&quot;btn&quot;&gt;"));
    }

    #[test]
    fn test_non_html_fence_is_plain_code() {
        let section = render_section("# Sass\n\n```scss\n.a { b: c; }\n```\n");
        assert!(!section.body.contains("docs-code-live"));
        assert!(section.body.contains("<pre><code class=\"language-scss\">"));
    }

    #[test]
    fn test_run_writes_page() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("index.md");
        let template = temp.path().join("template.html");
        fs::write(&source, "# Colors\nRed.\n---\n# Buttons\nClick.\n").unwrap();
        fs::write(&template, TEMPLATE).unwrap();

        let output = temp.path().join("dist/styleguide.html");
        StyleGuide::new(source, template, output.clone()).run().unwrap();

        let html = fs::read_to_string(output).unwrap();
        assert!(html.contains("<a href=\"#colors\">Colors</a><a href=\"#buttons\">Buttons</a>"));
        assert!(html.contains("<section id=\"buttons\"><h1>Buttons</h1>"));
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("index.md");
        fs::write(&source, "# Colors\n").unwrap();

        let result =
            StyleGuide::new(source, temp.path().join("nope.html"), temp.path().join("out.html"))
            .run();
        assert!(matches!(result, Err(TaskError::MissingInput(_))));
    }

    #[test]
    fn test_template_error_is_render_error() {
        let result = render("# A\n", "{% for s in %}");
        assert!(matches!(result, Err(TaskError::Render(_))));
    }
}
