//! Markdown rendering for card content
//!
//! Card bodies are written in Markdown and rendered to HTML once, on save.
//! Readers get the stored HTML and never pay for parsing.
//!
//! # Example
//!
//! ```
//! use cardfinder::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("## Rewards\n\n**5x** points on travel.");
//! assert!(html.contains("<h2>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Stateless Markdown to HTML renderer
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Renderer with tables, strikethrough, task lists and smart punctuation
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        Self { options }
    }

    /// Render Markdown to HTML. Blank input renders to an empty string.
    pub fn render(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }

        let parser = Parser::new_ext(markdown, self.options);
        let events = process_events(parser);

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events.into_iter());
        output
    }
}

/// Collapse fenced code blocks into a single `<pre><code>` element tagged
/// with the language class, leaving every other event untouched.
fn process_events(parser: Parser<'_>) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                code = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, body)) = code.take() {
                    events.push(Event::Html(code_block(lang.as_deref(), &body).into()));
                }
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(&text);
                }
            }
            other => events.push(other),
        }
    }

    events
}

fn code_block(lang: Option<&str>, body: &str) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            html_escape(body)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(body)),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_heading_and_emphasis() {
        let html = MarkdownRenderer::new().render("# Gold Card\n\nEarn *more* with **every** swipe.");
        assert!(html.contains("<h1>Gold Card</h1>"));
        assert!(html.contains("<em>more</em>"));
        assert!(html.contains("<strong>every</strong>"));
    }

    #[test]
    fn test_render_empty_input() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.render(""), "");
        assert_eq!(renderer.render("   \n"), "");
    }

    #[test]
    fn test_render_list() {
        let html = MarkdownRenderer::new().render("- Lounge access\n- Fuel waiver");
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>Lounge access</li>"));
    }

    #[test]
    fn test_render_table() {
        let html = MarkdownRenderer::new().render("| Fee | Amount |\n|---|---|\n| Annual | 500 |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>500</td>"));
    }

    #[test]
    fn test_code_block_is_escaped() {
        let html = MarkdownRenderer::new().render("```html\n<b>x</b>\n```");
        assert!(html.contains("class=\"language-html\""));
        assert!(html.contains("&lt;b&gt;x&lt;/b&gt;"));
    }

    #[test]
    fn test_indented_code_block_has_no_language() {
        let html = MarkdownRenderer::new().render("    let x = 1;");
        assert!(html.contains("<pre><code>let x = 1;"));
    }

    #[test]
    fn test_smart_punctuation() {
        let html = MarkdownRenderer::new().render("\"quoted\"");
        assert!(html.contains('\u{201c}'));
    }
}
