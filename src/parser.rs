//! Text helpers: markdown to HTML, markdown to plain text, escaping and
//! slugs.
//!
//! Markdown goes through `pulldown-cmark` with the plain CommonMark
//! options (headings, paragraphs, lists, emphasis, links). Inline or block
//! HTML written by content authors is escaped rather than passed through.

use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::OnceLock;

/// Renders a block or post body to an HTML fragment.
pub fn render_markdown(md: &str) -> String {
    let parser = Parser::new_ext(md, Options::ENABLE_STRIKETHROUGH);

    let events = parser.map(|event| match event {
        // Authors write text, not markup
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, events);
    html_output
}

/// Strips Markdown syntax to produce clean plain text for search indexing.
pub fn strip_markdown(md: &str) -> String {
    let parser = Parser::new(md);
    let mut plain_text = String::new();

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => {
                plain_text.push_str(&text);
                plain_text.push(' ');
            }
            Event::SoftBreak | Event::HardBreak => plain_text.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&plain_text)
}

/// Text of the first heading of any level.
pub fn first_heading(md: &str) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();

    for event in Parser::new(md) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                in_heading = true;
            }
            Event::End(TagEnd::Heading(_)) if in_heading => {
                let t = collapse_whitespace(&text);
                return (!t.is_empty()).then_some(t);
            }
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Plain text of the first paragraph, cut at `max` characters on a word
/// boundary.
pub fn teaser(md: &str, max: usize) -> String {
    let mut in_para = false;
    let mut text = String::new();

    for event in Parser::new(md) {
        match event {
            Event::Start(Tag::Paragraph) => in_para = true,
            Event::End(TagEnd::Paragraph) if in_para => break,
            Event::Text(t) | Event::Code(t) if in_para => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_para => text.push(' '),
            _ => {}
        }
    }
    truncate_words(&collapse_whitespace(&text), max)
}

fn truncate_words(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    let cut = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end_matches(|c: char| c.is_ascii_punctuation()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// HTML escaping for text and attribute values. Used as the template
/// engine's escape function, so `/` stays readable in URLs.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Values of every `href`/`src` attribute in document order, as written.
/// Quoted and unquoted values are both accepted, since minified output
/// drops the quotes where it can.
pub fn link_targets(html: &str) -> Vec<&str> {
    static ATTR: OnceLock<Regex> = OnceLock::new();
    let attr = ATTR.get_or_init(|| {
        Regex::new(r#"(?i)\s(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("valid regex")
    });

    attr.captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
        .collect()
}

/// `"Open Lab Day 2025!"` → `"open-lab-day-2025"`. Never empty.
pub fn slugify(text: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s_-]").expect("valid regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"[\s_]+").expect("valid regex"));

    let cleaned = strip.replace_all(text, "");
    let slug = spaces.replace_all(cleaned.trim(), "-").to_lowercase();
    if slug.is_empty() { "post".to_string() } else { slug }
}

/// `"research-groups"` → `"Research Groups"`.
pub fn title_case(slug: &str) -> String {
    slug.split(['-', '_', '/'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
