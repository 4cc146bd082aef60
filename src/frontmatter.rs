use crate::models::{Block, Post};
use crate::parser;
use std::path::Path;

/// Splits an optional `---` delimited header off a block file and fills in
/// the block title: front matter `title:`, else the first heading, else the
/// block name.
pub fn parse_block(raw: &str, name: &str, source: &Path) -> Block {
    let mut title = None;
    let mut body = raw;

    if raw.starts_with("---") {
        let parts: Vec<&str> = raw.splitn(3, "---").collect();
        if parts.len() == 3 {
            for line in parts[1].lines() {
                if let Some((k, v)) = line.split_once(':') {
                    if k.trim() == "title" {
                        title = Some(v.trim().trim_matches('"').to_string());
                    }
                }
            }
            body = parts[2];
        }
    }

    let body = body.trim().to_string();
    let title = title
        .filter(|t| !t.is_empty())
        .or_else(|| parser::first_heading(&body))
        .unwrap_or_else(|| name.to_string());

    Block {
        name: name.to_string(),
        title,
        body,
        source: source.to_path_buf(),
    }
}

/// Parses a blog post file.
///
/// ```text
/// Title: Open lab day
/// Date: 2025-03-14
///
/// Body text in markdown...
/// ```
///
/// The header ends at the first blank line or at a `Body:` line. A file
/// that does not start with a header is all body.
pub fn parse_post(raw: &str, slug: &str, fallback_title: &str, fallback_date: &str, source: &Path) -> Post {
    let mut title = String::new();
    let mut date = String::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_body = !starts_with_header(raw);

    // blank lines before the header do not end it
    for line in raw.lines().skip_while(|l| l.trim().is_empty()) {
        if in_body {
            body_lines.push(line);
            continue;
        }
        if line.trim().is_empty() {
            in_body = true;
        } else if let Some(v) = line.strip_prefix("Title:") {
            title = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("Date:") {
            date = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("Body:") {
            in_body = true;
            if !v.trim().is_empty() {
                body_lines.push(v.trim_start());
            }
        }
    }

    if title.is_empty() {
        title = fallback_title.to_string();
    }
    if date.is_empty() {
        date = fallback_date.to_string();
    }

    Post {
        slug: slug.to_string(),
        title,
        date,
        body: body_lines.join("\n").trim().to_string(),
        source: source.to_path_buf(),
    }
}

fn starts_with_header(raw: &str) -> bool {
    raw.lines()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| ["Title:", "Date:", "Body:"].iter().any(|k| l.starts_with(k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_title_from_front_matter() {
        let b = parse_block("---\ntitle: \"Our Team\"\n---\n# People\n\nText", "team", Path::new("team.md"));
        assert_eq!(b.title, "Our Team");
        assert_eq!(b.body, "# People\n\nText");
    }

    #[test]
    fn block_title_from_first_heading_then_name() {
        let b = parse_block("Intro\n\n## Research *threads*\n", "research", Path::new("r.md"));
        assert_eq!(b.title, "Research threads");
        let b = parse_block("Just text.", "plain", Path::new("p.md"));
        assert_eq!(b.title, "plain");
    }

    #[test]
    fn post_header_and_body() {
        let raw = "Title: Open lab day\nDate: 2025-03-14\n\nFirst paragraph.\n\nSecond.";
        let p = parse_post(raw, "open-lab", "open-lab", "2000-01-01", Path::new("open-lab.txt"));
        assert_eq!(p.title, "Open lab day");
        assert_eq!(p.date, "2025-03-14");
        assert_eq!(p.body, "First paragraph.\n\nSecond.");
    }

    #[test]
    fn post_header_after_blank_lines() {
        let raw = "\n  \nTitle: Late start\nDate: 2025-01-01\n\nBody text.";
        let p = parse_post(raw, "late", "Fallback", "2020-01-01", Path::new("late.txt"));
        assert_eq!(p.title, "Late start");
        assert_eq!(p.date, "2025-01-01");
        assert_eq!(p.body, "Body text.");
    }

    #[test]
    fn post_body_marker_and_fallbacks() {
        let raw = "Title: Notes\nBody: starts here\nand continues";
        let p = parse_post(raw, "notes", "notes", "2024-12-01", Path::new("notes.txt"));
        assert_eq!(p.date, "2024-12-01");
        assert_eq!(p.body, "starts here\nand continues");

        let p = parse_post("No header at all.\n", "bare", "bare", "2024-01-02", Path::new("bare.txt"));
        assert_eq!(p.title, "bare");
        assert_eq!(p.body, "No header at all.");
    }
}
