use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};

/// Layout variant of a page, from the `template` column of `pages.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    Standard,
    /// Also lists blog posts.
    Blog,
    /// Also lists every link entry.
    Links,
    /// Links plus the newsletter form.
    Contact,
}

impl Template {
    /// Parses the template column. An empty value is resolved from the slug.
    pub fn from_column(raw: &str, slug: &str) -> Option<Template> {
        match raw.trim().to_lowercase().as_str() {
            "" => Some(match slug {
                "blog" => Template::Blog,
                "contact" => Template::Contact,
                "links" => Template::Links,
                _ => Template::Standard,
            }),
            "standard" => Some(Template::Standard),
            "blog" => Some(Template::Blog),
            "links" => Some(Template::Links),
            "contact" => Some(Template::Contact),
            _ => None,
        }
    }

    pub fn lists_links(self) -> bool {
        matches!(self, Template::Links | Template::Contact)
    }
}

/// One row of `pages.csv`.
#[derive(Debug, Clone)]
pub struct PageDef {
    /// Normalized slug; empty for the home page.
    pub slug: String,
    pub title: String,
    /// Block names in render order.
    pub blocks: Vec<String>,
    pub hero_image: Option<String>,
    pub template: Template,
}

impl PageDef {
    pub fn is_home(&self) -> bool {
        self.slug.is_empty()
    }

    /// Output path relative to the output root.
    pub fn output_path(&self) -> PathBuf {
        if self.is_home() {
            PathBuf::from("index.html")
        } else {
            PathBuf::from(format!("{}.html", self.slug))
        }
    }
}

/// A named markdown unit, one file per block.
#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub title: String,
    pub body: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LinkEntry {
    pub label: String,
    pub url: String,
    pub category: String,
    pub order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub slug: String,
    pub title: String,
    /// `YYYY-MM-DD` as written in the file (or derived from its mtime).
    pub date: String,
    pub body: String,
    #[serde(skip)]
    pub source: PathBuf,
}

/// Everything the loader produced. Read-only for the rest of the build.
#[derive(Debug, Clone, Default)]
pub struct SiteContent {
    pub pages: Vec<PageDef>,
    pub blocks: BTreeMap<String, Block>,
    pub links: Vec<LinkEntry>,
    /// Newest first.
    pub posts: Vec<Post>,
}

/// A finished document plus the local assets it points at.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Relative to the output root, `/`-separated.
    pub path: PathBuf,
    pub html: String,
    /// `assets/...` references found in the document, sorted and deduplicated.
    pub assets: Vec<String>,
}

/// A non-HTML file produced by the renderer (`search.json`, `feed.xml`).
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Output of the render stage.
#[derive(Debug, Clone, Default)]
pub struct RenderedSite {
    pub pages: Vec<RenderedPage>,
    pub files: Vec<GeneratedFile>,
}
