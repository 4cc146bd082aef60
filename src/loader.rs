//! Content loader: reads the content directory into a [`SiteContent`].
//!
//! Layout below the content root:
//!
//! ```text
//! site.json         optional, see config::SiteSettings
//! pages.csv         required: slug,title,blocks[,hero_image][,template]
//! links.csv         optional: label,url,category[,order]
//! blocks/*.md       one block per file, name = file stem
//! blog/*.txt        one post per file
//! media/**          copied by the asset stage, not read here
//! ```
//!
//! Every failure names the file and, for table rows, the line.

use crate::{
    error::LoadError,
    frontmatter,
    models::{Block, LinkEntry, PageDef, Post, SiteContent, Template},
    parser, term,
};
use chrono::{DateTime, Local, NaiveDate};
use serde::Deserialize;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
};

const BLOCK_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];
const POST_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Deserialize)]
struct PageRow {
    #[serde(alias = "page_slug")]
    slug: String,
    #[serde(default, alias = "page_title")]
    title: String,
    #[serde(default)]
    blocks: String,
    #[serde(default)]
    hero_image: String,
    #[serde(default)]
    template: String,
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    #[serde(default)]
    label: String,
    #[serde(default)]
    url: String,
    #[serde(default, alias = "kind")]
    category: String,
    #[serde(default)]
    order: Option<i64>,
}

/// Loads pages, blocks, links and posts from `root`.
pub fn load_content(root: &Path) -> Result<SiteContent, LoadError> {
    let pages_path = root.join("pages.csv");
    let pages = match read_optional(&pages_path)? {
        Some(raw) => parse_pages(&raw, &pages_path)?,
        None => return Err(LoadError::Missing { path: pages_path }),
    };

    let links_path = root.join("links.csv");
    let links = match read_optional(&links_path)? {
        Some(raw) => parse_links(&raw, &links_path)?,
        None => Vec::new(),
    };

    let blocks = load_blocks(&root.join("blocks"))?;
    let posts = load_posts(&root.join("blog"))?;

    Ok(SiteContent { pages, blocks, links, posts })
}

fn read_optional(path: &Path) -> Result<Option<String>, LoadError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(LoadError::Read { path: path.to_path_buf(), source }),
    }
}

fn csv_reader(raw: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes())
}

/// Maps a csv error onto the row it happened in.
fn row_error(path: &Path, err: csv::Error) -> LoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {} columns, found {}", expected_len, len)
        }
        csv::ErrorKind::Deserialize { err, .. } => err.to_string(),
        _ => err.to_string(),
    };
    LoadError::Row { path: path.to_path_buf(), line, message }
}

fn require_columns(
    rdr: &mut csv::Reader<&[u8]>,
    path: &Path,
    required: &[(&'static str, &'static str)],
) -> Result<csv::StringRecord, LoadError> {
    let headers = rdr.headers().map_err(|e| row_error(path, e))?.clone();
    for (name, alias) in required {
        if !headers.iter().any(|h| h == *name || h == *alias) {
            return Err(LoadError::MissingColumn { path: path.to_path_buf(), column: name });
        }
    }
    Ok(headers)
}

/// Strips surrounding slashes; `index` and `home` mean the home page.
pub fn normalize_slug(raw: &str) -> String {
    let slug = raw.trim().trim_matches('/');
    match slug {
        "" | "index" | "home" => String::new(),
        other => other.to_string(),
    }
}

pub fn parse_pages(raw: &str, path: &Path) -> Result<Vec<PageDef>, LoadError> {
    let mut rdr = csv_reader(raw);
    let headers = require_columns(
        &mut rdr,
        path,
        &[("slug", "page_slug"), ("title", "page_title"), ("blocks", "blocks")],
    )?;

    let mut pages = Vec::new();
    let mut seen: HashMap<String, u64> = HashMap::new();

    for result in rdr.records() {
        let record = result.map_err(|e| row_error(path, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: PageRow = record
            .deserialize(Some(&headers))
            .map_err(|e| row_error(path, e))?;

        let slug = normalize_slug(&row.slug);
        if !slug.is_empty() && slug.split('/').any(|s| matches!(s, "" | "." | "..") || s.contains('\\')) {
            return Err(LoadError::Row {
                path: path.to_path_buf(),
                line,
                message: format!("invalid slug `{}`", row.slug),
            });
        }
        if let Some(first_line) = seen.insert(slug.clone(), line) {
            return Err(LoadError::DuplicateSlug {
                path: path.to_path_buf(),
                slug: if slug.is_empty() { "(home)".to_string() } else { slug },
                line,
                first_line,
            });
        }

        let template = Template::from_column(&row.template, &slug).ok_or_else(|| LoadError::Row {
            path: path.to_path_buf(),
            line,
            message: format!(
                "unknown template `{}` (expected standard, blog, links or contact)",
                row.template
            ),
        })?;

        let title = if !row.title.is_empty() {
            row.title
        } else if slug.is_empty() {
            "Home".to_string()
        } else {
            parser::title_case(&slug)
        };

        let blocks = row
            .blocks
            .split([',', '|'])
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();

        let hero_image = Some(row.hero_image).filter(|h| !h.is_empty());

        pages.push(PageDef { slug, title, blocks, hero_image, template });
    }
    Ok(pages)
}

pub fn parse_links(raw: &str, path: &Path) -> Result<Vec<LinkEntry>, LoadError> {
    let mut rdr = csv_reader(raw);
    let headers = require_columns(&mut rdr, path, &[("label", "label"), ("url", "url")])?;

    let mut links = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| row_error(path, e))?;
        let row: LinkRow = record
            .deserialize(Some(&headers))
            .map_err(|e| row_error(path, e))?;
        if row.label.is_empty() {
            continue;
        }
        links.push(LinkEntry {
            label: row.label,
            url: row.url,
            category: row.category.to_lowercase(),
            order: row.order.unwrap_or(0),
        });
    }
    // Stable: equal orders keep file order
    links.sort_by_key(|l| l.order);
    Ok(links)
}

/// Regular files in `dir` with one of `extensions`, sorted by file name.
/// A missing directory yields nothing.
fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, LoadError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(LoadError::Read { path: dir.to_path_buf(), source }),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Read { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_lowercase().as_str()));
        if wanted && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn load_blocks(dir: &Path) -> Result<BTreeMap<String, Block>, LoadError> {
    let mut blocks: BTreeMap<String, Block> = BTreeMap::new();

    for path in list_files(dir, BLOCK_EXTENSIONS)? {
        let raw = fs::read_to_string(&path)
            .map_err(|source| LoadError::Read { path: path.clone(), source })?;
        let name = file_stem(&path);
        let block = frontmatter::parse_block(&raw, &name, &path);

        if let Some(previous) = blocks.insert(name.clone(), block) {
            term::warn(format!(
                "block `{}` is defined twice; {} replaces {}",
                name,
                path.display(),
                previous.source.display()
            ));
        }
    }
    Ok(blocks)
}

pub fn load_posts(dir: &Path) -> Result<Vec<Post>, LoadError> {
    let mut posts: Vec<Post> = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    for path in list_files(dir, POST_EXTENSIONS)? {
        let raw = fs::read_to_string(&path)
            .map_err(|source| LoadError::Read { path: path.clone(), source })?;
        let stem = file_stem(&path);
        let slug = parser::slugify(&stem);

        if let Some(other) = seen.insert(slug.clone(), path.clone()) {
            return Err(LoadError::DuplicatePost { path, other, slug });
        }

        let fallback_date = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d").to_string())
            .map_err(|source| LoadError::Read { path: path.clone(), source })?;

        let post = frontmatter::parse_post(&raw, &slug, &stem, &fallback_date, &path);
        if parse_date(&post.date).is_none() {
            term::warn(format!(
                "{}: date `{}` is not YYYY-MM-DD, the post is listed last",
                path.display(),
                post.date
            ));
        }
        posts.push(post);
    }

    sort_posts(&mut posts);
    Ok(posts)
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Newest first; undated posts last; ties by slug.
pub fn sort_posts(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        Reverse(parse_date(&a.date))
            .cmp(&Reverse(parse_date(&b.date)))
            .then_with(|| b.date.cmp(&a.date))
            .then_with(|| a.slug.cmp(&b.slug))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn parses_page_rows() {
        let raw = "slug,title,blocks,hero_image\n\
                   about,About Us,\"welcome,team\",\n\
                   /,,hero|intro,lab.jpg\n\
                   blog,News,,\n";
        let pages = parse_pages(raw, Path::new("pages.csv")).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].slug, "about");
        assert_eq!(pages[0].blocks, vec!["welcome", "team"]);
        assert_eq!(pages[0].hero_image, None);
        assert_eq!(pages[0].template, Template::Standard);
        assert!(pages[1].is_home());
        assert_eq!(pages[1].title, "Home");
        assert_eq!(pages[1].blocks, vec!["hero", "intro"]);
        assert_eq!(pages[1].hero_image.as_deref(), Some("lab.jpg"));
        assert_eq!(pages[2].template, Template::Blog);
        assert!(pages[2].blocks.is_empty());
    }

    #[test]
    fn wrong_column_count_names_line() {
        let raw = "slug,title,blocks\nabout,About,welcome\nteam,Team\n";
        let err = parse_pages(raw, Path::new("content/pages.csv")).unwrap_err();
        match &err {
            LoadError::Row { line, .. } => assert_eq!(*line, 3),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("content/pages.csv: line 3"));
    }

    #[test]
    fn duplicate_slug_is_fatal() {
        let raw = "slug,title,blocks\nabout,About,a\nhome,Home,b\n/about/,Again,c\n";
        let err = parse_pages(raw, Path::new("pages.csv")).unwrap_err();
        match err {
            LoadError::DuplicateSlug { slug, line, first_line, .. } => {
                assert_eq!(slug, "about");
                assert_eq!((line, first_line), (4, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_template_is_fatal() {
        let raw = "slug,title,blocks,template\nabout,About,a,gallery\n";
        let err = parse_pages(raw, Path::new("pages.csv")).unwrap_err();
        assert!(err.to_string().contains("unknown template `gallery`"));
    }

    #[test]
    fn slugs_leaving_the_output_are_rejected() {
        for bad in ["../escape", "people/../../x", "a//b", "./about"] {
            let raw = format!("slug,title,blocks\nabout,About,\n{bad},Bad,\n");
            let err = parse_pages(&raw, Path::new("pages.csv")).unwrap_err();
            assert!(matches!(err, LoadError::Row { line: 3, .. }), "{bad}: {err}");
            assert!(err.to_string().contains(bad));
        }
        assert_eq!(parse_pages("slug,title,blocks\npeople/team,Team,\n", Path::new("pages.csv")).unwrap()[0].slug, "people/team");
    }

    #[test]
    fn missing_column_is_reported() {
        let err = parse_pages("slug,title\nabout,About\n", Path::new("pages.csv")).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn { column: "blocks", .. }));
    }

    #[test]
    fn links_skip_blank_labels_and_sort_by_order() {
        let raw = "label,url,category,order\n\
                   Mastodon,https://mastodon.social/@ali,presence,2\n\
                   ,https://nowhere.example,resource,0\n\
                   GitHub,https://github.com/ali,presence,1\n\
                   Reading list,https://example.org/reading,Resource,\n";
        let links = parse_links(raw, Path::new("links.csv")).unwrap();
        let labels: Vec<_> = links.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["Reading list", "GitHub", "Mastodon"]);
        assert_eq!(links[0].category, "resource");
    }

    #[test]
    fn bad_order_names_line() {
        let raw = "label,url,category,order\nA,https://a.example,presence,first\n";
        let err = parse_links(raw, Path::new("links.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Row { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn duplicate_blocks_take_last_loaded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "blocks/team.md", "# Team A");
        write(dir.path(), "blocks/team.txt", "# Team B");
        write(dir.path(), "blocks/notes.pdf", "ignored");
        let blocks = load_blocks(&dir.path().join("blocks")).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks["team"].title, "Team B");
    }

    #[test]
    fn posts_sorted_newest_first() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "blog/a-first.txt", "Title: Old\nDate: 2023-05-01\n\nold");
        write(dir.path(), "blog/b-second.txt", "Title: New\nDate: 2025-01-10\n\nnew");
        write(dir.path(), "blog/c-third.txt", "Title: Middle\nDate: 2024-07-30\n\nmid");
        let posts = load_posts(&dir.path().join("blog")).unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Middle", "Old"]);
        assert_eq!(posts[0].slug, "b-second");
    }

    #[test]
    fn colliding_post_slugs_are_fatal() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "blog/Lab Day.txt", "Title: A\n\nx");
        write(dir.path(), "blog/lab-day.md", "Title: B\n\ny");
        let err = load_posts(&dir.path().join("blog")).unwrap_err();
        assert!(matches!(err, LoadError::DuplicatePost { ref slug, .. } if slug == "lab-day"));
    }

    #[test]
    fn missing_pages_table_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = load_content(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::Missing { .. }));
        assert!(err.to_string().contains("pages.csv"));
    }

    #[test]
    fn optional_sources_may_be_absent() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pages.csv", "slug,title,blocks\nhome,Welcome,\n");
        let content = load_content(dir.path()).unwrap();
        assert_eq!(content.pages.len(), 1);
        assert!(content.links.is_empty());
        assert!(content.blocks.is_empty());
        assert!(content.posts.is_empty());
    }
}
