//! The build pipeline for `alisite`.
//!
//! Load, render, write. Each stage receives the configuration by reference
//! and returns a typed error; the first error aborts the build before the
//! output directory is touched.

use crate::{
    config::{Config, SiteSettings},
    loader,
    models::Template,
    render::Renderer,
    term,
    writer,
};
use std::time::{Duration, Instant};

const STEPS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct BuildReport {
    pub pages: usize,
    pub posts: usize,
    pub files: usize,
    pub elapsed: Duration,
}

/// Runs one full build of `config.content_dir` into `config.output_dir`.
pub fn perform_build(config: &Config, verbose: bool) -> anyhow::Result<BuildReport> {
    let start = Instant::now();

    // --- STEP 1: CONTENT INGESTION ---
    term::step(verbose, 1, STEPS, "Loading content...");
    let settings = SiteSettings::load(&config.content_dir.join("site.json"))?;
    let content = loader::load_content(&config.content_dir)?;
    term::detail(
        verbose,
        "loaded",
        format!(
            "{} pages, {} blocks, {} links, {} posts",
            content.pages.len(),
            content.blocks.len(),
            content.links.len(),
            content.posts.len()
        ),
    );

    if !content.posts.is_empty() && !content.pages.iter().any(|p| p.template == Template::Blog) {
        term::warn("blog posts exist but no page uses the `blog` template; posts are not listed anywhere");
    }

    // --- STEP 2: RENDERING ---
    term::step(verbose, 2, STEPS, "Rendering pages and posts...");
    let renderer = Renderer::new(&config.templates_dir)?;
    let site = renderer.render_site(&content, &settings, &config.build)?;
    for page in &site.pages {
        term::detail(verbose, "rendered", page.path.display());
    }

    // --- STEP 3: OUTPUT ---
    term::step(verbose, 3, STEPS, "Writing output...");
    let report = writer::write_site(&config.output_dir, &site, &config.media_dir())?;
    term::detail(
        verbose,
        "assets",
        format!("{} theme files, {} media files", report.assets.theme_files, report.assets.media_files),
    );

    // --- STEP 4: ASSET REFERENCES ---
    term::step(verbose, 4, STEPS, "Checking asset references...");
    for page in &site.pages {
        for asset in &page.assets {
            if !config.output_dir.join(asset).is_file() {
                term::warn(format!("{} references missing asset {}", page.path.display(), asset));
            }
        }
    }

    Ok(BuildReport {
        pages: content.pages.len(),
        posts: content.posts.len(),
        files: report.pages + report.files,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{LoadError, RenderError},
        verify,
    };
    use std::{
        collections::BTreeMap,
        fs,
        path::{Path, PathBuf},
    };
    use tempfile::TempDir;
    use walkdir::WalkDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(pages_csv: &str) -> (TempDir, Config) {
        let root = TempDir::new().unwrap();
        let content = root.path().join("content");
        write(&content, "site.json", r#"{"site_name": "Artificial Life Institute"}"#);
        write(&content, "pages.csv", pages_csv);
        write(&content, "links.csv", "label,url,category\nGitHub,https://github.com/ali,presence\n");
        write(&content, "blocks/welcome.md", "# Hi");
        write(&content, "blocks/team.md", "# Team");
        write(&content, "blog/first.txt", "Title: First\nDate: 2024-05-01\n\nOld news.");
        write(&content, "blog/second.txt", "Title: Second\nDate: 2025-01-10\n\nNew news.");

        let config = Config {
            content_dir: content,
            output_dir: root.path().join("site"),
            templates_dir: root.path().join("templates"),
            ..Config::default()
        };
        (root, config)
    }

    const PAGES: &str = "slug,title,blocks,hero_image\n\
                         ,Home,welcome,\n\
                         about,About Us,\"welcome,team\",\n\
                         blog,News,,\n";

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().strip_prefix(dir).unwrap().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect()
    }

    #[test]
    fn builds_one_file_per_page_and_post() {
        let (_root, config) = project(PAGES);
        let report = perform_build(&config, false).unwrap();
        assert_eq!(report.pages, 3);
        assert_eq!(report.posts, 2);

        let out = &config.output_dir;
        for file in ["index.html", "about.html", "blog.html", "blog/first.html", "blog/second.html", "search.json"] {
            assert!(out.join(file).is_file(), "missing {file}");
        }
        let html_count = snapshot(out).keys().filter(|p| p.extension().is_some_and(|e| e == "html")).count();
        assert_eq!(html_count, 5);
    }

    #[test]
    fn about_page_has_both_headings_in_order() {
        let (_root, config) = project(PAGES);
        perform_build(&config, false).unwrap();
        let html = fs::read_to_string(config.output_dir.join("about.html")).unwrap();
        let hi = html.find("<h1>Hi</h1>").unwrap();
        let team = html.find("<h1>Team</h1>").unwrap();
        assert!(hi < team);
    }

    #[test]
    fn blog_listing_is_newest_first() {
        let (_root, config) = project(PAGES);
        perform_build(&config, false).unwrap();
        let html = fs::read_to_string(config.output_dir.join("blog.html")).unwrap();
        assert!(html.find("blog/second.html").unwrap() < html.find("blog/first.html").unwrap());
    }

    #[test]
    fn rebuilding_is_byte_identical() {
        let (_root, config) = project(PAGES);
        perform_build(&config, false).unwrap();
        let first = snapshot(&config.output_dir);
        perform_build(&config, false).unwrap();
        assert_eq!(first, snapshot(&config.output_dir));
    }

    #[test]
    fn removed_page_disappears_on_rebuild() {
        let (_root, config) = project(PAGES);
        perform_build(&config, false).unwrap();
        assert!(config.output_dir.join("about.html").exists());

        fs::write(config.content_dir.join("pages.csv"), "slug,title,blocks\n,Home,welcome\n").unwrap();
        perform_build(&config, false).unwrap();
        assert!(!config.output_dir.join("about.html").exists());
        assert!(config.output_dir.join("index.html").exists());
    }

    #[test]
    fn unknown_block_fails_and_keeps_previous_output() {
        let (_root, config) = project(PAGES);
        perform_build(&config, false).unwrap();
        let before = snapshot(&config.output_dir);

        fs::write(config.content_dir.join("pages.csv"), "slug,title,blocks\nabout,About,\"welcome,ghost\"\n").unwrap();
        let err = perform_build(&config, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::MissingBlock { block, .. }) if block == "ghost"
        ));
        assert!(err.to_string().contains("ghost"));
        assert_eq!(before, snapshot(&config.output_dir));
    }

    #[test]
    fn missing_pages_table_is_a_load_error() {
        let (_root, config) = project(PAGES);
        fs::remove_file(config.content_dir.join("pages.csv")).unwrap();
        let err = perform_build(&config, false).unwrap_err();
        assert!(matches!(err.downcast_ref::<LoadError>(), Some(LoadError::Missing { .. })));
        assert!(!config.output_dir.exists());
    }

    #[test]
    fn minified_output_still_verifies() {
        let (_root, mut config) = project(PAGES);
        config.build.minify_html = true;
        write(&config.content_dir, "blocks/team.md", "# Team\n\n[gone](missing.html)");
        perform_build(&config, false).unwrap();

        let about = fs::read_to_string(config.output_dir.join("about.html")).unwrap();
        assert!(about.contains("missing.html"));
        let broken = verify::verify_site(&config.output_dir, &verify::VerifyOptions { probe: None, workers: 1 }).unwrap();
        assert_eq!(broken.len(), 1, "{broken:?}");
        assert_eq!(broken[0].source, "about.html");
        assert_eq!(broken[0].link, "missing.html");
    }

    #[test]
    fn project_templates_override_builtins() {
        let (root, config) = project(PAGES);
        write(root.path(), "templates/post.html", "<article>{{ post.title }}</article>");
        perform_build(&config, false).unwrap();
        let html = fs::read_to_string(config.output_dir.join("blog/second.html")).unwrap();
        assert_eq!(html, "<article>Second</article>");
    }
}
