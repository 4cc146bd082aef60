//! The renderer: turns a loaded [`SiteContent`] into finished documents.
//!
//! Pages render in declared order through the `page.html` template, posts
//! through `post.html`; both extend `base.html`, the site shell with the
//! navigation and footer. Built-in templates are embedded in the binary and
//! a project's `templates/` directory can override any of them by name.
//!
//! Nothing here touches the output directory. The result is a
//! [`RenderedSite`] that the writer stages and swaps into place.

use crate::{
    config::{BuildSettings, SiteSettings},
    error::RenderError,
    models::{
        GeneratedFile, PageDef, Post, RenderedPage, RenderedSite, SiteContent, Template,
    },
    parser, rss,
};
use minify_html::{minify, Cfg};
use rust_embed::RustEmbed;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tera::{Context, Tera};
use walkdir::WalkDir;

#[derive(RustEmbed)]
#[folder = "assets/templates/"]
struct BuiltinTemplates;

const DEFAULT_HERO: &str = "placeholder-hero.svg";
const TEASER_CHARS: usize = 160;

#[derive(Serialize)]
struct NavItem {
    title: String,
    href: String,
    active: bool,
}

#[derive(Serialize)]
struct PageView<'a> {
    slug: &'a str,
    title: &'a str,
    is_home: bool,
    template: Template,
}

#[derive(Serialize)]
struct BlockView<'a> {
    name: &'a str,
    title: &'a str,
    html: String,
}

#[derive(Serialize)]
struct Card {
    title: String,
    href: String,
    teaser: String,
}

#[derive(Serialize)]
struct PostCard<'a> {
    title: &'a str,
    date: &'a str,
    href: String,
    teaser: String,
}

#[derive(Serialize)]
struct LinkView<'a> {
    label: &'a str,
    url: &'a str,
    category: &'a str,
}

/// One entry of `search.json`.
#[derive(Serialize)]
struct SearchEntry {
    title: String,
    url: String,
    content: String,
}

/// Values every document needs, computed once per build.
struct Shared<'a> {
    content: &'a SiteContent,
    settings: &'a SiteSettings,
    build: &'a BuildSettings,
    /// (slug, title, output path) of every navigable page, in declared order.
    nav: Vec<(&'a str, &'a str, String)>,
    legal: Vec<(&'a str, String)>,
    contact: Option<String>,
    /// Slug and output path of the page listing the posts.
    blog: Option<(&'a str, String)>,
    has_feed: bool,
}

impl<'a> Shared<'a> {
    fn new(content: &'a SiteContent, settings: &'a SiteSettings, build: &'a BuildSettings) -> Self {
        let mut nav = Vec::new();
        let mut legal = Vec::new();
        for page in &content.pages {
            let path = url_path(&page.output_path());
            if settings.is_footer_page(&page.slug) {
                legal.push((page.title.as_str(), path));
            } else {
                nav.push((page.slug.as_str(), page.title.as_str(), path));
            }
        }

        let first_with = move |template: Template| content.pages.iter().find(|p| p.template == template);

        Shared {
            content,
            settings,
            build,
            nav,
            legal,
            contact: first_with(Template::Contact).map(|p| url_path(&p.output_path())),
            blog: first_with(Template::Blog).map(|p| (p.slug.as_str(), url_path(&p.output_path()))),
            has_feed: build.generate_rss && settings.base_url().is_some() && !content.posts.is_empty(),
        }
    }
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Loads the built-in templates, replaced by same-named files found in
    /// `override_dir` (if it exists).
    pub fn new(override_dir: &Path) -> Result<Renderer, RenderError> {
        let mut sources: BTreeMap<String, String> = BTreeMap::new();

        for name in BuiltinTemplates::iter() {
            if let Some(file) = BuiltinTemplates::get(name.as_ref()) {
                sources.insert(name.to_string(), String::from_utf8_lossy(&file.data).into_owned());
            }
        }

        if override_dir.is_dir() {
            for entry in WalkDir::new(override_dir).sort_by_file_name() {
                let entry = entry.map_err(|e| RenderError::TemplateRead {
                    path: override_dir.to_path_buf(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry.path().strip_prefix(override_dir).unwrap_or(entry.path());
                let raw = fs::read_to_string(entry.path()).map_err(|source| {
                    RenderError::TemplateRead { path: entry.path().to_path_buf(), source }
                })?;
                sources.insert(url_path(rel), raw);
            }
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|source| RenderError::Template { template: "templates".to_string(), source })?;
        tera.set_escape_fn(parser::escape_html);
        Ok(Renderer { tera })
    }

    /// Renders every page, every post and the generated side files.
    pub fn render_site(
        &self,
        content: &SiteContent,
        settings: &SiteSettings,
        build: &BuildSettings,
    ) -> Result<RenderedSite, RenderError> {
        let shared = Shared::new(content, settings, build);
        let mut site = RenderedSite::default();
        let mut search = Vec::new();
        // output path -> what produced it
        let mut claimed: BTreeMap<PathBuf, String> = BTreeMap::new();

        for page in &content.pages {
            claim(&mut claimed, page.output_path(), format!("page `{}`", display_slug(&page.slug)))?;
            let (doc, text) = self.render_page(page, &shared)?;
            search.push(SearchEntry {
                title: page.title.clone(),
                url: url_path(&doc.path),
                content: text,
            });
            site.pages.push(doc);
        }

        for post in &content.posts {
            claim(&mut claimed, post_path(post), format!("post {}", post.source.display()))?;
            let doc = self.render_post(post, &shared)?;
            search.push(SearchEntry {
                title: post.title.clone(),
                url: url_path(&doc.path),
                content: parser::strip_markdown(&post.body),
            });
            site.pages.push(doc);
        }

        if build.generate_search {
            site.files.push(GeneratedFile {
                path: PathBuf::from("search.json"),
                contents: serde_json::to_string(&search)?,
            });
        }

        if shared.has_feed {
            if let Some(base_url) = settings.base_url() {
                site.files.push(GeneratedFile {
                    path: PathBuf::from("feed.xml"),
                    contents: rss::generate_rss(&content.posts, settings, &base_url),
                });
            }
        }

        Ok(site)
    }

    /// Renders one page and returns it with its plain text for the search index.
    fn render_page(&self, page: &PageDef, shared: &Shared) -> Result<(RenderedPage, String), RenderError> {
        let content = shared.content;
        let settings = shared.settings;
        let path = page.output_path();
        let root = root_prefix(&path);

        let mut blocks = Vec::with_capacity(page.blocks.len());
        let mut text = Vec::new();
        for name in &page.blocks {
            let block = content.blocks.get(name).ok_or_else(|| RenderError::MissingBlock {
                page: display_slug(&page.slug),
                block: name.clone(),
            })?;
            text.push(parser::strip_markdown(&block.body));
            blocks.push(BlockView {
                name: &block.name,
                title: &block.title,
                html: parser::render_markdown(&block.body),
            });
        }

        let layout = if page.is_home() { settings.layout_variant.as_str() } else { "standard" };

        // Overview cards on a standard home page
        let cards: Vec<Card> = if page.is_home() && layout == "standard" {
            content
                .pages
                .iter()
                .filter(|p| !p.is_home() && p.template == Template::Standard)
                .filter(|p| !settings.is_footer_page(&p.slug))
                .map(|p| Card {
                    title: p.title.clone(),
                    href: format!("{}{}", root, url_path(&p.output_path())),
                    teaser: p
                        .blocks
                        .first()
                        .and_then(|b| content.blocks.get(b))
                        .map(|b| parser::teaser(&b.body, TEASER_CHARS))
                        .unwrap_or_default(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let show_links = page.template.lists_links() || layout == "linkhub";
        let links: Vec<LinkView> = if show_links {
            content
                .links
                .iter()
                .map(|l| LinkView { label: &l.label, url: &l.url, category: &l.category })
                .collect()
        } else {
            Vec::new()
        };

        let posts: Vec<PostCard> = if page.template == Template::Blog {
            content.posts.iter().map(|p| post_card(p, &root)).collect()
        } else {
            Vec::new()
        };

        let newsletter = (page.is_home() || page.template == Template::Contact)
            .then(|| newsletter_endpoint(settings, &root))
            .flatten();

        let hero = page.hero_image.as_deref().unwrap_or(DEFAULT_HERO);

        let mut ctx = self.base_context(shared, &path, Some(page.slug.as_str()));
        ctx.insert("title", &page.title);
        ctx.insert(
            "page",
            &PageView {
                slug: &page.slug,
                title: &page.title,
                is_home: page.is_home(),
                template: page.template,
            },
        );
        ctx.insert("layout", layout);
        ctx.insert("hero_image", &format!("{}assets/img/{}", root, hero));
        ctx.insert("blocks", &blocks);
        ctx.insert("cards", &cards);
        ctx.insert("show_links", &show_links);
        ctx.insert("links", &links);
        ctx.insert("show_posts", &(page.template == Template::Blog));
        ctx.insert("posts", &posts);
        ctx.insert("newsletter", &newsletter);

        let html = self.render_template("page.html", &ctx)?;
        Ok((finish_document(path, html, shared.build.minify_html), text.join(" ")))
    }

    fn render_post(&self, post: &Post, shared: &Shared) -> Result<RenderedPage, RenderError> {
        let path = post_path(post);
        let root = root_prefix(&path);
        let back = shared.blog.as_ref().map_or("index.html", |(_, path)| path.as_str());

        let mut ctx = self.base_context(shared, &path, shared.blog.as_ref().map(|(slug, _)| *slug));
        ctx.insert("title", &post.title);
        ctx.insert("post", post);
        ctx.insert("body", &parser::render_markdown(&post.body));
        ctx.insert("back_href", &format!("{}{}", root, back));

        let html = self.render_template("post.html", &ctx)?;
        Ok(finish_document(path, html, shared.build.minify_html))
    }

    /// Shell values: navigation, footer and feature switches, with every
    /// href made relative to `current`.
    fn base_context(&self, shared: &Shared, current: &Path, active: Option<&str>) -> Context {
        let settings = shared.settings;
        let root = root_prefix(current);
        let href = |target: &str| format!("{}{}", root, target);

        let nav: Vec<NavItem> = shared
            .nav
            .iter()
            .map(|(slug, title, path)| NavItem {
                title: title.to_string(),
                href: href(path.as_str()),
                active: active == Some(*slug),
            })
            .collect();

        let legal: Vec<NavItem> = shared
            .legal
            .iter()
            .map(|(title, path)| NavItem {
                title: title.to_string(),
                href: href(path.as_str()),
                active: false,
            })
            .collect();

        let presence: Vec<LinkView> = shared
            .content
            .links
            .iter()
            .filter(|l| l.category.is_empty() || l.category == "presence")
            .map(|l| LinkView { label: &l.label, url: &l.url, category: &l.category })
            .collect();

        let mut ctx = Context::new();
        ctx.insert("site", settings);
        ctx.insert("root", &root);
        ctx.insert("nav", &nav);
        ctx.insert("legal", &legal);
        ctx.insert("presence_links", &presence);
        ctx.insert("contact_href", &shared.contact.as_deref().map(href));
        ctx.insert("domain_url", &settings.base_url());
        ctx.insert("has_search", &shared.build.generate_search);
        ctx.insert("has_feed", &shared.has_feed);
        ctx
    }

    fn render_template(&self, name: &str, ctx: &Context) -> Result<String, RenderError> {
        self.tera
            .render(name, ctx)
            .map_err(|source| RenderError::Template { template: name.to_string(), source })
    }
}

fn post_card<'a>(post: &'a Post, root: &str) -> PostCard<'a> {
    PostCard {
        title: &post.title,
        date: &post.date,
        href: format!("{}{}", root, url_path(&post_path(post))),
        teaser: parser::teaser(&post.body, TEASER_CHARS),
    }
}

pub fn post_path(post: &Post) -> PathBuf {
    PathBuf::from("blog").join(format!("{}.html", post.slug))
}

fn newsletter_endpoint(settings: &SiteSettings, root: &str) -> Option<String> {
    let provider = settings.newsletter_provider_url.trim();
    match settings.newsletter_mode.as_str() {
        "off" => None,
        "local" => Some(format!("{}subscribe.php", root)),
        _ if provider.is_empty() => Some(format!("{}subscribe.php", root)),
        _ => Some(provider.to_string()),
    }
}

fn display_slug(slug: &str) -> String {
    if slug.is_empty() { "(home)".to_string() } else { slug.to_string() }
}

/// `a/b/c.html` → `"../../"`.
pub fn root_prefix(path: &Path) -> String {
    let depth = path.components().count().saturating_sub(1);
    "../".repeat(depth)
}

/// A relative path with `/` separators, as used in URLs.
pub fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Minifies HTML when asked to.
///
/// Uses `minify-html`, configured to keep the document valid.
fn process_html(html: String, should_minify: bool) -> String {
    if !should_minify {
        return html;
    }

    let mut cfg = Cfg::new();
    cfg.minify_js = true;
    cfg.minify_css = true;
    cfg.keep_comments = false;

    let minified = minify(html.as_bytes(), &cfg);
    String::from_utf8(minified).unwrap_or(html)
}

fn finish_document(path: PathBuf, html: String, should_minify: bool) -> RenderedPage {
    let html = process_html(html, should_minify);
    let assets = referenced_assets(&html);
    RenderedPage { path, html, assets }
}

fn claim(claimed: &mut BTreeMap<PathBuf, String>, path: PathBuf, owner: String) -> Result<(), RenderError> {
    match claimed.get(&path) {
        Some(first) => Err(RenderError::PathCollision { path, first: first.clone(), second: owner }),
        None => {
            claimed.insert(path, owner);
            Ok(())
        }
    }
}

/// Local `assets/...` references of a document, relative to the output root.
pub fn referenced_assets(html: &str) -> Vec<String> {
    let mut assets: Vec<String> = parser::link_targets(html)
        .into_iter()
        .filter_map(|mut target| {
            while let Some(rest) = target.strip_prefix("../") {
                target = rest;
            }
            target.starts_with("assets/").then(|| target.to_string())
        })
        .collect();
    assets.sort();
    assets.dedup();
    assets
}
