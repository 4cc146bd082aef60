//! Configuration for the alisite engine.
//!
//! Two layers are read once per run and then passed by reference through
//! every stage:
//!
//! * [`Config`], the optional `alisite.toml` project file: directory layout
//!   and engine switches (build, verify, deploy). A missing file yields the
//!   defaults, so `alisite build` works with no arguments.
//! * [`SiteSettings`], `content/site.json`: the flat mapping of site-wide
//!   values the templates print (name, footer text, domain, ...).

use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

/// The root configuration schema for an alisite project.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // --- Directory Settings ---

    /// Directory holding `site.json`, `pages.csv`, `links.csv`, `blocks/`,
    /// `blog/` and `media/`. Defaults to `./content`.
    #[serde(default = "default_content")]
    pub content_dir: PathBuf,

    /// Target directory for the generated static site.
    /// Defaults to `./site`.
    #[serde(default = "default_output")]
    pub output_dir: PathBuf,

    /// Templates placed here override the built-in ones of the same name.
    #[serde(default = "default_templates")]
    pub templates_dir: PathBuf,

    /// Settings that control the build engine.
    #[serde(default)]
    pub build: BuildSettings,

    /// Settings for `alisite check` and `alisite build --check`.
    #[serde(default)]
    pub verify: VerifySettings,

    /// Remote webspace settings for `alisite deploy`.
    #[serde(default)]
    pub deploy: DeploySettings,
}

/// Flags and options that tune the build process.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuildSettings {
    /// Attempt to minify the final HTML output to save bandwidth.
    #[serde(default = "default_bool_false")]
    pub minify_html: bool,

    /// Whether to generate a `search.json` index for the client-side filter.
    #[serde(default = "default_bool_true")]
    pub generate_search: bool,

    /// Whether to generate `feed.xml`. Needs `domain` in `site.json`.
    #[serde(default = "default_bool_true")]
    pub generate_rss: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerifySettings {
    /// Probe `http(s)://` links over the network.
    #[serde(default = "default_bool_true")]
    pub check_external: bool,

    /// Upper bound for a single external request.
    #[serde(default = "default_verify_timeout")]
    pub timeout_secs: u64,

    /// Size of the worker pool used for external requests.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeploySettings {
    /// Mount point of the remote webspace. Deploying is refused when unset.
    pub remote_dir: Option<PathBuf>,

    /// Where replaced remote output is parked.
    /// Defaults to a `<remote_dir>.quarantine` sibling.
    pub quarantine_dir: Option<PathBuf>,

    /// URL fetched after mirroring. Defaults to `https://<domain>/`.
    pub live_url: Option<String>,

    #[serde(default = "default_deploy_timeout")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content_dir: default_content(),
            output_dir: default_output(),
            templates_dir: default_templates(),
            build: BuildSettings::default(),
            verify: VerifySettings::default(),
            deploy: DeploySettings::default(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify_html: false,
            generate_search: true,
            generate_rss: true,
        }
    }
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            check_external: true,
            timeout_secs: default_verify_timeout(),
            workers: default_workers(),
        }
    }
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            remote_dir: None,
            quarantine_dir: None,
            live_url: None,
            timeout_secs: default_deploy_timeout(),
        }
    }
}

impl Config {
    /// Reads the project file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(anyhow::anyhow!("{}: {}", path.display(), e)),
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.content_dir.join("media")
    }
}

/// Site-wide values from `site.json`.
///
/// Every key is optional. Keys not listed here are kept in `extra` so
/// custom templates can still reach them as `site.extra.<key>`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteSettings {
    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default)]
    pub site_tagline: String,

    #[serde(default = "default_meta_description")]
    pub meta_description: String,

    #[serde(default)]
    pub contact_blurb: String,

    /// Public domain, e.g. `https://artificial-life-institute.univie.ac.at`.
    /// A bare host name is accepted and treated as https.
    #[serde(default)]
    pub domain: String,

    /// `local` posts to `subscribe.php`, `provider` to the provider URL,
    /// `off` hides the form.
    #[serde(default = "default_newsletter_mode")]
    pub newsletter_mode: String,

    #[serde(default)]
    pub newsletter_provider_url: String,

    /// Home page layout: `standard`, `linkhub` or `profile`.
    #[serde(default = "default_layout_variant")]
    pub layout_variant: String,

    #[serde(default)]
    pub footer_note: String,

    #[serde(default)]
    pub address: String,

    #[serde(default = "default_logo_text")]
    pub logo_text: String,

    /// Pages listed in the footer's legal column instead of the navigation.
    #[serde(default = "default_footer_pages")]
    pub footer_pages: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: default_site_name(),
            site_tagline: String::new(),
            meta_description: default_meta_description(),
            contact_blurb: String::new(),
            domain: String::new(),
            newsletter_mode: default_newsletter_mode(),
            newsletter_provider_url: String::new(),
            layout_variant: default_layout_variant(),
            footer_note: String::new(),
            address: String::new(),
            logo_text: default_logo_text(),
            footer_pages: default_footer_pages(),
            extra: BTreeMap::new(),
        }
    }
}

impl SiteSettings {
    /// Parses `site.json`. A missing file means "all defaults".
    pub fn load(path: &Path) -> Result<SiteSettings, LoadError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SiteSettings::default()),
            Err(source) => {
                return Err(LoadError::Read { path: path.to_path_buf(), source });
            }
        };
        SiteSettings::parse(&raw, path)
    }

    pub fn parse(raw: &str, path: &Path) -> Result<SiteSettings, LoadError> {
        let mut settings: SiteSettings =
            serde_json::from_str(raw).map_err(|e| LoadError::Json {
                path: path.to_path_buf(),
                line: e.line(),
                column: e.column(),
                message: e.to_string(),
            })?;

        let variant = settings.layout_variant.trim().to_lowercase();
        settings.layout_variant = match variant.as_str() {
            "standard" | "linkhub" | "profile" => variant,
            _ => default_layout_variant(),
        };
        settings.newsletter_mode = settings.newsletter_mode.trim().to_lowercase();
        Ok(settings)
    }

    /// The domain as an absolute base URL without a trailing slash, if set.
    pub fn base_url(&self) -> Option<String> {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.is_empty() {
            return None;
        }
        if domain.contains("://") {
            Some(domain.to_string())
        } else {
            Some(format!("https://{}", domain))
        }
    }

    pub fn is_footer_page(&self, slug: &str) -> bool {
        self.footer_pages.iter().any(|p| p == slug)
    }
}

// --- Default value providers ---

fn default_content() -> PathBuf { PathBuf::from("./content") }
fn default_output() -> PathBuf { PathBuf::from("./site") }
fn default_templates() -> PathBuf { PathBuf::from("./templates") }
fn default_verify_timeout() -> u64 { 10 }
fn default_workers() -> usize { 8 }
fn default_deploy_timeout() -> u64 { 15 }
fn default_site_name() -> String { "Artificial Life Institute".to_string() }
fn default_meta_description() -> String { "Artificial Life Institute at the University of Vienna".to_string() }
fn default_newsletter_mode() -> String { "local".to_string() }
fn default_layout_variant() -> String { "standard".to_string() }
fn default_logo_text() -> String { "ALI".to_string() }
fn default_footer_pages() -> Vec<String> { vec!["privacy".to_string(), "imprint".to_string()] }
fn default_bool_true() -> bool { true }
fn default_bool_false() -> bool { false }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = Config::load(&dir.path().join("alisite.toml")).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("./site"));
        assert!(cfg.build.generate_search);
        assert_eq!(cfg.verify.workers, 8);
        assert!(cfg.deploy.remote_dir.is_none());
    }

    #[test]
    fn partial_project_file_keeps_other_defaults() {
        let cfg: Config = toml::from_str(
            "output_dir = \"public\"\n[build]\nminify_html = true\n[deploy]\nremote_dir = \"/mnt/web\"\n",
        )
        .unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("public"));
        assert!(cfg.build.minify_html);
        assert!(cfg.build.generate_rss);
        assert_eq!(cfg.deploy.remote_dir, Some(PathBuf::from("/mnt/web")));
        assert_eq!(cfg.deploy.timeout_secs, 15);
    }

    #[test]
    fn site_settings_default_and_extra_keys() {
        let settings = SiteSettings::parse(
            r#"{"site_name": "ALI", "layout_variant": "LinkHub", "seminar_room": "HS 3"}"#,
            Path::new("site.json"),
        )
        .unwrap();
        assert_eq!(settings.site_name, "ALI");
        assert_eq!(settings.layout_variant, "linkhub");
        assert_eq!(settings.newsletter_mode, "local");
        assert_eq!(settings.footer_pages, vec!["privacy", "imprint"]);
        assert_eq!(settings.extra["seminar_room"], "HS 3");
    }

    #[test]
    fn unknown_layout_variant_falls_back() {
        let settings =
            SiteSettings::parse(r#"{"layout_variant": "carousel"}"#, Path::new("site.json")).unwrap();
        assert_eq!(settings.layout_variant, "standard");
    }

    #[test]
    fn malformed_site_json_reports_location() {
        let err = SiteSettings::parse("{\n  \"site_name\": \n}", Path::new("content/site.json"))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("content/site.json"), "{msg}");
        assert!(msg.contains("line 3"), "{msg}");
    }

    #[test]
    fn base_url_normalizes_domain() {
        let mut settings = SiteSettings::default();
        assert_eq!(settings.base_url(), None);
        settings.domain = "alife.univie.ac.at/".into();
        assert_eq!(settings.base_url().as_deref(), Some("https://alife.univie.ac.at"));
        settings.domain = "http://localhost:8080".into();
        assert_eq!(settings.base_url().as_deref(), Some("http://localhost:8080"));
    }
}
