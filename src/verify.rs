//! Link verification over a built output directory.
//!
//! Every `href`/`src` of every HTML file is classified as skipped, internal
//! or external. Internal links must resolve to a file inside the output
//! root. External links are probed once per distinct URL on a bounded
//! worker pool. Broken links are findings: the report is returned, never
//! raised.

use crate::{error::VerifyError, parser, render::url_path};
use rayon::prelude::*;
use reqwest::{blocking::Client, StatusCode};
use std::{
    collections::BTreeMap,
    fs,
    path::{Component, Path, PathBuf},
    time::Duration,
};
use walkdir::WalkDir;

/// One finding: `link` on page `source` does not work.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BrokenLink {
    /// Page path relative to the output root, `/`-separated.
    pub source: String,
    /// The link exactly as written in the page.
    pub link: String,
    pub reason: String,
}

/// Checks one external URL. `Err` carries the reason it is broken.
pub trait ExternalProbe: Sync {
    fn probe(&self, url: &str) -> Result<(), String>;
}

/// `HEAD` first, `GET` when the server does not accept `HEAD`.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<HttpProbe, VerifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("alisite/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpProbe { client })
    }

    fn check(status: StatusCode) -> Result<(), String> {
        if status.as_u16() >= 400 {
            Err(format!("HTTP {}", status.as_u16()))
        } else {
            Ok(())
        }
    }
}

impl ExternalProbe for HttpProbe {
    fn probe(&self, url: &str) -> Result<(), String> {
        let head = self.client.head(url).send().map_err(|e| transport_reason(&e))?;
        match head.status() {
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED | StatusCode::FORBIDDEN => {
                let get = self.client.get(url).send().map_err(|e| transport_reason(&e))?;
                HttpProbe::check(get.status())
            }
            status => HttpProbe::check(status),
        }
    }
}

fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        err.to_string()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LinkKind {
    Skip,
    Internal,
    /// Normalized URL to probe.
    External(String),
}

fn classify(link: &str) -> LinkKind {
    let lower = link.trim().to_ascii_lowercase();
    const SKIPPED: [&str; 5] = ["#", "mailto:", "tel:", "javascript:", "data:"];

    if lower.is_empty() || SKIPPED.iter().any(|p| lower.starts_with(p)) {
        LinkKind::Skip
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        LinkKind::External(link.trim().to_string())
    } else if lower.starts_with("//") {
        LinkKind::External(format!("https:{}", link.trim()))
    } else if has_scheme(&lower) {
        // ftp:, sms:, ... cannot be checked
        LinkKind::Skip
    } else {
        LinkKind::Internal
    }
}

fn has_scheme(link: &str) -> bool {
    let Some((scheme, _)) = link.split_once(':') else { return false };
    !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+.-".contains(c))
}

/// Every `href`/`src` attribute value, entity-decoded, in document order.
fn extract_links(html: &str) -> Vec<String> {
    parser::link_targets(html).into_iter().map(decode_entities).collect()
}

fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Resolves an internal link from the page at `source` (relative to the
/// output root) and checks the target exists.
fn check_internal(root: &Path, source: &Path, link: &str) -> Result<(), String> {
    let path = link.split(['?', '#']).next().unwrap_or("");
    if path.is_empty() {
        // `?query` only: same document
        return Ok(());
    }

    let mut resolved: Vec<String> = Vec::new();
    if !path.starts_with('/') {
        for c in source.parent().unwrap_or(Path::new("")).components() {
            if let Component::Normal(part) = c {
                resolved.push(part.to_string_lossy().into_owned());
            }
        }
    }
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if resolved.pop().is_none() {
                    return Err("escapes the output directory".to_string());
                }
            }
            other => resolved.push(other.to_string()),
        }
    }

    let mut target: PathBuf = root.to_path_buf();
    target.extend(&resolved);
    if path.ends_with('/') || target.is_dir() {
        target.push("index.html");
    }
    if target.is_file() { Ok(()) } else { Err("file not found".to_string()) }
}

/// Settings for one verification run.
pub struct VerifyOptions<'a> {
    /// `None` skips external links entirely (`--offline`).
    pub probe: Option<&'a dyn ExternalProbe>,
    pub workers: usize,
}

/// Checks every link in every HTML file under `root`. Returns the broken
/// ones sorted by source page, then link.
pub fn verify_site(root: &Path, options: &VerifyOptions) -> Result<Vec<BrokenLink>, VerifyError> {
    if !root.is_dir() {
        return Err(VerifyError::OutputMissing { path: root.to_path_buf() });
    }

    let mut broken = Vec::new();
    // url -> every (source, link as written) that points at it
    let mut external: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| VerifyError::Read { path: root.to_path_buf(), source: e.into() })?;
        let is_html = entry.path().extension().is_some_and(|e| e == "html");
        if !entry.file_type().is_file() || !is_html {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path()).to_path_buf();
        let source = url_path(&rel);
        let html = fs::read_to_string(entry.path())
            .map_err(|e| VerifyError::Read { path: entry.path().to_path_buf(), source: e })?;

        for link in extract_links(&html) {
            match classify(&link) {
                LinkKind::Skip => {}
                LinkKind::Internal => {
                    if let Err(reason) = check_internal(root, &rel, &link) {
                        broken.push(BrokenLink { source: source.clone(), link, reason });
                    }
                }
                LinkKind::External(url) => {
                    external.entry(url).or_default().push((source.clone(), link));
                }
            }
        }
    }

    if let Some(probe) = options.probe {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(options.workers.max(1)).build()?;
        let urls: Vec<&String> = external.keys().collect();
        let results: Vec<(&String, Result<(), String>)> =
            pool.install(|| urls.into_par_iter().map(|url| (url, probe.probe(url))).collect());

        for (url, result) in results {
            if let Err(reason) = result {
                for (source, link) in &external[url] {
                    broken.push(BrokenLink { source: source.clone(), link: link.clone(), reason: reason.clone() });
                }
            }
        }
    }

    broken.sort();
    broken.dedup();
    Ok(broken)
}
