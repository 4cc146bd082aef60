use crate::build::perform_build;
use crate::config::Config;
use crate::term;
use anyhow::Result;
use notify::{recommended_watcher, Event, RecursiveMode, Result as NotifyResult, Watcher};
use std::{
    fs,
    path::{Component, Path, PathBuf},
    sync::mpsc,
    thread,
};

/// Serve the generated site and rebuild when content or templates change.
pub fn serve(config: Config, port: u16, verbose: bool) -> Result<()> {
    // initial build; a broken content tree should not stop the preview
    if let Err(e) = perform_build(&config, verbose) {
        term::failure(format!("{:#}", e));
    }

    let (tx, rx) = mpsc::channel::<Event>();
    let mut watcher = recommended_watcher(move |res: NotifyResult<Event>| {
        if let Ok(event) = res {
            if event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove() {
                let _ = tx.send(event);
            }
        }
    })?;

    for dir in [&config.content_dir, &config.templates_dir] {
        if dir.is_dir() {
            watcher.watch(dir, RecursiveMode::Recursive)?;
        }
    }

    let build_config = config.clone();
    thread::spawn(move || {
        while rx.recv().is_ok() {
            // one rebuild per burst of events
            while rx.try_recv().is_ok() {}
            match perform_build(&build_config, verbose) {
                Ok(report) => term::success(format!(
                    "rebuilt {} files in {:.2}s",
                    report.files,
                    report.elapsed.as_secs_f32()
                )),
                Err(e) => term::failure(format!("{:#}", e)),
            }
        }
    });

    let addr = format!("127.0.0.1:{}", port);
    let server = tiny_http::Server::http(&addr).map_err(|e| anyhow::Error::msg(e.to_string()))?;

    println!("{} http://{}", console::style("serving").cyan(), addr);

    for request in server.incoming_requests() {
        let url = request.url().split(['?', '#']).next().unwrap_or("/").to_string();
        let response = match resolve_request(&config.output_dir, &url).and_then(|p| fs::read(&p).ok().map(|d| (p, d))) {
            Some((path, data)) => {
                let ct = content_type(&path);
                let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], ct.as_bytes())
                    .map_err(|_| anyhow::anyhow!("invalid content type header"))?;
                tiny_http::Response::from_data(data).with_header(header)
            }
            None => tiny_http::Response::from_string("404 - not found").with_status_code(404),
        };
        let _ = request.respond(response);
    }

    // Keep the watcher alive for the lifetime of the server
    drop(watcher);
    Ok(())
}

/// Maps a request path onto a file under `root`. `/` → `index.html`,
/// `/about` → `about.html`. Paths leaving `root` resolve to nothing.
fn resolve_request(root: &Path, url: &str) -> Option<PathBuf> {
    let rel = url.trim_start_matches('/');
    let rel = Path::new(rel);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let mut full = root.join(rel);
    if full.is_dir() {
        full.push("index.html");
    }
    if !full.exists() && full.extension().is_none() {
        full.set_extension("html");
    }
    full.is_file().then_some(full)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()).unwrap_or("") {
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "text/html; charset=utf-8",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_paths_map_to_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::write(dir.path().join("about.html"), "about").unwrap();

        assert_eq!(resolve_request(dir.path(), "/"), Some(dir.path().join("index.html")));
        assert_eq!(resolve_request(dir.path(), "/about"), Some(dir.path().join("about.html")));
        assert_eq!(resolve_request(dir.path(), "/about.html"), Some(dir.path().join("about.html")));
        assert_eq!(resolve_request(dir.path(), "/missing"), None);
        assert_eq!(resolve_request(dir.path(), "/../etc/passwd"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type(Path::new("a/style.css")), "text/css");
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("img/hero.svg")), "image/svg+xml");
    }
}
