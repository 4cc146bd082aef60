//! `alisite deploy`: publish the output directory to a mounted webspace.
//!
//! The previous remote output is never deleted. It is moved into a
//! timestamped folder under the quarantine directory first, then the local
//! output is mirrored in. A failed mirror after a successful quarantine
//! leaves the webspace empty and is reported as needing manual action.

use crate::{
    config::{Config, SiteSettings},
    error::{DeployError, LoadError},
    term,
};
use chrono::Local;
use reqwest::blocking::Client;
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use walkdir::WalkDir;

/// Resolved paths of one deployment.
#[derive(Debug, Clone)]
pub struct DeployPlan {
    pub local: PathBuf,
    pub remote: PathBuf,
    pub quarantine_root: PathBuf,
}

impl DeployPlan {
    pub fn from_config(config: &Config) -> Result<DeployPlan, DeployError> {
        let remote = config.deploy.remote_dir.clone().ok_or(DeployError::NoRemote)?;
        let quarantine_root = match &config.deploy.quarantine_dir {
            Some(dir) => dir.clone(),
            None => default_quarantine(&remote),
        };
        Ok(DeployPlan { local: config.output_dir.clone(), remote, quarantine_root })
    }

    /// Refuses to touch anything unless both ends look like what we expect.
    pub fn validate(&self) -> Result<(), DeployError> {
        if !self.local.is_dir() {
            return Err(DeployError::LocalOutputMissing { path: self.local.clone() });
        }
        if !self.remote.is_dir() {
            return Err(DeployError::RemoteMissing { path: self.remote.clone() });
        }

        let local = resolve(&self.local);
        let remote = resolve(&self.remote);
        let quarantine = resolve(&self.quarantine_root);
        let unexpected = |reason| DeployError::RemoteUnexpected { path: self.remote.clone(), reason };

        if remote.parent().is_none() {
            return Err(unexpected("remote path is the filesystem root"));
        }
        if overlaps(&remote, &local) {
            return Err(unexpected("remote path overlaps the local output directory"));
        }
        if overlaps(&remote, &quarantine) {
            return Err(unexpected("quarantine directory overlaps the remote path"));
        }
        if overlaps(&local, &quarantine) {
            return Err(unexpected("quarantine directory overlaps the local output directory"));
        }
        Ok(())
    }
}

/// `/mnt/web` → `/mnt/web.quarantine`.
fn default_quarantine(remote: &Path) -> PathBuf {
    let name = remote
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "remote".to_string());
    remote.with_file_name(format!("{}.quarantine", name))
}

fn overlaps(a: &Path, b: &Path) -> bool {
    a.starts_with(b) || b.starts_with(a)
}

/// Absolute path with symlinks resolved as far as the path exists.
fn resolve(path: &Path) -> PathBuf {
    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = abs.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut out = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
    out.extend(missing.iter().rev());
    out
}

/// Moves every entry of the remote directory into a fresh
/// `<quarantine_root>/<stamp>` folder and returns that folder. On failure
/// the entries already moved are put back.
pub fn quarantine(plan: &DeployPlan, stamp: &str) -> Result<PathBuf, DeployError> {
    let q_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| DeployError::Quarantine { path, source }
    };

    let mut target = plan.quarantine_root.join(stamp);
    let mut n = 1;
    while target.exists() {
        n += 1;
        target = plan.quarantine_root.join(format!("{}-{}", stamp, n));
    }
    fs::create_dir_all(&target).map_err(q_err(&target))?;

    let mut entries: Vec<PathBuf> = fs::read_dir(&plan.remote)
        .map_err(q_err(&plan.remote))?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<_>>()
        .map_err(q_err(&plan.remote))?;
    entries.sort();

    let mut moved: Vec<(PathBuf, PathBuf)> = Vec::new();
    for entry in entries {
        let Some(name) = entry.file_name() else { continue };
        let dest = target.join(name);
        if let Err(source) = move_path(&entry, &dest) {
            for (from, to) in moved.iter().rev() {
                if let Err(e) = move_path(to, from) {
                    term::warn(format!("{}: cannot move back from quarantine: {}", from.display(), e));
                }
            }
            return Err(DeployError::Quarantine { path: entry, source });
        }
        moved.push((entry, dest));
    }
    Ok(target)
}

/// Rename, or copy and delete when the two paths live on different
/// filesystems.
fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    let meta = fs::symlink_metadata(from)?;
    if meta.is_dir() {
        copy_tree(from, to)?;
        fs::remove_dir_all(from)
    } else {
        fs::copy(from, to)?;
        fs::remove_file(from)
    }
}

fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copies the local output into the (now empty) remote directory.
pub fn mirror(plan: &DeployPlan, quarantined: &Path) -> Result<usize, DeployError> {
    copy_tree(&plan.local, &plan.remote).map_err(|source| DeployError::Mirror {
        remote: plan.remote.clone(),
        quarantine: quarantined.to_path_buf(),
        source,
    })
}

/// `GET`s the live site. `Err` carries a human readable reason.
pub fn check_live(url: &str, timeout: Duration) -> Result<u16, String> {
    let client = Client::builder().timeout(timeout).build().map_err(|e| e.to_string())?;
    let resp = client.get(url).send().map_err(|e| e.to_string())?;
    let status = resp.status().as_u16();
    if status >= 400 { Err(format!("HTTP {}", status)) } else { Ok(status) }
}

fn live_url(config: &Config) -> Result<Option<String>, LoadError> {
    if let Some(url) = &config.deploy.live_url {
        return Ok(Some(url.clone()));
    }
    let settings = SiteSettings::load(&config.content_dir.join("site.json"))?;
    Ok(settings.base_url().map(|base| format!("{}/", base)))
}

/// Validate, quarantine, mirror, check liveness.
pub fn run_deploy(config: &Config, verbose: bool) -> Result<(), DeployError> {
    let plan = DeployPlan::from_config(config)?;

    term::step(verbose, 1, 4, "Checking paths...");
    plan.validate()?;

    term::step(verbose, 2, 4, "Moving current remote output to quarantine...");
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let quarantined = quarantine(&plan, &stamp)?;
    term::detail(verbose, "quarantined", quarantined.display());

    term::step(verbose, 3, 4, "Mirroring output...");
    let files = mirror(&plan, &quarantined)?;
    term::detail(verbose, "copied", format!("{} files to {}", files, plan.remote.display()));

    term::step(verbose, 4, 4, "Checking live site...");
    match live_url(config) {
        Ok(Some(url)) => match check_live(&url, Duration::from_secs(config.deploy.timeout_secs)) {
            Ok(status) => term::detail(verbose, "live", format!("{} answered {}", url, status)),
            Err(reason) => term::warn(format!("{} is not reachable: {}", url, reason)),
        },
        Ok(None) => term::warn("no live URL configured and no domain in site.json; skipping liveness check"),
        Err(err) => term::warn(format!("skipping liveness check: {}", err)),
    }
    Ok(())
}
