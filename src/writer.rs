//! Produces the output directory from a [`RenderedSite`].
//!
//! Everything is written into a staging directory next to the output
//! directory. The previous output is only replaced once the whole tree is
//! complete: old output renamed aside, staging renamed into place, old
//! output removed. A failure at any point before that leaves the previous
//! output exactly as it was.

use crate::{
    assets::{self, AssetReport},
    error::WriteError,
    models::RenderedSite,
    term,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::{Builder, TempDir};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub pages: usize,
    pub files: usize,
    pub assets: AssetReport,
}

/// Writes `site` plus theme and media assets, then swaps the result into
/// `output`.
pub fn write_site(output: &Path, site: &RenderedSite, media_dir: &Path) -> Result<WriteReport, WriteError> {
    let parent = parent_dir(output);
    fs::create_dir_all(&parent).map_err(|source| WriteError::Staging { parent: parent.clone(), source })?;

    // Dropping the TempDir on any early return removes the partial tree
    let staging = temp_dir_in(&parent, ".alisite-staging-")?;

    for page in &site.pages {
        write_file(staging.path(), &page.path, page.html.as_bytes())?;
    }
    for file in &site.files {
        write_file(staging.path(), &file.path, file.contents.as_bytes())?;
    }
    let assets = assets::copy_assets(staging.path(), media_dir)?;

    swap_into_place(staging, output, &parent)?;

    Ok(WriteReport {
        pages: site.pages.len(),
        files: site.files.len(),
        assets,
    })
}

fn swap_into_place(staging: TempDir, output: &Path, parent: &Path) -> Result<(), WriteError> {
    // `staging` still cleans up after itself if this fails.
    let aside = if output.exists() { Some(temp_dir_in(parent, ".alisite-old-")?) } else { None };
    let staged = staging.keep();

    // The old tree lives inside `aside` until the new one is in place;
    // dropping `aside` deletes it.
    let aside = if let Some(aside) = aside {
        let old = aside.path().join("output");
        if let Err(source) = fs::rename(output, &old) {
            let _ = fs::remove_dir_all(&staged);
            return Err(WriteError::Swap { output: output.to_path_buf(), restored: true, source });
        }
        Some((aside, old))
    } else {
        None
    };

    if let Err(source) = fs::rename(&staged, output) {
        let restored = match &aside {
            Some((_, old)) => fs::rename(old, output).is_ok(),
            None => true,
        };
        if restored {
            let _ = fs::remove_dir_all(&staged);
        } else if let Some((aside, _)) = aside {
            // Keep the only copy of the previous output on disk
            let kept = aside.keep();
            term::warn(format!("previous output kept at {}", kept.join("output").display()));
        }
        return Err(WriteError::Swap { output: output.to_path_buf(), restored, source });
    }

    if let Some((aside, _)) = aside {
        let path = aside.path().to_path_buf();
        if let Err(e) = aside.close() {
            term::warn(format!("{}: cannot remove previous output: {}", path.display(), e));
        }
    }
    Ok(())
}

fn temp_dir_in(parent: &Path, prefix: &str) -> Result<TempDir, WriteError> {
    Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map_err(|source| WriteError::Staging { parent: parent.to_path_buf(), source })
}

fn write_file(root: &Path, rel: &Path, data: &[u8]) -> Result<(), WriteError> {
    let target = root.join(rel);
    if let Some(dir) = target.parent() {
        fs::create_dir_all(dir).map_err(|e| WriteError::io(rel, e))?;
    }
    fs::write(&target, data).map_err(|e| WriteError::io(rel, e))
}

/// `site` → `.`, `/srv/www/site` → `/srv/www`.
fn parent_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
