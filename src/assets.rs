//! Static files under `assets/`: the built-in theme plus the project's media.

use crate::error::WriteError;
use rust_embed::RustEmbed;
use std::{fs, path::Path};
use walkdir::WalkDir;

#[derive(RustEmbed)]
#[folder = "assets/theme/"]
struct Theme;

/// Counts for the verbose build log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssetReport {
    pub theme_files: usize,
    pub media_files: usize,
}

/// Writes theme files to `<dest>/assets/` and copies the media directory
/// into `<dest>/assets/img/`. A missing media directory is not an error.
pub fn copy_assets(dest: &Path, media_dir: &Path) -> Result<AssetReport, WriteError> {
    let assets_root = dest.join("assets");
    let mut report = AssetReport::default();

    for name in Theme::iter() {
        let Some(file) = Theme::get(name.as_ref()) else { continue };
        let target = assets_root.join(name.as_ref());
        write_file(&target, &file.data)?;
        report.theme_files += 1;
    }

    if media_dir.is_dir() {
        report.media_files = copy_media(media_dir, &assets_root.join("img"))?;
    }
    Ok(report)
}

/// Regular files only; symlinks and special files are skipped.
fn copy_media(src: &Path, dst: &Path) -> Result<usize, WriteError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(|e| WriteError::io(src, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| WriteError::io(parent, e))?;
        }
        fs::copy(entry.path(), &target).map_err(|e| WriteError::io(entry.path(), e))?;
        copied += 1;
    }
    Ok(copied)
}

fn write_file(target: &Path, data: &[u8]) -> Result<(), WriteError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| WriteError::io(parent, e))?;
    }
    fs::write(target, data).map_err(|e| WriteError::io(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_theme_without_media() {
        let out = TempDir::new().unwrap();
        let report = copy_assets(out.path(), &out.path().join("no-media")).unwrap();
        assert!(out.path().join("assets/css/style.css").is_file());
        assert!(out.path().join("assets/js/main.js").is_file());
        assert!(out.path().join("assets/img/placeholder-hero.svg").is_file());
        assert_eq!(report.media_files, 0);
        assert!(report.theme_files >= 3);
    }

    #[test]
    fn media_keeps_subdirectories_and_overrides_placeholders() {
        let media = TempDir::new().unwrap();
        fs::create_dir_all(media.path().join("people")).unwrap();
        fs::write(media.path().join("people/ada.jpg"), b"jpeg").unwrap();
        fs::write(media.path().join("placeholder-hero.svg"), b"<svg>custom</svg>").unwrap();

        let out = TempDir::new().unwrap();
        let report = copy_assets(out.path(), media.path()).unwrap();
        assert_eq!(report.media_files, 2);
        assert_eq!(fs::read(out.path().join("assets/img/people/ada.jpg")).unwrap(), b"jpeg");
        assert_eq!(
            fs::read_to_string(out.path().join("assets/img/placeholder-hero.svg")).unwrap(),
            "<svg>custom</svg>"
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped() {
        let media = TempDir::new().unwrap();
        fs::write(media.path().join("real.png"), b"png").unwrap();
        std::os::unix::fs::symlink(media.path().join("real.png"), media.path().join("link.png")).unwrap();

        let out = TempDir::new().unwrap();
        copy_assets(out.path(), media.path()).unwrap();
        assert!(out.path().join("assets/img/real.png").is_file());
        assert!(!out.path().join("assets/img/link.png").exists());
    }
}
