use std::fs;
use std::path::Path;
use log::debug;
use regex::Regex;
use crate::utils::file_ops::{copy_atomic, file_size};
use crate::Result;

const COVER_ART_PATTERN: &str =
    r"(?i)^(cover|folder|front|album|albumart(small|large)?)\.(jpe?g|png|gif|bmp|webp)$";

/// Result of copying the cover images that sit next to a track.
#[derive(Debug, Default, PartialEq)]
pub struct CoverArtCopy {
    pub copied: usize,
    pub warnings: Vec<String>,
}

pub struct CoverArtCopier {
    pattern: Regex,
}

impl CoverArtCopier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(COVER_ART_PATTERN)?,
        })
    }

    pub fn is_cover_art(&self, file_name: &str) -> bool {
        self.pattern.is_match(file_name)
    }

    /// Copies cover images from `source_dir` into `destination_dir` unless a
    /// non-empty file of the same name is already there. Failures become
    /// warnings; they never fail the track.
    pub fn copy_siblings(&self, source_dir: &Path, destination_dir: &Path) -> CoverArtCopy {
        let mut result = CoverArtCopy::default();

        let entries = match fs::read_dir(source_dir) {
            Ok(entries) => entries,
            Err(e) => {
                result
                    .warnings
                    .push(format!("cannot list {} for cover art: {}", source_dir.display(), e));
                return result;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else { continue };
            if !self.is_cover_art(name_str) || !entry.path().is_file() {
                continue;
            }

            let target = destination_dir.join(&name);
            if file_size(&target).is_some_and(|size| size > 0) {
                continue;
            }

            match copy_atomic(&entry.path(), &target) {
                Ok(_) => {
                    debug!("Copied cover art {}", target.display());
                    result.copied += 1;
                }
                Err(e) => result.warnings.push(format!("cover art {}: {}", name_str, e)),
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn matches_common_cover_names() {
        let copier = CoverArtCopier::new().unwrap();
        for name in ["cover.jpg", "Cover.JPEG", "folder.png", "front.webp", "AlbumArtSmall.jpg"] {
            assert!(copier.is_cover_art(name), "{}", name);
        }
        for name in ["cover.txt", "mycover.jpg", "01 - song.flac", "back.jpg"] {
            assert!(!copier.is_cover_art(name), "{}", name);
        }
    }

    #[test]
    fn copies_missing_covers_only() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::write(src.path().join("cover.jpg"), b"new-cover").unwrap();
        fs::write(src.path().join("folder.png"), b"folder").unwrap();
        fs::write(src.path().join("notes.txt"), b"notes").unwrap();
        fs::write(dst.path().join("folder.png"), b"existing").unwrap();

        let copier = CoverArtCopier::new().unwrap();
        let result = copier.copy_siblings(src.path(), dst.path());

        assert_eq!(result, CoverArtCopy { copied: 1, warnings: Vec::new() });
        assert_eq!(fs::read(dst.path().join("cover.jpg")).unwrap(), b"new-cover");
        assert_eq!(fs::read(dst.path().join("folder.png")).unwrap(), b"existing");
        assert!(!dst.path().join("notes.txt").exists());

        let again = copier.copy_siblings(src.path(), dst.path());
        assert_eq!(again.copied, 0);
    }

    #[test]
    fn unreadable_source_dir_is_a_warning() {
        let dst = tempdir().unwrap();
        let result = CoverArtCopier::new()
            .unwrap()
            .copy_siblings(&dst.path().join("missing"), dst.path());
        assert_eq!(result.copied, 0);
        assert_eq!(result.warnings.len(), 1);
    }
}
