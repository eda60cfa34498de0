//! Collision resolution by content hash
//!
//! When the planned destination already exists, the decision is strictly
//! hash-based: identical content anywhere under the destination's canonical
//! or timestamp-suffixed names means skip; different content is preserved
//! under a fresh timestamp-suffixed name. Nothing is ever replaced.

use crate::error::Result;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome of resolving a destination that already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Identical content is already present at `existing`.
    Skip { existing: PathBuf },
    /// Materialize under this new suffixed destination instead.
    Divert { dest: PathBuf },
}

/// SHA-256 of a file's content as a lowercase hex string.
pub fn file_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Decide what to do about an occupied destination.
///
/// 1. Same hash at the canonical name: skip.
/// 2. Same hash under any `base_*.ext` sibling: skip.
/// 3. Otherwise divert to `base_<unix_now>.ext` (numeric suffixes on top of
///    that if even the timestamped name is taken).
pub fn resolve(src: &Path, dest: &Path) -> Result<Resolution> {
    let src_hash = file_hash(src)?;
    let dest_hash = file_hash(dest)?;

    if src_hash == dest_hash {
        return Ok(Resolution::Skip {
            existing: dest.to_path_buf(),
        });
    }

    if let Some(existing) = find_suffixed_sibling(dest, &src_hash)? {
        return Ok(Resolution::Skip { existing });
    }

    Ok(Resolution::Divert {
        dest: timestamp_suffix_path(dest, Utc::now().timestamp()),
    })
}

/// Scan `dir(dest)` for `base_*.ext` siblings whose content matches `hash`.
fn find_suffixed_sibling(dest: &Path, hash: &str) -> Result<Option<PathBuf>> {
    let Some(dir) = dest.parent() else {
        return Ok(None);
    };
    let (base, ext) = split_extension(dest);
    let prefix = format!("{}_", base);

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        if !name.starts_with(&prefix) || !name.ends_with(&ext) {
            continue;
        }

        let candidate = entry.path();
        match file_hash(&candidate) {
            Ok(candidate_hash) if candidate_hash == hash => return Ok(Some(candidate)),
            Ok(_) => {}
            // Unreadable sibling: not a match, keep looking
            Err(e) => {
                tracing::debug!(path = %candidate.display(), error = %e, "Skipping unreadable sibling");
            }
        }
    }

    Ok(None)
}

/// `/path/img.jpg` becomes `/path/img_<unix>.jpg`; falls back to numeric
/// suffixing when the timestamped slot is itself taken.
pub fn timestamp_suffix_path(dest: &Path, unix_now: i64) -> PathBuf {
    let (base, ext) = split_extension(dest);
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));

    let target = dir.join(format!("{}_{}{}", base, unix_now, ext));
    if !target.exists() {
        return target;
    }
    numbered_suffix_path(&target)
}

/// First unused `base_2.ext`, `base_3.ext`, ... slot.
fn numbered_suffix_path(dest: &Path) -> PathBuf {
    let (base, ext) = split_extension(dest);
    let dir = dest.parent().unwrap_or_else(|| Path::new(""));

    for i in 2.. {
        let candidate = dir.join(format!("{}_{}{}", base, i, ext));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("suffix search is unbounded")
}

/// Split a basename into `(stem, ".ext")`; the extension may be empty.
fn split_extension(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{}", ext)),
        _ => (name, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_file_hash_is_stable_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"hello world").unwrap();

        assert_eq!(
            file_hash(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_timestamp_suffix_path() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("img.jpg");

        let suffixed = timestamp_suffix_path(&dest, 1742032800);
        assert_eq!(suffixed, dir.path().join("img_1742032800.jpg"));
    }

    #[test]
    fn test_timestamp_suffix_falls_back_to_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("img.jpg");
        fs::write(dir.path().join("img_1742032800.jpg"), b"taken").unwrap();
        fs::write(dir.path().join("img_1742032800_2.jpg"), b"also taken").unwrap();

        let suffixed = timestamp_suffix_path(&dest, 1742032800);
        assert_eq!(suffixed, dir.path().join("img_1742032800_3.jpg"));
    }

    #[test]
    fn test_suffix_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("README");

        let suffixed = timestamp_suffix_path(&dest, 100);
        assert_eq!(suffixed, dir.path().join("README_100"));
    }

    #[test]
    fn test_resolve_identical_content_skips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("incoming.jpg");
        let dest = dir.path().join("photo.jpg");
        fs::write(&src, b"same bytes").unwrap();
        fs::write(&dest, b"same bytes").unwrap();

        let resolution = resolve(&src, &dest).unwrap();
        assert_eq!(resolution, Resolution::Skip { existing: dest });
    }

    #[test]
    fn test_resolve_matching_sibling_skips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("incoming.jpg");
        let dest = dir.path().join("photo.jpg");
        let sibling = dir.path().join("photo_1700000000.jpg");
        fs::write(&src, b"version two").unwrap();
        fs::write(&dest, b"version one").unwrap();
        fs::write(&sibling, b"version two").unwrap();

        let resolution = resolve(&src, &dest).unwrap();
        assert_eq!(resolution, Resolution::Skip { existing: sibling });
    }

    #[test]
    fn test_resolve_different_content_diverts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("incoming.jpg");
        let dest = dir.path().join("photo.jpg");
        fs::write(&src, b"version two").unwrap();
        fs::write(&dest, b"version one").unwrap();

        match resolve(&src, &dest).unwrap() {
            Resolution::Divert { dest: diverted } => {
                let name = diverted.file_name().unwrap().to_str().unwrap();
                assert!(name.starts_with("photo_"), "got {}", name);
                assert!(name.ends_with(".jpg"), "got {}", name);
                assert_ne!(diverted, dest);
            }
            other => panic!("expected divert, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_ignores_non_matching_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("incoming.jpg");
        let dest = dir.path().join("photo.jpg");
        fs::write(&src, b"version three").unwrap();
        fs::write(&dest, b"version one").unwrap();
        fs::write(dir.path().join("photo_1700000000.jpg"), b"version two").unwrap();
        // Different extension never matches
        fs::write(dir.path().join("photo_1700000000.png"), b"version three").unwrap();

        assert!(matches!(
            resolve(&src, &dest).unwrap(),
            Resolution::Divert { .. }
        ));
    }
}
