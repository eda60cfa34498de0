//! Filesystem materialization
//!
//! Places a byte-equivalent copy of a source file at its destination, either
//! by atomic copy with hash verification or by hardlink. The source file is
//! never modified or deleted; a failed copy never leaves a partial
//! destination behind (at worst a stale `.tmp`, which a later run ignores).

use crate::collision::{self, file_hash};
use crate::error::{Error, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// How files are placed into the library, selected per-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Atomic copy with SHA-256 verification (default)
    Copy,
    /// Hardlink; instant and space-free, same filesystem only
    Link,
}

/// Copy `src` to `dest` atomically and verify the result.
///
/// The write goes to `dest.tmp`, is fsynced, renamed into place, and the
/// directory entry is fsynced. Source and destination are then hashed
/// independently; on mismatch the destination is removed and the copy fails.
///
/// If the rename lands on an already-existing file (a collision raced us),
/// one retry is made against a fresh timestamp-suffixed name derived from
/// `canonical`; further contention propagates the error.
///
/// Returns the final destination path and the source hash.
pub fn copy_verified(src: &Path, dest: &Path, canonical: &Path) -> Result<(PathBuf, String)> {
    let mut target = dest.to_path_buf();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match copy_atomic(src, &target) {
            Ok(()) => break,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts == 1 => {
                target = collision::timestamp_suffix_path(canonical, Utc::now().timestamp());
                tracing::warn!(
                    dest = %dest.display(),
                    retry = %target.display(),
                    "Destination appeared mid-copy, retrying with suffixed name"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    let src_hash = file_hash(src)?;
    let dest_hash = file_hash(&target)?;
    if src_hash != dest_hash {
        // Remove the bad copy so it is not trusted later
        let _ = fs::remove_file(&target);
        return Err(Error::HashVerification {
            src: src.to_path_buf(),
            dest: target,
        });
    }

    Ok((target, src_hash))
}

/// Hardlink `src` at `dest`. Cannot overwrite, cannot cross filesystems.
pub fn link(src: &Path, dest: &Path) -> Result<()> {
    fs::hard_link(src, dest)?;
    Ok(())
}

/// Create the destination's parent directories.
pub fn ensure_dest_dir(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Verify that hardlinks work from `src_dir` into `dest_root`.
///
/// Creates a throwaway file in the source directory and links it into the
/// destination root. Run this before a link-mode import; cross-filesystem
/// setups and some NAS exports fail here rather than mid-run.
pub fn probe_hardlink_support(src_dir: &Path, dest_root: &Path) -> Result<()> {
    let probe_name = format!(".hardlink-probe-{}", std::process::id());
    let probe_src = src_dir.join(&probe_name);
    let probe_dest = dest_root.join(&probe_name);

    let unsupported = |reason: String| Error::HardlinkUnsupported {
        src_dir: src_dir.to_path_buf(),
        dest_dir: dest_root.to_path_buf(),
        reason,
    };

    File::create(&probe_src)
        .map_err(|e| unsupported(format!("cannot create test file in source: {}", e)))?;

    let result = fs::create_dir_all(dest_root)
        .map_err(|e| unsupported(format!("cannot create destination directory: {}", e)))
        .and_then(|_| {
            fs::hard_link(&probe_src, &probe_dest).map_err(|e| unsupported(e.to_string()))
        });

    let _ = fs::remove_file(&probe_dest);
    let _ = fs::remove_file(&probe_src);
    result
}

/// The copy-temp-then-rename sequence; errors leave no temp file behind.
fn copy_atomic(src: &Path, dest: &Path) -> io::Result<()> {
    let tmp = tmp_path(dest);

    let cleanup_on_err = |result: io::Result<()>| {
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    };

    let mut reader = File::open(src)?;
    let mut writer = File::create(&tmp)?;

    cleanup_on_err(io::copy(&mut reader, &mut writer).map(|_| ()))?;

    // Bytes must hit disk before the rename publishes them
    cleanup_on_err(writer.sync_all())?;
    drop(writer);

    cleanup_on_err(fs::rename(&tmp, dest))?;

    // Persist the directory entry as well. Directories cannot be opened for
    // fsync on Windows; there the rename is as durable as it gets.
    #[cfg(unix)]
    if let Some(dir) = dest.parent() {
        File::open(dir)?.sync_all()?;
    }

    Ok(())
}

fn tmp_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    dest.with_file_name(name)
}
