//! Import session recording
//!
//! Each run gets a directory under `<library>/imports/<YYYY-MM-DD-HHMMSS>/`
//! holding an append-only `manifest.jsonl` plus one hardlink per materialized
//! file, so a run's haul can be browsed without touching the library tree.
//! Every event is fsynced before the logging call returns; a crash can lose
//! at most the event being written, never reorder or corrupt earlier ones.

use crate::error::Result;
use crate::triage::{ClassifiedError, ErrorCategory, ErrorSeverity};
use crate::types::ImportStats;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One line of the manifest. A single struct covers all event kinds; absent
/// fields are omitted from the JSON.
#[derive(Debug, Default, Serialize)]
struct ManifestEvent {
    event: &'static str,
    ts: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    browse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_severity: Option<ErrorSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_suggestion: Option<String>,

    // session_start fields
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_files: Option<usize>,

    // session_end fields
    #[serde(skip_serializing_if = "Option::is_none")]
    total_scanned: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    copied: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_duplicate: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    copied_timestamped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<usize>,
}

impl ManifestEvent {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ..Self::default()
        }
    }
}

/// A single import run's manifest and browse tree.
pub struct ImportSession {
    id: String,
    session_dir: PathBuf,
    manifest: File,
    input_dir: PathBuf,
    user: String,
    /// Browse-name usage counts for collision suffixing
    used_names: HashMap<String, u32>,
    stats: ImportStats,
}

impl ImportSession {
    /// Create the session directory and open the manifest.
    ///
    /// The session ID is the current UTC timestamp, so concurrent runs into
    /// the same library land in distinct directories down to the second.
    pub fn open(library: &Path, user: &str, input_dir: &Path) -> Result<Self> {
        let imports_dir = library.join("imports");
        fs::create_dir_all(&imports_dir)?;

        // Second-resolution IDs can collide when runs start back to back;
        // suffix rather than share a directory
        let base_id = Utc::now().format("%Y-%m-%d-%H%M%S").to_string();
        let mut id = base_id.clone();
        let mut n = 2;
        while imports_dir.join(&id).exists() {
            id = format!("{}_{}", base_id, n);
            n += 1;
        }

        let session_dir = imports_dir.join(&id);
        fs::create_dir(&session_dir)?;

        let manifest = OpenOptions::new()
            .create(true)
            .append(true)
            .open(session_dir.join("manifest.jsonl"))?;

        tracing::info!(session = %id, dir = %session_dir.display(), "Opened import session");

        Ok(Self {
            id,
            session_dir,
            manifest,
            input_dir: input_dir.to_path_buf(),
            user: user.to_string(),
            used_names: HashMap::new(),
            stats: ImportStats::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Current session statistics.
    pub fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Write the session start event.
    pub fn log_session_start(&mut self, total_files: usize) -> Result<()> {
        let event = ManifestEvent {
            user: Some(self.user.clone()),
            input_dir: Some(self.input_dir.display().to_string()),
            total_files: Some(total_files),
            ..ManifestEvent::new("session_start")
        };
        self.write_event(&event)
    }

    /// Log a file materialized at its canonical destination.
    pub fn log_copied(
        &mut self,
        src: &Path,
        dest: &Path,
        hash: &str,
        size: u64,
        browse: &str,
    ) -> Result<()> {
        self.stats.copied += 1;
        self.write_materialized("copied", src, dest, hash, size, browse)
    }

    /// Log a file materialized under a timestamp-suffixed name.
    pub fn log_copied_timestamped(
        &mut self,
        src: &Path,
        dest: &Path,
        hash: &str,
        size: u64,
        browse: &str,
    ) -> Result<()> {
        self.stats.copied_timestamped += 1;
        self.write_materialized("copied_timestamped", src, dest, hash, size, browse)
    }

    fn write_materialized(
        &mut self,
        kind: &'static str,
        src: &Path,
        dest: &Path,
        hash: &str,
        size: u64,
        browse: &str,
    ) -> Result<()> {
        let event = ManifestEvent {
            src: Some(src.display().to_string()),
            dest: Some(dest.display().to_string()),
            hash: Some(hash.to_string()),
            browse: Some(browse.to_string()),
            size: Some(size),
            ..ManifestEvent::new(kind)
        };
        self.write_event(&event)
    }

    /// Log a duplicate that was already present as `existing`.
    pub fn log_skipped_duplicate(&mut self, src: &Path, existing: &Path, hash: &str) -> Result<()> {
        self.stats.skipped_duplicate += 1;
        let event = ManifestEvent {
            src: Some(src.display().to_string()),
            existing: Some(existing.display().to_string()),
            hash: Some(hash.to_string()),
            ..ManifestEvent::new("skipped_duplicate")
        };
        self.write_event(&event)
    }

    /// Log a classified per-file error.
    pub fn log_error(&mut self, err: &ClassifiedError) -> Result<()> {
        self.stats.errors += 1;
        let event = ManifestEvent {
            src: Some(err.path.display().to_string()),
            error: Some(err.message.clone()),
            error_category: Some(err.category),
            error_severity: Some(err.severity),
            error_suggestion: Some(err.suggestion.to_string()),
            dest: err.dest.as_ref().map(|d| d.display().to_string()),
            hash: err.hash.clone(),
            ..ManifestEvent::new("error")
        };
        self.write_event(&event)
    }

    /// Write the session end event carrying the final statistics.
    pub fn log_session_end(&mut self, stats: &ImportStats) -> Result<()> {
        let event = ManifestEvent {
            total_scanned: Some(stats.total_scanned),
            copied: Some(stats.copied),
            skipped_duplicate: Some(stats.skipped_duplicate),
            copied_timestamped: Some(stats.copied_timestamped),
            errors: Some(stats.errors),
            ..ManifestEvent::new("session_end")
        };
        self.write_event(&event)
    }

    /// Hardlink a freshly materialized library file into the session
    /// directory for browsing. Returns the browse name actually used.
    ///
    /// When several library files share a basename within this session, later
    /// ones get `_2, _3, ...` suffixes before the extension.
    pub fn create_hardlink(&mut self, library_file: &Path) -> Result<String> {
        let basename = library_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let count = self.used_names.get(&basename).copied().unwrap_or(0);
        let browse_name = if count == 0 {
            basename.clone()
        } else {
            match basename.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => {
                    format!("{}_{}.{}", stem, count + 1, ext)
                }
                _ => format!("{}_{}", basename, count + 1),
            }
        };
        self.used_names.insert(basename, count + 1);

        fs::hard_link(library_file, self.session_dir.join(&browse_name))?;
        Ok(browse_name)
    }

    /// Serialize, append and fsync one event.
    fn write_event(&mut self, event: &ManifestEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        self.manifest.write_all(line.as_bytes())?;
        // Durable before the caller proceeds to the next file
        self.manifest.sync_all()?;
        Ok(())
    }

    /// Flush and close the manifest.
    pub fn close(self) -> Result<()> {
        self.manifest.sync_all()?;
        Ok(())
    }
}
