//! Ingest driver
//!
//! Walks the input tree and drives every media file through the full
//! pipeline: date resolution, path planning, collision resolution,
//! materialization, and session recording. Strictly sequential; one file is
//! in flight at a time, which is what keeps the external metadata child and
//! the collision resolver's view of the destination directory safe.
//!
//! Errors never stop the run by themselves. The circuit breaker does: any
//! critical error, ten consecutive failures, or a majority-error run once
//! twenty files have been processed.

use crate::collision::{self, Resolution};
use crate::config::Config;
use crate::date;
use crate::error::{Error, Result};
use crate::materialize::{self, Mode};
use crate::plan;
use crate::probe;
use crate::session::ImportSession;
use crate::triage::{classify, ErrorStats};
use crate::types::{DateConfidence, ImportStats, MediaType};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// Progress data for the periodic progress line.
#[derive(Debug, Clone, Copy)]
pub struct ProgressUpdate {
    pub processed: usize,
    pub total: usize,
    /// Files per second since the run started
    pub rate: f64,
    pub eta: Duration,
    pub errors: usize,
}

/// Callback events emitted while the driver runs.
#[derive(Debug)]
pub enum ProgressEvent<'a> {
    /// About to process this file
    Started {
        index: usize,
        total: usize,
        path: &'a Path,
    },
    /// Dry-run decision for one file; nothing was written
    Planned {
        src: &'a Path,
        dest: PathBuf,
        confidence: DateConfidence,
    },
    /// This file failed; the run continues unless the breaker trips
    FileFailed { path: &'a Path, message: String },
    /// Every tenth file, and at the end
    Tick(ProgressUpdate),
}

/// Result of a completed (or aborted) import run.
#[derive(Debug)]
pub struct ImportOutcome {
    pub stats: ImportStats,
    pub error_stats: ErrorStats,
    /// Session directory, when one was created (never in dry-run)
    pub session_dir: Option<PathBuf>,
    /// Circuit-breaker reason when the run was cut short
    pub aborted: Option<String>,
}

/// Per-file result, before session recording.
enum FileOutcome {
    Copied {
        dest: PathBuf,
        hash: String,
        size: u64,
    },
    CopiedTimestamped {
        dest: PathBuf,
        hash: String,
        size: u64,
    },
    SkippedDuplicate {
        existing: PathBuf,
        hash: String,
    },
    Planned {
        dest: PathBuf,
        confidence: DateConfidence,
    },
}

/// Walk the input tree and collect media files in deterministic order.
///
/// Symlinks are not followed; non-media extensions are filtered here, so
/// everything downstream sees only images and videos.
pub fn scan_media_files(input_dir: &Path, cfg: &Config) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(input_dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if MediaType::classify(entry.path(), cfg).is_media() {
            files.push(entry.into_path());
        }
    }

    tracing::info!(
        input_dir = %input_dir.display(),
        count = files.len(),
        "Scanned input tree"
    );
    Ok(files)
}

/// One-shot import of a directory tree into the library.
pub struct Importer<'a> {
    cfg: &'a Config,
    dry_run: bool,
}

impl<'a> Importer<'a> {
    pub fn new(cfg: &'a Config) -> Self {
        Self {
            cfg,
            dry_run: false,
        }
    }

    /// Plan only; no session, no filesystem mutations.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the import, reporting progress through the callback.
    pub fn run<F>(&self, input_dir: &Path, mut on_progress: F) -> Result<ImportOutcome>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        let outcome = self.run_inner(input_dir, &mut on_progress);
        // The shared metadata child is per-process; tear it down with the run
        probe::close();
        outcome
    }

    fn run_inner<F>(&self, input_dir: &Path, on_progress: &mut F) -> Result<ImportOutcome>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        let cfg = self.cfg;
        let files = scan_media_files(input_dir, cfg)?;
        let total = files.len();

        let mode = if cfg.use_hardlinks {
            Mode::Link
        } else {
            Mode::Copy
        };

        if mode == Mode::Link {
            materialize::probe_hardlink_support(input_dir, &cfg.library)?;
            if cfg.videolibrary != cfg.library {
                materialize::probe_hardlink_support(input_dir, &cfg.videolibrary)?;
            }
        }

        let mut session = if self.dry_run {
            None
        } else {
            let mut session = ImportSession::open(&cfg.library, &cfg.user, input_dir)?;
            session.log_session_start(total)?;
            Some(session)
        };

        let started = Instant::now();
        let mut error_stats = ErrorStats::new();
        let mut aborted: Option<String> = None;
        let mut processed = 0;

        for (i, path) in files.iter().enumerate() {
            processed = i + 1;
            on_progress(ProgressEvent::Started {
                index: i,
                total,
                path,
            });

            match self.process_file(path, mode) {
                Ok(outcome) => {
                    error_stats.reset_consecutive();
                    self.record(&mut session, path, outcome, on_progress)?;
                }
                Err(e) => {
                    let mut classified = classify(path, &e);
                    if let Error::HashVerification { dest, .. } = &e {
                        classified.dest = Some(dest.clone());
                    }
                    tracing::warn!(path = %path.display(), error = %e, "File failed");
                    on_progress(ProgressEvent::FileFailed {
                        path,
                        message: classified.to_string(),
                    });

                    if let Some(session) = &mut session {
                        session.log_error(&classified)?;
                    }
                    error_stats.add(&classified);

                    if let Some(reason) = error_stats.should_abort() {
                        aborted = Some(reason.to_string());
                    } else if error_stats.majority_errors(processed) {
                        aborted = Some(format!(
                            "error rate exceeds 50% ({}/{} files)",
                            error_stats.total, processed
                        ));
                    }
                }
            }

            if processed % 10 == 0 || processed == total || aborted.is_some() {
                on_progress(ProgressEvent::Tick(progress_update(
                    processed,
                    total,
                    started,
                    error_stats.total,
                )));
            }

            if let Some(reason) = &aborted {
                tracing::error!(reason = %reason, processed, total, "Import aborted");
                break;
            }
        }

        let mut stats = session
            .as_ref()
            .map(|s| s.stats())
            .unwrap_or_default();
        // On abort only the attempted prefix counts as scanned, so the
        // session_end accounting always balances against the events written
        stats.total_scanned = processed;

        let session_dir = match session {
            Some(mut session) => {
                session.log_session_end(&stats)?;
                let dir = session.session_dir().to_path_buf();
                session.close()?;
                Some(dir)
            }
            None => None,
        };

        Ok(ImportOutcome {
            stats,
            error_stats,
            session_dir,
            aborted,
        })
    }

    /// Drive one file through resolve, plan, collide, materialize.
    fn process_file(&self, src: &Path, mode: Mode) -> Result<FileOutcome> {
        let cfg = self.cfg;

        let media = MediaType::classify(src, cfg);
        if !media.is_media() {
            // The scan filters these; reaching here means a caller bypassed it
            return Err(Error::NotMedia(src.to_path_buf()));
        }

        let (date, confidence) = date::best_date(src, cfg)?;
        if !confidence.is_confident() {
            tracing::debug!(
                path = %src.display(),
                date = %date.format("%Y-%m-%d"),
                confidence = %confidence,
                "Low confidence date, routing to noexif"
            );
        }

        let planned = plan::plan_destination(src, date, confidence, media, cfg, &cfg.user)?;

        if self.dry_run {
            return Ok(FileOutcome::Planned {
                dest: planned,
                confidence,
            });
        }

        materialize::ensure_dest_dir(&planned)?;

        let mut dest = planned.clone();
        if dest.exists() {
            match collision::resolve(src, &dest)? {
                Resolution::Skip { existing } => {
                    let hash = collision::file_hash(src)?;
                    return Ok(FileOutcome::SkippedDuplicate { existing, hash });
                }
                Resolution::Divert { dest: diverted } => dest = diverted,
            }
        }

        let (final_dest, hash) = match mode {
            Mode::Copy => materialize::copy_verified(src, &dest, &planned)?,
            Mode::Link => {
                materialize::link(src, &dest)?;
                let hash = collision::file_hash(src)?;
                (dest, hash)
            }
        };

        let size = fs::metadata(&final_dest)?.len();

        if final_dest == planned {
            Ok(FileOutcome::Copied {
                dest: final_dest,
                hash,
                size,
            })
        } else {
            Ok(FileOutcome::CopiedTimestamped {
                dest: final_dest,
                hash,
                size,
            })
        }
    }

    /// Record a successful per-file outcome in the session.
    fn record<F>(
        &self,
        session: &mut Option<ImportSession>,
        src: &Path,
        outcome: FileOutcome,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(ProgressEvent<'_>),
    {
        match outcome {
            FileOutcome::Planned { dest, confidence } => {
                on_progress(ProgressEvent::Planned {
                    src,
                    dest,
                    confidence,
                });
                Ok(())
            }
            FileOutcome::SkippedDuplicate { existing, hash } => {
                tracing::info!(src = %src.display(), existing = %existing.display(), "Skipped duplicate");
                match session {
                    Some(session) => session.log_skipped_duplicate(src, &existing, &hash),
                    None => Ok(()),
                }
            }
            FileOutcome::Copied { dest, hash, size } => {
                tracing::info!(src = %src.display(), dest = %dest.display(), "Copied");
                self.record_materialized(session, src, &dest, &hash, size, false)
            }
            FileOutcome::CopiedTimestamped { dest, hash, size } => {
                tracing::info!(src = %src.display(), dest = %dest.display(), "Copied with timestamp suffix");
                self.record_materialized(session, src, &dest, &hash, size, true)
            }
        }
    }

    fn record_materialized(
        &self,
        session: &mut Option<ImportSession>,
        src: &Path,
        dest: &Path,
        hash: &str,
        size: u64,
        timestamped: bool,
    ) -> Result<()> {
        let Some(session) = session else {
            return Ok(());
        };

        let browse = match session.create_hardlink(dest) {
            Ok(name) => name,
            Err(e) => {
                // The library file is in place; a missing browse link is not
                // worth failing the file over
                tracing::warn!(dest = %dest.display(), error = %e, "Browse hardlink failed");
                String::new()
            }
        };

        if timestamped {
            session.log_copied_timestamped(src, dest, hash, size, &browse)
        } else {
            session.log_copied(src, dest, hash, size, &browse)
        }
    }
}

fn progress_update(
    processed: usize,
    total: usize,
    started: Instant,
    errors: usize,
) -> ProgressUpdate {
    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 {
        processed as f64 / elapsed
    } else {
        0.0
    };
    let remaining = total.saturating_sub(processed);
    let eta = if rate > 0.0 {
        Duration::from_secs_f64(remaining as f64 / rate)
    } else {
        Duration::ZERO
    };

    ProgressUpdate {
        processed,
        total,
        rate,
        eta,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_config(root: &Path) -> Config {
        Config {
            library: root.join("images"),
            videolibrary: root.join("videos"),
            ..Config::default()
        }
    }

    #[test]
    fn test_scan_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir_all(input.join("nested")).unwrap();
        fs::write(input.join("b.jpg"), b"b").unwrap();
        fs::write(input.join("a.jpg"), b"a").unwrap();
        fs::write(input.join("notes.txt"), b"n").unwrap();
        fs::write(input.join("nested/c.MP4"), b"c").unwrap();
        fs::write(input.join("nested/skip.pdf"), b"s").unwrap();

        let cfg = test_config(dir.path());
        let files = scan_media_files(&input, &cfg).unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&input).unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "nested/c.MP4"]);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("20240315_143022.jpg"), b"img").unwrap();

        let cfg = test_config(dir.path());
        let mut planned = Vec::new();
        let outcome = Importer::new(&cfg)
            .dry_run(true)
            .run(&input, |event| {
                if let ProgressEvent::Planned { dest, .. } = event {
                    planned.push(dest);
                }
            })
            .unwrap();

        assert_eq!(outcome.stats.total_scanned, 1);
        assert_eq!(outcome.stats.events(), 0);
        assert!(outcome.session_dir.is_none());
        assert_eq!(planned.len(), 1);
        assert!(
            planned[0].ends_with("images/user/2024/03/15/20240315_143022.jpg"),
            "got {}",
            planned[0].display()
        );
        // No library directories were created
        assert!(!cfg.library.exists());
        assert!(!cfg.videolibrary.exists());
    }
}
