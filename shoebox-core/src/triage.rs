//! Error triage
//!
//! Maps raw failures to `(category, severity, suggestion)` and keeps the
//! running error statistics that drive the circuit breaker. Categories and
//! severities are orthogonal: a metadata failure is only a warning because
//! the file still lands in `noexif`, while disk-full means nothing further
//! can succeed.

use crate::error::Error;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Broad failure category for reporting and manifest events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Io,
    Hash,
    Metadata,
    Unsupported,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Io => "io",
            ErrorCategory::Hash => "hash",
            ErrorCategory::Metadata => "metadata",
            ErrorCategory::Unsupported => "unsupported",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

/// How bad a failure is for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        }
    }
}

/// A failure enriched with category, severity and a remediation hint.
#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub path: PathBuf,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub suggestion: &'static str,
    /// The original error's message
    pub message: String,
    /// Destination involved, when known
    pub dest: Option<PathBuf>,
    /// Source hash, when it was computed before the failure
    pub hash: Option<String>,
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.severity.as_str(),
            self.category.as_str(),
            self.path.display(),
            self.message
        )
    }
}

/// Classify a raw failure by substring-matching its lowercased message.
pub fn classify(path: &Path, err: &Error) -> ClassifiedError {
    let message = err.to_string();
    let lowered = message.to_lowercase();

    let (category, severity, suggestion) = if lowered.contains("no space left") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Critical,
            "Free up disk space on the destination drive and retry the import",
        )
    } else if lowered.contains("permission denied") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Critical,
            "Check file permissions on both source and destination directories",
        )
    } else if lowered.contains("read-only file system") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Critical,
            "Destination filesystem is read-only - check mount options",
        )
    } else if lowered.contains("too many open files") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Critical,
            "System file descriptor limit reached - increase ulimit or restart",
        )
    } else if lowered.contains("hash verification failed") {
        (
            ErrorCategory::Hash,
            ErrorSeverity::Error,
            "File may be corrupted - verify source file integrity or try re-importing",
        )
    } else if lowered.contains("hash mismatch") {
        (
            ErrorCategory::Hash,
            ErrorSeverity::Error,
            "Data corruption detected during copy - check disk health",
        )
    } else if lowered.contains("input/output error") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Error,
            "I/O error - check disk health with SMART tools",
        )
    } else if lowered.contains("no such file") {
        (
            ErrorCategory::Io,
            ErrorSeverity::Error,
            "Source file disappeared during import - check if external drive disconnected",
        )
    } else if lowered.contains("exif") || lowered.contains("metadata") {
        (
            ErrorCategory::Metadata,
            ErrorSeverity::Warning,
            "File will be copied to noexif folder - metadata could not be extracted",
        )
    } else if lowered.contains("unsupported") || lowered.contains("unknown format") {
        (
            ErrorCategory::Unsupported,
            ErrorSeverity::Warning,
            "File format not recognized - will be skipped",
        )
    } else {
        (
            ErrorCategory::Unknown,
            ErrorSeverity::Error,
            "Unexpected error - check logs for details",
        )
    };

    ClassifiedError {
        path: path.to_path_buf(),
        category,
        severity,
        suggestion,
        message,
        dest: None,
        hash: None,
    }
}

/// How many recent errors the report shows in full.
const LAST_ERRORS_KEPT: usize = 5;

/// Running error statistics for one import.
#[derive(Debug, Default)]
pub struct ErrorStats {
    pub total: usize,
    pub critical: usize,
    pub errors: usize,
    pub warnings: usize,
    pub by_category: HashMap<ErrorCategory, usize>,
    /// Last few errors for quick diagnosis
    pub last_errors: Vec<ClassifiedError>,
    /// Consecutive errors, zeroed on every success
    pub consecutive: usize,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a classified error.
    pub fn add(&mut self, err: &ClassifiedError) {
        self.total += 1;
        self.consecutive += 1;
        *self.by_category.entry(err.category).or_insert(0) += 1;

        match err.severity {
            ErrorSeverity::Critical => self.critical += 1,
            ErrorSeverity::Error => self.errors += 1,
            ErrorSeverity::Warning => self.warnings += 1,
        }

        if self.last_errors.len() >= LAST_ERRORS_KEPT {
            self.last_errors.remove(0);
        }
        self.last_errors.push(err.clone());
    }

    /// A file processed cleanly; break any error streak.
    pub fn reset_consecutive(&mut self) {
        self.consecutive = 0;
    }

    /// Immediate-abort conditions, with the reason to report.
    pub fn should_abort(&self) -> Option<&'static str> {
        if self.critical > 0 {
            return Some("Critical system error detected - aborting to prevent data loss");
        }
        if self.consecutive >= 10 {
            return Some(
                "10 consecutive errors detected - likely systemic issue (disk full, permissions, etc.)",
            );
        }
        None
    }

    /// Majority-error abort condition, checked once enough files ran.
    pub fn majority_errors(&self, processed: usize) -> bool {
        processed >= 20 && self.total > processed / 2
    }

    /// Human-readable error report for the end of the run.
    pub fn report(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "\nImport encountered {} errors:\n", self.total);
        if self.critical > 0 {
            let _ = writeln!(out, "  critical: {} (system-level issues)", self.critical);
        }
        if self.errors > 0 {
            let _ = writeln!(out, "  errors:   {} (file-level issues)", self.errors);
        }
        if self.warnings > 0 {
            let _ = writeln!(out, "  warnings: {} (recoverable issues)", self.warnings);
        }

        let _ = writeln!(out, "\nError categories:");
        let mut categories: Vec<_> = self.by_category.iter().collect();
        categories.sort_by_key(|(c, _)| c.as_str());
        for (category, count) in categories {
            let _ = writeln!(out, "  - {}: {}", category.as_str(), count);
        }

        let _ = writeln!(out, "\nRecent errors:");
        for (i, err) in self.last_errors.iter().enumerate() {
            let _ = writeln!(out, "\n{}. {}", i + 1, err.path.display());
            let _ = writeln!(
                out,
                "   Category: {} | Severity: {}",
                err.category.as_str(),
                err.severity.as_str()
            );
            let _ = writeln!(out, "   Error: {}", err.message);
            let _ = writeln!(out, "   Suggestion: {}", err.suggestion);
        }

        out.push('\n');
        out.push_str(&self.suggestions());
        out
    }

    fn suggestions(&self) -> String {
        let count = |c: ErrorCategory| self.by_category.get(&c).copied().unwrap_or(0);
        let mut out = String::from("Suggested next steps:\n");

        if count(ErrorCategory::Io) > 0 {
            out.push_str("  - Check disk space and permissions\n");
            out.push_str("  - Verify source media (SD card, external drive) is properly connected\n");
        }
        if count(ErrorCategory::Hash) > 0 {
            out.push_str("  - Run disk health check (SMART diagnostics)\n");
            out.push_str("  - Verify source files are not corrupted\n");
        }
        if count(ErrorCategory::Metadata) > self.total / 2 {
            out.push_str(
                "  - Many metadata errors - consider the exiftool flag for better compatibility\n",
            );
        }
        if self.consecutive >= 5 {
            out.push_str(
                "  - Multiple consecutive errors suggest systemic issue - check system resources\n",
            );
        }
        out.push_str("  - Check session manifest for detailed error log\n");
        out
    }
}
