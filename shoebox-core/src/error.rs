//! Error types for shoebox-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the shoebox-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (manifest events)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No capture date in container metadata.
    ///
    /// The message deliberately names EXIF so the triage layer routes it
    /// as a metadata warning rather than a hard failure.
    #[error("no EXIF or media creation date found in {0}")]
    NoCaptureDate(PathBuf),

    /// No date source at all (metadata, filename and mtime all failed).
    ///
    /// The mtime failure's message stays in the Display output so the triage
    /// layer can see the underlying cause (a vanished source reads as an io
    /// error, not an unknown one).
    #[error("could not determine file date for {path}: {source}")]
    NoDate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// External metadata tool failure (spawn, protocol, or extraction)
    #[error("metadata tool error: {0}")]
    MetadataTool(String),

    /// Video stream missing dimensions or carrying an unparseable duration
    #[error("unusable video metadata for {path}: {reason}")]
    VideoMetadata { path: PathBuf, reason: String },

    /// Destination content did not match the source after a copy
    #[error("hash verification failed after copy {src} -> {dest}")]
    HashVerification { src: PathBuf, dest: PathBuf },

    /// Hardlink preflight failed for a library root
    #[error("hardlink not supported from {src_dir} to {dest_dir}: {reason}")]
    HardlinkUnsupported {
        src_dir: PathBuf,
        dest_dir: PathBuf,
        reason: String,
    },

    /// A non-media path reached a stage that only accepts images and videos
    #[error("non-media file passed to path planner: {0}")]
    NotMedia(PathBuf),

    /// The circuit breaker stopped the run
    #[error("import aborted: {0}")]
    Aborted(String),
}

/// Result type alias for shoebox-core
pub type Result<T> = std::result::Result<T, Error>;
