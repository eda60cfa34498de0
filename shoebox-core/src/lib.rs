//! # shoebox-core
//!
//! Core library for shoebox - a one-shot media ingestion engine.
//!
//! Given a source tree of images and videos of mixed provenance, the ingest
//! driver produces a canonical library organized by capture date under a
//! per-user root, preserving every bit of unique content:
//!
//! - Capture dates come from container metadata, filename patterns, or the
//!   file modification time, each with a confidence grade that decides
//!   between the `YYYY/MM/DD` partition and the `noexif` subtree.
//! - Name collisions are resolved by content hash only; differing content is
//!   kept under a timestamp-suffixed sibling, never replaced.
//! - Materialization is an atomic copy with independent hash verification
//!   (or a hardlink), and every outcome lands in an append-only, fsynced
//!   JSON-Lines session manifest alongside a browse tree of hardlinks.
//!
//! ## Example
//!
//! ```rust,no_run
//! use shoebox_core::{Config, Importer};
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//! let outcome = Importer::new(&config)
//!     .run(Path::new("/media/sdcard"), |_event| {})
//!     .expect("import failed");
//! println!("copied {} files", outcome.stats.copied);
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{ImportOutcome, Importer, ProgressEvent, ProgressUpdate};
pub use types::{DateConfidence, ImportStats, MediaType};

// Public modules
pub mod collision;
pub mod config;
pub mod date;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod materialize;
pub mod plan;
pub mod probe;
pub mod session;
pub mod triage;
pub mod types;
