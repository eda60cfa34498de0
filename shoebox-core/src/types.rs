//! Core domain types for shoebox
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Library** | Destination root for canonical media; one root for images, one for videos (may coincide) |
//! | **Capture timestamp** | The instant a photo/video was recorded, as best we can determine |
//! | **Confidence** | How trustworthy the derived capture timestamp is; drives library routing |
//! | **Session** | One invocation of the import driver, with its own manifest and browse tree |
//! | **Materialize** | Place a byte-equivalent copy of a source file into the library |

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================
// Media classification
// ============================================

/// What kind of media a source path holds, by extension.
///
/// A closed set on purpose: routing decisions match exhaustively on it, so
/// adding a new kind is a compile-checked change in the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    /// Anything else; ignored by the ingest core.
    Other,
}

impl MediaType {
    /// Classify a path by its lowercased extension against the configured sets.
    pub fn classify(path: &Path, cfg: &Config) -> Self {
        let Some(ext) = lowercase_extension(path) else {
            return MediaType::Other;
        };

        if cfg.image_extensions.iter().any(|e| *e == ext) {
            return MediaType::Image;
        }
        if cfg.video_extensions.iter().any(|e| *e == ext) {
            return MediaType::Video;
        }
        MediaType::Other
    }

    pub fn is_media(&self) -> bool {
        !matches!(self, MediaType::Other)
    }
}

/// Lowercased extension with leading dot (`".jpg"`), or `None` when absent.
pub(crate) fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
}

// ============================================
// Date confidence
// ============================================

/// How reliable a derived capture timestamp is.
///
/// Ordered from most to least trustworthy; the resolver returns the first
/// level that succeeds. `High` and `Medium` route into the date-partitioned
/// tree, everything below goes to `noexif`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateConfidence {
    /// Container/EXIF metadata
    High,
    /// Filename-pattern parse
    Medium,
    /// File modification time
    Low,
    /// Nothing worked
    VeryLow,
}

impl DateConfidence {
    /// True for the grades that earn a `YYYY/MM/DD` destination.
    pub fn is_confident(&self) -> bool {
        matches!(self, DateConfidence::High | DateConfidence::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DateConfidence::High => "high",
            DateConfidence::Medium => "medium",
            DateConfidence::Low => "low",
            DateConfidence::VeryLow => "very_low",
        }
    }
}

impl std::fmt::Display for DateConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Session statistics
// ============================================

/// Counters for one import session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    /// Media files found by the input scan
    pub total_scanned: usize,
    /// Files materialized at their canonical destination
    pub copied: usize,
    /// Files materialized under a timestamp-suffixed name after a collision
    pub copied_timestamped: usize,
    /// Files whose content already existed in the destination directory
    pub skipped_duplicate: usize,
    /// Files that produced an error event
    pub errors: usize,
}

impl ImportStats {
    /// Number of files that produced any manifest event.
    pub fn events(&self) -> usize {
        self.copied + self.copied_timestamped + self.skipped_duplicate + self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            image_extensions: vec![".jpg".into(), ".png".into()],
            video_extensions: vec![".mp4".into(), ".mov".into()],
            ..Config::default()
        }
    }

    #[test]
    fn classify_by_lowercased_extension() {
        let cfg = test_config();
        assert_eq!(
            MediaType::classify(Path::new("/a/photo.JPG"), &cfg),
            MediaType::Image
        );
        assert_eq!(
            MediaType::classify(Path::new("clip.Mp4"), &cfg),
            MediaType::Video
        );
        assert_eq!(
            MediaType::classify(Path::new("notes.txt"), &cfg),
            MediaType::Other
        );
        assert_eq!(
            MediaType::classify(Path::new("no_extension"), &cfg),
            MediaType::Other
        );
    }

    #[test]
    fn confidence_ordering_and_routing() {
        assert!(DateConfidence::High < DateConfidence::Medium);
        assert!(DateConfidence::Medium < DateConfidence::Low);
        assert!(DateConfidence::High.is_confident());
        assert!(DateConfidence::Medium.is_confident());
        assert!(!DateConfidence::Low.is_confident());
        assert!(!DateConfidence::VeryLow.is_confident());
    }

    #[test]
    fn stats_event_total() {
        let stats = ImportStats {
            total_scanned: 10,
            copied: 5,
            copied_timestamped: 1,
            skipped_duplicate: 3,
            errors: 1,
        };
        assert_eq!(stats.events(), 10);
    }
}
