//! Destination path planning
//!
//! Maps `(media type, capture date, confidence, user)` to the canonical
//! library path. Confident dates get the `YYYY/MM/DD` partition; everything
//! else lands under `noexif/YYYY-MM`. The basename is carried verbatim from
//! the source; renaming on collision is the collision resolver's job.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{DateConfidence, MediaType};
use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};

/// Compute the canonical destination for a source file.
pub fn plan_destination(
    src: &Path,
    date: DateTime<Utc>,
    confidence: DateConfidence,
    media: MediaType,
    cfg: &Config,
    user: &str,
) -> Result<PathBuf> {
    let basename = src
        .file_name()
        .ok_or_else(|| Error::NotMedia(src.to_path_buf()))?;

    let library = match media {
        MediaType::Image => &cfg.library,
        MediaType::Video => &cfg.videolibrary,
        MediaType::Other => return Err(Error::NotMedia(src.to_path_buf())),
    };

    let dest_dir = if confidence.is_confident() {
        library
            .join(user)
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}", date.day()))
    } else {
        library
            .join(user)
            .join("noexif")
            .join(format!("{:04}-{:02}", date.year(), date.month()))
    };

    Ok(dest_dir.join(basename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config() -> Config {
        Config {
            library: PathBuf::from("/lib/images"),
            videolibrary: PathBuf::from("/lib/videos"),
            ..Config::default()
        }
    }

    fn march_9() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 22).unwrap()
    }

    #[test]
    fn test_confident_image_path() {
        let dest = plan_destination(
            Path::new("/in/photo.jpg"),
            march_9(),
            DateConfidence::High,
            MediaType::Image,
            &test_config(),
            "val",
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/lib/images/val/2024/03/09/photo.jpg"));
    }

    #[test]
    fn test_confident_video_path_uses_video_library() {
        let dest = plan_destination(
            Path::new("/in/clip.mp4"),
            march_9(),
            DateConfidence::Medium,
            MediaType::Video,
            &test_config(),
            "val",
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/lib/videos/val/2024/03/09/clip.mp4"));
    }

    #[test]
    fn test_low_confidence_routes_to_noexif() {
        let dest = plan_destination(
            Path::new("/in/photo.jpg"),
            march_9(),
            DateConfidence::Low,
            MediaType::Image,
            &test_config(),
            "val",
        )
        .unwrap();
        assert_eq!(dest, PathBuf::from("/lib/images/val/noexif/2024-03/photo.jpg"));
    }

    #[test]
    fn test_basename_is_kept_verbatim() {
        let dest = plan_destination(
            Path::new("/in/Weird Name (1).JPG"),
            march_9(),
            DateConfidence::High,
            MediaType::Image,
            &test_config(),
            "val",
        )
        .unwrap();
        assert_eq!(dest.file_name().unwrap(), "Weird Name (1).JPG");
    }

    #[test]
    fn test_other_is_rejected() {
        let err = plan_destination(
            Path::new("/in/notes.txt"),
            march_9(),
            DateConfidence::High,
            MediaType::Other,
            &test_config(),
            "val",
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotMedia(_)));
    }
}
