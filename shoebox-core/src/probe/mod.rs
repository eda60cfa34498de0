//! Metadata probe
//!
//! Extracts capture timestamps (and, for quality queries, resolution and
//! duration) from media files. Two backends:
//!
//! - an embedded EXIF decoder for the common image containers, and
//! - the long-lived external `exiftool` child for everything else.
//!
//! The embedded set is deliberately small; anything outside it, and anything
//! the embedded decoder stumbles on, goes to the external tool.

mod embedded;
pub mod exiftool;

use crate::error::{Error, Result};
use crate::types::lowercase_extension;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Containers the embedded decoder handles.
const EMBEDDED_DECODER_EXTS: &[&str] = &[".jpg", ".jpeg", ".tiff", ".tif", ".cr2", ".nef"];

/// External-tool date tags, in priority order.
const EXTERNAL_DATE_TAGS: &[&str] = &[
    "DateTimeOriginal",
    "CreateDate",
    "CreationDate",
    "TrackCreateDate",
    "MediaCreateDate",
];

/// Resolution and duration of a video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

/// Read the capture timestamp from a media file.
///
/// With `force_external` set, or for any container outside the embedded set,
/// the external tool is queried directly; otherwise the embedded decoder is
/// tried first and the external tool is the fallback.
pub fn capture_timestamp(path: &Path, force_external: bool) -> Result<DateTime<Utc>> {
    let ext = lowercase_extension(path).unwrap_or_default();

    if force_external || !EMBEDDED_DECODER_EXTS.contains(&ext.as_str()) {
        return capture_timestamp_external(path);
    }

    match embedded::capture_timestamp(path) {
        Ok(t) => Ok(t),
        Err(e) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Embedded EXIF decode failed, falling back to exiftool"
            );
            capture_timestamp_external(path)
        }
    }
}

fn capture_timestamp_external(path: &Path) -> Result<DateTime<Utc>> {
    let values = exiftool::with_shared(|tool| tool.tags(path, EXTERNAL_DATE_TAGS))?;

    for tag in EXTERNAL_DATE_TAGS {
        if let Some(t) = values.get(*tag).and_then(|raw| parse_exif_timestamp(raw)) {
            return Ok(t);
        }
    }

    Err(Error::NoCaptureDate(path.to_path_buf()))
}

/// Batch capture-timestamp extraction through the external tool.
///
/// One lock acquisition for the whole batch; paths that yield no parseable
/// timestamp are simply absent from the result.
pub fn capture_timestamps(paths: &[PathBuf]) -> Result<HashMap<PathBuf, DateTime<Utc>>> {
    if paths.is_empty() {
        return Ok(HashMap::new());
    }

    exiftool::with_shared(|tool| {
        let mut results = HashMap::new();
        for path in paths {
            let values = match tool.tags(path, EXTERNAL_DATE_TAGS) {
                Ok(values) => values,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Batch extraction skipped file");
                    continue;
                }
            };
            let parsed = EXTERNAL_DATE_TAGS
                .iter()
                .find_map(|tag| values.get(*tag).and_then(|raw| parse_exif_timestamp(raw)));
            if let Some(t) = parsed {
                results.insert(path.clone(), t);
            }
        }
        Ok(results)
    })
}

/// Read a video's dimensions and duration through the external tool.
///
/// Missing dimensions or an unparseable duration are failures; callers use
/// this for quality queries and need all three values to mean anything.
pub fn video_metadata(path: &Path) -> Result<VideoMetadata> {
    let values = exiftool::with_shared(|tool| {
        tool.tags(path, &["ImageWidth", "ImageHeight", "Duration"])
    })?;

    let dimension = |tag: &str| -> Option<u32> { values.get(tag).and_then(|v| v.parse().ok()) };

    let (Some(width), Some(height)) = (dimension("ImageWidth"), dimension("ImageHeight")) else {
        return Err(Error::VideoMetadata {
            path: path.to_path_buf(),
            reason: "missing video dimensions".to_string(),
        });
    };

    let duration_seconds = match values.get("Duration") {
        Some(raw) => parse_duration(raw).ok_or_else(|| Error::VideoMetadata {
            path: path.to_path_buf(),
            reason: format!("unparseable duration {:?}", raw),
        })?,
        None => 0.0,
    };

    Ok(VideoMetadata {
        width,
        height,
        duration_seconds,
    })
}

/// Header-only image dimensions, for quality queries.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path)
        .map_err(|e| Error::MetadataTool(format!("reading dimensions of {}: {}", path.display(), e)))
}

/// Close the shared external tool. Called once on driver teardown.
pub fn close() {
    exiftool::close_shared();
}

/// Parse the timestamp formats the metadata sources emit.
///
/// EXIF prefers colons in the date part (`2024:03:15 14:30:22`); some
/// containers use hyphens, carry a zone offset, or truncate to date-only.
/// Naive values are taken as UTC, date-only values as midnight.
pub(crate) fn parse_exif_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let clean = raw.trim().trim_matches('"').trim_end_matches('\0').trim();
    if clean.is_empty() {
        return None;
    }

    const ZONED_FORMATS: &[&str] = &["%Y:%m:%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%:z"];
    for format in ZONED_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(clean, format) {
            return Some(t.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y:%m:%d %H:%M:%S",
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(clean, format) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }

    NaiveDate::parse_from_str(clean, "%Y:%m:%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| Utc.from_utc_datetime(&t))
}

/// Convert the duration forms exiftool emits to seconds.
///
/// Accepts plain seconds (`83`, `83.5`, `6.27 s`), `mm:ss` and `hh:mm:ss`.
pub(crate) fn parse_duration(raw: &str) -> Option<f64> {
    let clean = raw.trim().trim_end_matches('s').trim_end();
    if clean.is_empty() {
        return None;
    }

    if clean.contains(':') {
        let parts: Vec<&str> = clean.split(':').collect();
        return match parts.as_slice() {
            [m, s] => {
                let minutes: u32 = m.parse().ok()?;
                let seconds: f64 = s.parse().ok()?;
                Some(f64::from(minutes) * 60.0 + seconds)
            }
            [h, m, s] => {
                let hours: u32 = h.parse().ok()?;
                let minutes: u32 = m.parse().ok()?;
                let seconds: f64 = s.parse().ok()?;
                Some(f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
            }
            _ => None,
        };
    }

    clean.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_exif_timestamp_formats() {
        let cases = [
            ("2024:03:15 14:30:22", "2024-03-15T14:30:22+00:00"),
            ("2024:03:15 14:30:22+02:00", "2024-03-15T12:30:22+00:00"),
            ("2024:03:15 14:30:22.123", "2024-03-15T14:30:22.123+00:00"),
            ("2024-03-15 14:30:22", "2024-03-15T14:30:22+00:00"),
            ("2024-03-15 14:30:22-05:00", "2024-03-15T19:30:22+00:00"),
            ("2024:03:15", "2024-03-15T00:00:00+00:00"),
            ("\"2024:03:15 14:30:22\"", "2024-03-15T14:30:22+00:00"),
        ];
        for (raw, expected) in cases {
            let parsed = parse_exif_timestamp(raw)
                .unwrap_or_else(|| panic!("expected {:?} to parse", raw));
            assert_eq!(parsed.to_rfc3339(), expected, "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_exif_timestamp_rejects_garbage() {
        for raw in ["", "   ", "not a date", "2024:99:99 10:00:00", "15/03/2024"] {
            assert!(parse_exif_timestamp(raw).is_none(), "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_exif_timestamp_nul_terminated() {
        // Raw EXIF ASCII values are NUL-terminated
        let parsed = parse_exif_timestamp("2024:03:15 14:30:22\0").unwrap();
        assert_eq!(parsed.hour(), 14);
    }

    #[test]
    fn test_parse_duration() {
        let cases = [
            ("83.5", Some(83.5)),
            ("83", Some(83.0)),
            ("6.27 s", Some(6.27)),
            ("0:01:23", Some(83.0)),
            ("01:23", Some(83.0)),
            ("2:10:05", Some(7805.0)),
            ("", None),
            ("abc", None),
            ("1:2:3:4", None),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse_duration(raw), expected, "input {:?}", raw);
        }
    }

    #[test]
    fn test_embedded_set_routing() {
        for ext in EMBEDDED_DECODER_EXTS {
            assert!(ext.starts_with('.'));
            assert_eq!(ext.to_ascii_lowercase(), **ext);
        }
        // The set is the embedded decoder's formats, not the media classification
        assert!(!EMBEDDED_DECODER_EXTS.contains(&".png"));
        assert!(!EMBEDDED_DECODER_EXTS.contains(&".mp4"));
    }
}
