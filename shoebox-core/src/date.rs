//! Capture date resolution
//!
//! Combines the metadata probe, filename-pattern parsing, and the file
//! modification time into a `(timestamp, confidence)` pair. Sources are tried
//! strictly in order of trustworthiness and the first success wins; there is
//! no cross-checking between sources.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::probe;
use crate::types::{DateConfidence, MediaType};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Filename patterns ordered by frequency (most common first).
///
/// Generic camera-style stamps come before the messaging-app exports; the
/// app patterns are case-insensitive because exports get renamed by tools
/// that disagree about casing.
static FILENAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Generic patterns
        r"(\d{4})(\d{2})(\d{2})[_-](\d{2})(\d{2})(\d{2})", // 20240315_143022
        r"IMG[_-](\d{4})(\d{2})(\d{2})[_-](\d{2})(\d{2})(\d{2})", // IMG_20240315_143022
        r"(\d{4})[_-](\d{2})[_-](\d{2})[_-](\d{2})[_-](\d{2})[_-](\d{2})", // 2024-03-15-14-30-22
        r"(\d{4})[_-](\d{2})[_-](\d{2})",                  // 2024-03-15
        r"(\d{8})",                                        // 20240315
        // App-specific patterns
        r"(?i)(IMG|VID)[_-](\d{4})(\d{2})(\d{2})[_-]WA\d+", // WhatsApp: IMG-20240315-WA0001
        r"(?i)signal[_-](\d{4})(\d{2})(\d{2})[_-](\d{2})(\d{2})(\d{2})", // Signal
        r"(?i)inshot[_-](\d{4})(\d{2})(\d{2})[_-](\d{2})(\d{2})(\d{2})", // InShot
        r"(?i)telegram[_-](\d{4})[_-](\d{2})[_-](\d{2})[_-](\d{2})[_-](\d{2})[_-](\d{2})", // Telegram datetime
        r"(?i)telegram[_-](\d{4})[_-](\d{2})[_-](\d{2})", // Telegram date only
    ]
    .iter()
    .map(|p| Regex::new(p).expect("filename pattern is valid"))
    .collect()
});

/// Derive the best available capture date for a file.
///
/// 1. Container metadata via the probe (`High`)
/// 2. Filename pattern (`Medium`)
/// 3. File modification time (`Low`)
///
/// Fails only when every source fails, which in practice means the file
/// disappeared between the scan and this call.
pub fn best_date(path: &Path, cfg: &Config) -> Result<(DateTime<Utc>, DateConfidence)> {
    let media = MediaType::classify(path, cfg);

    if media.is_media() {
        match probe::capture_timestamp(path, cfg.use_exiftool) {
            Ok(t) => return Ok((t, DateConfidence::High)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No metadata date");
            }
        }
    }

    if let Some(t) = parse_filename_date(path) {
        return Ok((t, DateConfidence::Medium));
    }

    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| Error::NoDate {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((modified.into(), DateConfidence::Low))
}

/// Try to extract a date from the basename using the known patterns.
pub fn parse_filename_date(path: &Path) -> Option<DateTime<Utc>> {
    let base = path.file_name()?.to_str()?;

    for pattern in FILENAME_PATTERNS.iter() {
        let Some(caps) = pattern.captures(base) else {
            continue;
        };
        if let Some(t) = date_from_captures(&caps) {
            return Some(t);
        }
        // Fields matched but failed validation; try the next pattern.
    }

    None
}

/// Pull `(year, month, day[, hour, minute, second])` out of a capture set.
///
/// The year group is found by position-independent scan so app-prefix groups
/// (`IMG`, `VID`) don't shift the date fields.
fn date_from_captures(caps: &regex::Captures<'_>) -> Option<DateTime<Utc>> {
    let group = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");
    let groups = caps.len() - 1;

    // Find the 4-digit year group, skipping app prefixes
    let year_idx = (1..caps.len())
        .find(|&i| {
            let g = group(i);
            g.len() == 4 && g.starts_with('2')
        })
        .unwrap_or(1);

    let (year, month, day, hour, minute, second);

    if year_idx + 2 < caps.len() {
        year = group(year_idx).parse::<i32>().ok()?;
        month = group(year_idx + 1).parse::<u32>().ok()?;
        day = group(year_idx + 2).parse::<u32>().ok()?;

        if year_idx + 5 < caps.len() {
            hour = group(year_idx + 3).parse().unwrap_or(12);
            minute = group(year_idx + 4).parse().unwrap_or(0);
            second = group(year_idx + 5).parse().unwrap_or(0);
        } else {
            // Date-only pattern: default to noon
            (hour, minute, second) = (12, 0, 0);
        }
    } else if groups == 1 && group(1).len() == 8 {
        // Bare YYYYMMDD
        let digits = group(1);
        year = digits[0..4].parse().ok()?;
        month = digits[4..6].parse().ok()?;
        day = digits[6..8].parse().ok()?;
        (hour, minute, second) = (12, 0, 0);
    } else {
        return None;
    }

    if !(1990..=2050).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}
