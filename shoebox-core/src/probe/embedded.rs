//! Embedded EXIF decoder for common image containers
//!
//! Handles the formats the `kamadak-exif` reader decodes natively, so most
//! straight-off-the-camera JPEGs never pay the subprocess round-trip.

use crate::error::{Error, Result};
use crate::probe::parse_exif_timestamp;
use chrono::{DateTime, Utc};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF date fields in priority order.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

/// Read the capture timestamp from the file's EXIF block.
pub(crate) fn capture_timestamp(path: &Path) -> Result<DateTime<Utc>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::MetadataTool(format!("decoding EXIF from {}: {}", path.display(), e)))?;

    for tag in DATE_TAGS {
        let Some(field) = exif.get_field(tag, In::PRIMARY) else {
            continue;
        };
        let raw = match &field.value {
            Value::Ascii(chunks) if !chunks.is_empty() => {
                String::from_utf8_lossy(&chunks[0]).into_owned()
            }
            _ => continue,
        };
        if let Some(t) = parse_exif_timestamp(&raw) {
            return Ok(t);
        }
    }

    Err(Error::NoCaptureDate(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn non_image_bytes_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_really.jpg");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"plain text, no EXIF container here").unwrap();

        let err = capture_timestamp(&path).unwrap_err();
        assert!(matches!(err, Error::MetadataTool(_)));
    }
}
