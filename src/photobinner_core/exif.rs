use exiftool::ExifTool;
use serde::Deserialize;
use std::path::Path;
use time::PrimitiveDateTime;
use time::format_description::FormatItem;

use crate::photobinner_core::error::{PhotobinnerError, Result};

/// Date format used in EXIF data.
const EXIF_DATE_FORMAT: &[FormatItem] =
    time::macros::format_description!("[year]:[month]:[day] [hour]:[minute]:[second]");

/// Some cameras pad the seconds with a space ("2010:10:24 15:23: 2").
const EXIF_SPACED_SECOND_FORMAT: &[FormatItem] = time::macros::format_description!(
    "[year]:[month]:[day] [hour]:[minute]: [second padding:none]"
);

/// Raw tags requested from exiftool.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "PascalCase")]
struct RawExifInfo {
    #[serde(default)]
    modify_date: Option<String>,
    #[serde(default)]
    date_time_original: Option<String>,
    #[serde(default)]
    make: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

/// Camera identification from metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub make: String,
    pub model: String,
}

/// What the core needs from a file's embedded metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Capture timestamp with no zone attached; the extractor decides the offset.
    pub capture_date: Option<PrimitiveDateTime>,
    pub camera: Option<CameraInfo>,
}

/// Reads embedded metadata. Implementations must not fail: unreadable
/// metadata is simply absent.
pub trait MetadataReader {
    fn read(&mut self, path: &Path) -> MediaMetadata;
}

/// `MetadataReader` backed by a long-running exiftool process.
pub struct ExifToolReader {
    exiftool: ExifTool,
}

impl ExifToolReader {
    pub fn new() -> Result<Self> {
        let exiftool = ExifTool::new().map_err(|e| PhotobinnerError::Exiftool(e.to_string()))?;
        Ok(Self { exiftool })
    }
}

impl MetadataReader for ExifToolReader {
    fn read(&mut self, path: &Path) -> MediaMetadata {
        let raw: RawExifInfo = match self.exiftool.read_metadata(path, &[]) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Failed to read metadata for {}: {}", path.display(), e);
                return MediaMetadata::default();
            }
        };
        log::debug!("Full exif info: {:?}", raw);
        metadata_from_raw(raw)
    }
}

/// Used when exiftool is not installed; every file then lacks a metadata date.
#[derive(Debug, Default)]
pub struct NoMetadata;

impl MetadataReader for NoMetadata {
    fn read(&mut self, _path: &Path) -> MediaMetadata {
        MediaMetadata::default()
    }
}

fn metadata_from_raw(raw: RawExifInfo) -> MediaMetadata {
    let capture_date = [raw.modify_date.as_deref(), raw.date_time_original.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|value| match parse_exif_date(value) {
            Ok(date) => Some(date),
            Err(e) => {
                log::warn!(" - failed to parse '{}': {}", value, e);
                None
            }
        });

    let camera = match (raw.make, raw.model) {
        (Some(make), Some(model)) if !make.trim().is_empty() && !model.trim().is_empty() => {
            Some(CameraInfo {
                make: make.trim().to_string(),
                model: model.trim().to_string(),
            })
        }
        _ => None,
    };

    MediaMetadata {
        capture_date,
        camera,
    }
}

/// Parse an EXIF date string, tolerating the space-padded seconds variant.
pub fn parse_exif_date(value: &str) -> std::result::Result<PrimitiveDateTime, time::error::Parse> {
    let value = value.trim();
    PrimitiveDateTime::parse(value, EXIF_DATE_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(value, EXIF_SPACED_SECOND_FORMAT))
}

/// Check if exiftool is available on the system.
pub fn exiftool_available() -> bool {
    std::process::Command::new("exiftool")
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
