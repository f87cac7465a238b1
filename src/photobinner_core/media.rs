use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

/// Image file extensions (lowercase).
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "psd", "heic",
    // RAW formats
    "raw", "crw", "cr2", "nef", "dng",
];

/// Video file extensions (lowercase).
const VIDEO_EXTENSIONS: &[&str] = &["mov", "avi", "mp4", "m4v", "mts", "3gp"];

const AUDIO_EXTENSIONS: &[&str] = &["mp3"];

/// Classify a path by extension. AppleDouble `._` files are never media.
pub fn detect_media_type(path: &Path) -> Option<MediaType> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with("._") {
        return None;
    }

    let ext = path.extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Audio)
    } else {
        None
    }
}

pub fn is_media_file(path: &Path) -> bool {
    detect_media_type(path).is_some()
}
