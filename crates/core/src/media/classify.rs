//! Media classification from a path or URL string.
//!
//! Classification is by suffix only (case-insensitive). Content is never
//! inspected and URLs are never fetched.

use std::collections::HashSet;
use std::path::Path;

use crate::types::MediaKind;

lazy_static::lazy_static! {
    static ref VIDEO_EXTENSIONS: HashSet<&'static str> =
        ["mp4", "mov", "avi", "mkv", "flv", "wmv", "webm", "m4v"].into_iter().collect();

    static ref IMAGE_EXTENSIONS: HashSet<&'static str> =
        ["jpg", "jpeg", "png", "gif", "bmp", "webp"].into_iter().collect();
}

/// True for `http://` and `https://` references.
pub fn is_url(source: &str) -> bool {
    let s = source.trim_start();
    s.starts_with("http://") || s.starts_with("https://")
}

/// Classify by suffix alone. Total and idempotent.
pub fn classify(path_or_url: &str) -> MediaKind {
    let trimmed = path_or_url.trim();
    if trimmed.is_empty() {
        return MediaKind::Unknown;
    }

    let path_part = if is_url(trimmed) {
        // Drop query string and fragment so "clip.mp4?sig=..." still matches
        let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
        &trimmed[..end]
    } else {
        trimmed
    };

    match extension_of(path_part) {
        Some(ext) if VIDEO_EXTENSIONS.contains(ext.as_str()) => MediaKind::Video,
        Some(ext) if IMAGE_EXTENSIONS.contains(ext.as_str()) => MediaKind::Image,
        _ => MediaKind::Unknown,
    }
}

/// Like [`classify`], but a local (non-URL) reference must also be an
/// existing regular file to count as Video or Image.
pub fn classify_local(path_or_url: &str) -> MediaKind {
    let trimmed = path_or_url.trim();
    if is_url(trimmed) {
        return classify(trimmed);
    }
    if trimmed.is_empty() || !Path::new(trimmed).is_file() {
        return MediaKind::Unknown;
    }
    classify(trimmed)
}

pub fn is_video(path_or_url: &str) -> bool {
    classify(path_or_url) == MediaKind::Video
}

pub fn is_image(path_or_url: &str) -> bool {
    classify(path_or_url) == MediaKind::Image
}

/// Lowercased extension of the last path segment.
fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
