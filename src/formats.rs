//! Static format tables: which extensions belong to which media category,
//! which files intake accepts, and which targets each source may pick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Extensions offered as image targets.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "ico", "tif", "tiff", "svg", "raw", "tga",
];

/// Extensions offered as video targets and recognised as video containers.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mp4v", "3gp", "3g2", "avi", "mov", "wmv", "mkv", "flv", "ogv", "webm", "h264",
    "264", "hevc", "265",
];

/// Extensions offered as audio targets.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "aac", "wma", "flac", "m4a"];

/// Image extensions accepted at intake. Narrower than [`IMAGE_EXTENSIONS`]:
/// vector and unknown image types are rejected.
pub const INTAKE_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "ico", "tif", "tiff", "raw", "tga",
];

/// Document sources handled by the document and PDF engines.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "md", "markdown", "html", "htm", "txt", "docx"];

/// Raster formats a video frame can be extracted into.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Broad category of a queued file. Drives the target picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Audio => "audio",
            MediaCategory::Document => "document",
        };
        f.write_str(s)
    }
}

fn contains(table: &[&str], ext: &str) -> bool {
    table.iter().any(|e| e.eq_ignore_ascii_case(ext))
}

/// Is `ext` a recognised video container?
pub fn is_video(ext: &str) -> bool {
    contains(VIDEO_EXTENSIONS, ext)
}

/// Is `ext` a recognised audio format?
pub fn is_audio(ext: &str) -> bool {
    contains(AUDIO_EXTENSIONS, ext)
}

/// Is `ext` a still-image format a video frame can be written as?
pub fn is_still_image(ext: &str) -> bool {
    contains(FRAME_EXTENSIONS, ext)
}

/// Is `ext` on the intake image allow-list?
pub fn is_intake_image(ext: &str) -> bool {
    contains(INTAKE_IMAGE_EXTENSIONS, ext)
}

/// Is `ext` a document source?
pub fn is_document(ext: &str) -> bool {
    contains(DOCUMENT_EXTENSIONS, ext)
}

/// Targets the picker offers for a file of `category` with `source_ext`.
pub fn targets_for(category: MediaCategory, source_ext: &str) -> Vec<&'static str> {
    match category {
        MediaCategory::Image => IMAGE_EXTENSIONS.to_vec(),
        MediaCategory::Video => VIDEO_EXTENSIONS
            .iter()
            .chain(AUDIO_EXTENSIONS)
            .chain(FRAME_EXTENSIONS)
            .copied()
            .collect(),
        MediaCategory::Audio => AUDIO_EXTENSIONS.to_vec(),
        MediaCategory::Document => match source_ext.to_ascii_lowercase().as_str() {
            "pdf" => vec!["png", "jpg", "jpeg"],
            "md" | "markdown" => vec!["pdf", "html"],
            "html" | "htm" => vec!["pdf"],
            "txt" => vec!["pdf"],
            "docx" => vec!["pdf", "html", "md"],
            _ => Vec::new(),
        },
    }
}

/// MIME type for a payload with the given extension.
pub fn media_type_for(ext: &str) -> String {
    mime_guess::from_ext(ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
