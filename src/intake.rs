//! Intake: load user-supplied paths or URLs into memory and apply the
//! allow-list.
//!
//! Every source is read fully into a [`SourceFile`] up front. The engines
//! all consume byte buffers, and holding the bytes means a file that is
//! moved or deleted after intake still converts.

use crate::error::MorphError;
use crate::filename;
use crate::formats::{self, MediaCategory};
use std::path::PathBuf;
use tracing::{debug, info};

/// One file handed to the session: name, declared media type and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    /// Build a source from in-memory bytes, guessing the media type from the
    /// name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            media_type,
            bytes,
        }
    }

    /// Override the declared media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Extension of the name, as written.
    pub fn extension(&self) -> &str {
        filename::extension(&self.name)
    }
}

/// Check a source against the intake allow-list and return its category.
///
/// Images must be on the exact allow-list. Any `audio/*` or `video/*` type
/// is accepted, as is any extension in the audio or video tables. Documents
/// are accepted by extension.
pub fn admit(source: &SourceFile) -> Result<MediaCategory, MorphError> {
    let ext = source.extension().to_ascii_lowercase();
    let media_type = source.media_type.to_ascii_lowercase();

    if formats::is_intake_image(&ext) {
        return Ok(MediaCategory::Image);
    }
    if media_type.starts_with("image/") {
        return Err(MorphError::IntakeRejected {
            name: source.name.clone(),
            reason: format!("image type '.{ext}' is not supported"),
        });
    }
    if media_type.starts_with("video/") {
        return Ok(MediaCategory::Video);
    }
    if media_type.starts_with("audio/") {
        return Ok(MediaCategory::Audio);
    }
    // Raw streams such as .264 and .hevc have no registered media type.
    if formats::is_video(&ext) {
        return Ok(MediaCategory::Video);
    }
    if formats::is_audio(&ext) {
        return Ok(MediaCategory::Audio);
    }
    if formats::is_document(&ext) {
        return Ok(MediaCategory::Document);
    }
    Err(MorphError::IntakeRejected {
        name: source.name.clone(),
        reason: format!("unsupported file type '{media_type}'"),
    })
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory source file.
///
/// URLs are downloaded; anything else is read as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceFile, MorphError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O failures to intake errors.
async fn read_local(path_str: &str) -> Result<SourceFile, MorphError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(MorphError::PermissionDenied { path });
        }
        Err(_) => return Err(MorphError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(name, bytes))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceFile, MorphError> {
    info!("Downloading from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MorphError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MorphError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MorphError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(MorphError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty() && v != "application/octet-stream");

    let name = filename_from_url(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MorphError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} ({} bytes)", name, bytes.len());

    let source = SourceFile::new(name, bytes.to_vec());
    Ok(match content_type {
        Some(ct) => source.with_media_type(ct),
        None => source,
    })
}

/// Take the last path segment of the URL as the file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/clip.mp4"));
        assert!(is_url("http://example.com/clip.mp4"));
        assert!(!is_url("/tmp/clip.mp4"));
        assert!(!is_url("clip.mp4"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_comes_from_last_segment() {
        assert_eq!(filename_from_url("https://example.com/a/b/song.mp3?x=1"), "song.mp3");
        assert_eq!(filename_from_url("https://example.com/"), "download");
    }

    #[test]
    fn media_type_is_guessed_from_name() {
        assert_eq!(SourceFile::new("photo.png", vec![]).media_type, "image/png");
        assert_eq!(SourceFile::new("clip.mp4", vec![]).media_type, "video/mp4");
    }

    #[test]
    fn admit_accepts_listed_images_audio_video_and_documents() {
        let cases = [
            ("photo.png", MediaCategory::Image),
            ("scan.TIFF", MediaCategory::Image),
            ("clip.mkv", MediaCategory::Video),
            ("song.flac", MediaCategory::Audio),
            ("invoice.pdf", MediaCategory::Document),
            ("notes.md", MediaCategory::Document),
            ("report.docx", MediaCategory::Document),
        ];
        for (name, expected) in cases {
            let src = SourceFile::new(name, vec![]);
            assert_eq!(admit(&src).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn admit_accepts_every_listed_video_and_audio_extension() {
        for ext in formats::VIDEO_EXTENSIONS {
            let src = SourceFile::new(format!("clip.{ext}"), vec![]);
            assert_eq!(admit(&src).ok(), Some(MediaCategory::Video), "{ext} ({})", src.media_type);
        }
        for ext in formats::AUDIO_EXTENSIONS {
            let src = SourceFile::new(format!("track.{ext}"), vec![]);
            assert_eq!(admit(&src).ok(), Some(MediaCategory::Audio), "{ext} ({})", src.media_type);
        }
    }

    #[test]
    fn admit_rejects_unlisted_images_and_unknown_types() {
        let svg = SourceFile::new("logo.svg", vec![]);
        assert!(matches!(admit(&svg), Err(MorphError::IntakeRejected { .. })));

        let exe = SourceFile::new("setup.exe", vec![]);
        assert!(matches!(admit(&exe), Err(MorphError::IntakeRejected { .. })));
    }

    #[test]
    fn declared_type_wins_for_audio_and_video() {
        let src = SourceFile::new("stream", vec![]).with_media_type("video/webm");
        assert_eq!(admit(&src).unwrap(), MediaCategory::Video);
    }

    #[tokio::test]
    async fn missing_local_file_is_reported() {
        let err = resolve_input("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, MorphError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_with_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# hi").unwrap();

        let src = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(src.name, "notes.md");
        assert_eq!(src.size(), 4);
        assert_eq!(src.bytes, b"# hi");
    }
}
