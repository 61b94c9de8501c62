//! Error types for the metamorpher library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MorphError`]: **Action-level**: the requested action (intake, batch
//!   start, download) cannot proceed at all. Nothing is changed when one of
//!   these is returned, and the session stays usable.
//!
//! * [`ConversionError`]: **Per-task**: one file's engine call failed. It is
//!   caught inside the batch loop, stored on the
//!   [`crate::session::ConversionTask`], and never aborts the rest of the
//!   queue.

use std::path::PathBuf;
use thiserror::Error;

/// All action-level errors returned by the metamorpher library.
///
/// Task-level failures use [`ConversionError`] and are stored on the task
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum MorphError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The file type is not on the intake allow-list.
    #[error("Cannot accept '{name}': {reason}\nAllowed files: audio, video, images and documents (pdf, md, html, txt, docx).")]
    IntakeRejected { name: String, reason: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Queue errors ──────────────────────────────────────────────────────
    /// No task with this id is queued.
    #[error("No queued file with id {id}")]
    UnknownTask { id: u64 },

    /// The requested target is not offered for this source.
    #[error("Cannot convert '{name}' to '{target}'. Choose one of: {}", choices.join(", "))]
    UnsupportedTarget {
        name: String,
        target: String,
        choices: Vec<String>,
    },

    /// The task is no longer pending, so its target or membership is frozen.
    #[error("'{name}' is {status} and can no longer be changed; reset the queue to start over")]
    TaskLocked { name: String, status: String },

    /// A batch run was requested while another one is still in flight.
    #[error("A conversion is already in progress")]
    BatchInProgress,

    /// A batch run was requested with nothing queued.
    #[error("No files queued for conversion")]
    QueueEmpty,

    /// A batch run was requested while some tasks have no target format.
    #[error("Choose an output format for: {}", unset.join(", "))]
    QueueNotReady { unset: Vec<String> },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The media transcoder has not been loaded.
    #[error(
        "The conversion engine is not loaded yet.\n\
Install ffmpeg or point --ffmpeg / METAMORPH_FFMPEG at an existing binary."
    )]
    EngineNotReady,

    // ── Delivery errors ───────────────────────────────────────────────────
    /// A download was requested for a task without a payload or name.
    #[error("File information is incomplete for download: '{name}'")]
    DownloadUnavailable { name: String },

    /// "Download all" was requested but nothing converted successfully.
    #[error("There are no successfully converted files to download")]
    NothingToDownload,

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single task.
///
/// Each variant names the engine that threw and carries a short
/// human-readable cause. No partial output accompanies it.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ConversionError {
    /// The media transcoder failed or produced no output.
    #[error("transcoding failed: {0}")]
    Transcode(String),

    /// The PDF could not be opened or a page could not be rendered.
    #[error("failed to convert PDF to image: {0}")]
    Rasterize(String),

    /// The PDF writer rejected the laid-out document.
    #[error("PDF generation failed: {0}")]
    PdfAuthor(String),

    /// The DOCX container or its XML could not be read.
    #[error("failed to read DOCX: {0}")]
    Docx(String),

    /// The source bytes are not text in a usable encoding.
    #[error("failed to read text: {0}")]
    Text(String),

    /// An image could not be decoded or encoded.
    #[error("image processing failed: {0}")]
    Image(String),

    /// Zip assembly failed.
    #[error("failed to build archive: {0}")]
    Archive(String),

    /// A required engine is missing.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The task reached the dispatcher without a target format.
    #[error("no output format selected")]
    MissingTarget,

    /// The task's source payload is no longer held by the session.
    #[error("source file is no longer available")]
    MissingSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intake_rejected_names_the_file() {
        let e = MorphError::IntakeRejected {
            name: "setup.exe".into(),
            reason: "unsupported file type".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("setup.exe"), "got: {msg}");
        assert!(msg.contains("Allowed files"));
    }

    #[test]
    fn queue_not_ready_lists_unset_files() {
        let e = MorphError::QueueNotReady {
            unset: vec!["a.png".into(), "b.mp4".into()],
        };
        assert_eq!(e.to_string(), "Choose an output format for: a.png, b.mp4");
    }

    #[test]
    fn unsupported_target_lists_choices() {
        let e = MorphError::UnsupportedTarget {
            name: "notes.md".into(),
            target: "mp3".into(),
            choices: vec!["pdf".into(), "html".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("mp3"));
        assert!(msg.contains("pdf, html"));
    }

    #[test]
    fn conversion_error_display_is_short() {
        let e = ConversionError::Rasterize("bad xref".into());
        assert_eq!(e.to_string(), "failed to convert PDF to image: bad xref");
    }

    #[test]
    fn conversion_error_serialises_with_kind() {
        let e = ConversionError::Transcode("exit status 1".into());
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"kind":"transcode","detail":"exit status 1"}"#);
    }
}
