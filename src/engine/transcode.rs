//! Media transcoding through the ffmpeg command-line tool.
//!
//! The transcoder works on a private scratch directory: the input buffer is
//! written under `input_name`, ffmpeg runs with that directory as its working
//! directory, and the file it leaves under `output_name` is read back. The
//! argument vector is passed through untouched, so callers spell out the
//! whole command (`-i input.mp4 ... output.webm`) exactly as they would on a
//! shell.

use crate::error::{ConversionError, MorphError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Lines of ffmpeg stderr kept in an error message.
const STDERR_TAIL_LINES: usize = 6;

/// Offset of the frame grabbed by video-to-image conversions.
pub const FRAME_OFFSET: &str = "00:00:01.000";

/// A byte-in, byte-out media transcoder.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one conversion. `input` is exposed to the command as
    /// `input_name`; the bytes left at `output_name` are returned.
    async fn transcode(
        &self,
        input_name: &str,
        input: &[u8],
        args: &[String],
        output_name: &str,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// [`Transcoder`] that shells out to an ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegTranscoder {
    /// Locate ffmpeg and check it runs.
    ///
    /// This is the "engine load" step: until it succeeds, conversions that
    /// need the transcoder are refused with [`MorphError::EngineNotReady`].
    pub async fn load(ffmpeg_path: impl Into<PathBuf>) -> Result<Self, MorphError> {
        let ffmpeg_path = ffmpeg_path.into();

        let output = Command::new(&ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                debug!("ffmpeg -version check at {} failed: {}", ffmpeg_path.display(), e);
                MorphError::EngineNotReady
            })?;

        if !output.status.success() {
            return Err(MorphError::EngineNotReady);
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        info!(
            "Transcoder ready: {}",
            banner.lines().next().unwrap_or("ffmpeg")
        );
        Ok(Self { ffmpeg_path })
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input_name: &str,
        input: &[u8],
        args: &[String],
        output_name: &str,
    ) -> Result<Vec<u8>, ConversionError> {
        check_scratch_name(input_name)?;
        check_scratch_name(output_name)?;

        let scratch = tempfile::tempdir()
            .map_err(|e| ConversionError::Transcode(format!("scratch directory: {e}")))?;
        let input_path = scratch.path().join(input_name);
        let output_path = scratch.path().join(output_name);

        tokio::fs::write(&input_path, input)
            .await
            .map_err(|e| ConversionError::Transcode(format!("writing input: {e}")))?;

        debug!("ffmpeg {}", args.join(" "));
        let output = Command::new(&self.ffmpeg_path)
            .current_dir(scratch.path())
            .args(["-hide_banner", "-y"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ConversionError::Transcode(format!("failed to execute ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ConversionError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let bytes = tokio::fs::read(&output_path).await.map_err(|_| {
            ConversionError::Transcode(format!("ffmpeg produced no '{output_name}'"))
        })?;
        if bytes.is_empty() {
            return Err(ConversionError::Transcode(format!(
                "ffmpeg produced an empty '{output_name}'"
            )));
        }
        Ok(bytes)
    }
}

/// Scratch names must stay inside the scratch directory.
fn check_scratch_name(name: &str) -> Result<(), ConversionError> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ConversionError::Transcode(format!(
            "invalid scratch file name '{name}'"
        )));
    }
    Ok(())
}

/// Last few non-empty stderr lines, joined.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join(" | ");
    if tail.is_empty() {
        "no diagnostic output".to_string()
    } else {
        tail
    }
}

// ── Argument vectors ─────────────────────────────────────────────────────

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Plain container/codec change implied by the output extension.
pub fn default_args(input_name: &str, output_name: &str) -> Vec<String> {
    owned(&["-i", input_name, output_name])
}

/// Constrained 3GP profile for old handsets: 20 fps, 352×288, 400k video,
/// AAC mono 8 kHz 24k audio.
pub fn feature_phone_args(input_name: &str, output_name: &str) -> Vec<String> {
    owned(&[
        "-i",
        input_name,
        "-r",
        "20",
        "-s",
        "352x288",
        "-vb",
        "400k",
        "-acodec",
        "aac",
        "-strict",
        "experimental",
        "-ac",
        "1",
        "-ar",
        "8000",
        "-ab",
        "24k",
        output_name,
    ])
}

/// Single still frame taken at [`FRAME_OFFSET`].
pub fn video_frame_args(input_name: &str, output_name: &str) -> Vec<String> {
    owned(&[
        "-i",
        input_name,
        "-ss",
        FRAME_OFFSET,
        "-frames:v",
        "1",
        output_name,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_are_input_then_output() {
        assert_eq!(
            default_args("input.png", "output.webp"),
            ["-i", "input.png", "output.webp"]
        );
    }

    #[test]
    fn feature_phone_profile_is_exact() {
        let args = feature_phone_args("input.mp4", "output.3gp");
        assert_eq!(
            args.join(" "),
            "-i input.mp4 -r 20 -s 352x288 -vb 400k -acodec aac -strict experimental \
             -ac 1 -ar 8000 -ab 24k output.3gp"
        );
    }

    #[test]
    fn frame_args_seek_one_second() {
        let args = video_frame_args("input.mov", "output.png");
        assert_eq!(args[2], "-ss");
        assert_eq!(args[3], "00:00:01.000");
        assert_eq!(args.last().map(String::as_str), Some("output.png"));
    }

    #[test]
    fn scratch_names_cannot_escape() {
        assert!(check_scratch_name("input.mp4").is_ok());
        assert!(check_scratch_name("../etc/passwd").is_err());
        assert!(check_scratch_name("a\\b").is_err());
        assert!(check_scratch_name("").is_err());
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let raw = b"line1\nline2\n\nline3\nline4\nline5\nline6\nline7\nline8\n";
        assert_eq!(
            stderr_tail(raw),
            "line3 | line4 | line5 | line6 | line7 | line8"
        );
        assert_eq!(stderr_tail(b""), "no diagnostic output");
    }

    #[tokio::test]
    async fn load_fails_for_missing_binary() {
        let err = FfmpegTranscoder::load("/definitely/not/ffmpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, MorphError::EngineNotReady));
    }
}
