//! Configuration types for a conversion session.
//!
//! All conversion behaviour is controlled through [`MorphConfig`], built via
//! its [`MorphConfigBuilder`]. Engine locations, rendering constants,
//! document layout and delivery pacing live in one struct so a single value
//! can be handed to the batch loop and to the delivery helpers.

use crate::error::MorphError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Configuration for a conversion session.
///
/// Built via [`MorphConfig::builder()`] or using [`MorphConfig::default()`].
///
/// # Example
/// ```rust
/// use metamorpher::MorphConfig;
///
/// let config = MorphConfig::builder()
///     .pdf_render_scale(3.0)
///     .download_stagger_ms(0)
///     .build()
///     .unwrap();
/// assert_eq!(config.download_stagger_ms, 0);
/// ```
#[derive(Clone)]
pub struct MorphConfig {
    /// Scale factor applied to each PDF page when rasterising. Range 0.5–8. Default: 2.0.
    ///
    /// 1.0 renders at the page's nominal 72 DPI size; 2.0 doubles both
    /// dimensions, which keeps small print legible in the exported image.
    pub pdf_render_scale: f32,

    /// Longest side, in pixels, of a rasterised PDF page. Default: 5000.
    ///
    /// Pages whose scaled size exceeds this are shrunk to fit, so a
    /// poster-sized page never allocates more than roughly
    /// `max_rendered_pixels²` pixels.
    pub max_rendered_pixels: u32,

    /// JPEG quality (1–100) for rasterised PDF pages. Default: 95.
    pub jpeg_quality: u8,

    /// Layout used when writing text, Markdown, HTML and DOCX into PDF.
    pub document: DocumentOptions,

    /// Path or name of the ffmpeg binary. Default: `ffmpeg` (looked up on PATH).
    pub ffmpeg_path: PathBuf,

    /// Directory holding the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Delay between consecutive saves in "download all". Default: 800.
    pub download_stagger_ms: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives batch events as each task progresses.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for MorphConfig {
    fn default() -> Self {
        Self {
            pdf_render_scale: 2.0,
            max_rendered_pixels: 5000,
            jpeg_quality: 95,
            document: DocumentOptions::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            pdfium_library_path: None,
            download_stagger_ms: 800,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for MorphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MorphConfig")
            .field("pdf_render_scale", &self.pdf_render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("document", &self.document)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("download_stagger_ms", &self.download_stagger_ms)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl MorphConfig {
    /// Create a new builder for `MorphConfig`.
    pub fn builder() -> MorphConfigBuilder {
        MorphConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`MorphConfig`].
pub struct MorphConfigBuilder {
    config: MorphConfig,
}

impl MorphConfigBuilder {
    pub fn pdf_render_scale(mut self, scale: f32) -> Self {
        self.config.pdf_render_scale = scale.clamp(0.5, 8.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, 20_000);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn document(mut self, options: DocumentOptions) -> Self {
        self.config.document = options;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn download_stagger_ms(mut self, ms: u64) -> Self {
        self.config.download_stagger_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MorphConfig, MorphError> {
        let c = &self.config;
        let doc = &c.document;
        if !(4.0..=72.0).contains(&doc.font_size) {
            return Err(MorphError::InvalidConfig(format!(
                "Font size must be 4–72 pt, got {}",
                doc.font_size
            )));
        }
        let (w, h) = doc.page_size.dimensions_mm(doc.orientation);
        if doc.margin_mm < 0.0 || doc.margin_mm * 2.0 >= w.min(h) {
            return Err(MorphError::InvalidConfig(format!(
                "Margin {}mm leaves no room on a {}x{}mm page",
                doc.margin_mm, w, h
            )));
        }
        if c.ffmpeg_path.as_os_str().is_empty() {
            return Err(MorphError::InvalidConfig("ffmpeg path is empty".into()));
        }
        Ok(self.config)
    }
}

// ── Document layout ──────────────────────────────────────────────────────

/// Page geometry and typography for generated PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// Body font size in points. Default: 12.
    pub font_size: f32,
    /// Margin on every side in millimetres. Default: 20.
    pub margin_mm: f32,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            font_size: 12.0,
            margin_mm: 20.0,
        }
    }
}

/// Paper size for generated PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

/// Page orientation for generated PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl PageSize {
    /// Page width and height in millimetres for the given orientation.
    pub fn dimensions_mm(self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
        };
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

impl FromStr for PageSize {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "a4" => Ok(PageSize::A4),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(MorphError::InvalidConfig(format!(
                "Unknown page size '{other}' (expected a4, letter or legal)"
            ))),
        }
    }
}

impl FromStr for Orientation {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            other => Err(MorphError::InvalidConfig(format!(
                "Unknown orientation '{other}' (expected portrait or landscape)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_layout() {
        let c = MorphConfig::default();
        assert_eq!(c.pdf_render_scale, 2.0);
        assert_eq!(c.document.font_size, 12.0);
        assert_eq!(c.document.margin_mm, 20.0);
        assert_eq!(c.download_stagger_ms, 800);
    }

    #[test]
    fn builder_clamps_scale_and_quality() {
        let c = MorphConfig::builder()
            .pdf_render_scale(100.0)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.pdf_render_scale, 8.0);
        assert_eq!(c.jpeg_quality, 1);
    }

    #[test]
    fn builder_clamps_render_size() {
        assert_eq!(MorphConfig::default().max_rendered_pixels, 5000);

        let c = MorphConfig::builder().max_rendered_pixels(10).build().unwrap();
        assert_eq!(c.max_rendered_pixels, 100);

        let c = MorphConfig::builder().max_rendered_pixels(u32::MAX).build().unwrap();
        assert_eq!(c.max_rendered_pixels, 20_000);
    }

    #[test]
    fn oversized_margin_is_rejected() {
        let err = MorphConfig::builder()
            .document(DocumentOptions {
                margin_mm: 150.0,
                ..DocumentOptions::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, MorphError::InvalidConfig(_)));
    }

    #[test]
    fn landscape_swaps_dimensions() {
        assert_eq!(PageSize::A4.dimensions_mm(Orientation::Landscape), (297.0, 210.0));
        assert_eq!(PageSize::Legal.dimensions_mm(Orientation::Portrait), (215.9, 355.6));
    }

    #[test]
    fn page_size_parses_case_insensitively() {
        assert_eq!("Letter".parse::<PageSize>().unwrap(), PageSize::Letter);
        assert!("a3".parse::<PageSize>().is_err());
        assert_eq!("LANDSCAPE".parse::<Orientation>().unwrap(), Orientation::Landscape);
    }
}
