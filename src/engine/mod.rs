//! Conversion engines.
//!
//! ```text
//!  transcode  ──► ffmpeg subprocess (image, audio, video, 3gp, frame grab)
//!  raster     ──► pdfium (PDF page → PNG/JPEG)
//!  pdf        ──► printpdf (text / HTML / images → PDF)
//!  markup     ──► pulldown-cmark (Markdown → HTML)
//!  docx       ──► zip + quick-xml (DOCX → HTML → Markdown)
//!  archive    ──► zip (pack / unpack)
//! ```
//!
//! Only the transcoder and the rasterizer sit behind traits: they wrap
//! native programs that may be missing at runtime, and tests replace them
//! with fakes through [`Engines`].

pub mod archive;
pub mod docx;
pub mod encode;
pub mod markup;
pub mod pdf;
pub mod raster;
pub mod transcode;

pub use raster::{PdfRasterizer, PdfiumRasterizer};
pub use transcode::{FfmpegTranscoder, Transcoder};

use crate::config::MorphConfig;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// The pluggable engines a batch run calls into.
#[derive(Clone)]
pub struct Engines {
    /// `None` until ffmpeg has been found. Tasks that need it are refused
    /// with [`crate::MorphError::EngineNotReady`].
    pub transcoder: Option<Arc<dyn Transcoder>>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
}

impl Engines {
    pub fn new(
        transcoder: Option<Arc<dyn Transcoder>>,
        rasterizer: Arc<dyn PdfRasterizer>,
    ) -> Self {
        Self {
            transcoder,
            rasterizer,
        }
    }

    /// Load the production engines described by `config`.
    ///
    /// A missing ffmpeg is not an error here: document conversions still
    /// work, and the batch loop reports the missing engine only if a queued
    /// task needs it.
    pub async fn load(config: &MorphConfig) -> Self {
        let transcoder: Option<Arc<dyn Transcoder>> =
            match FfmpegTranscoder::load(&config.ffmpeg_path).await {
                Ok(t) => Some(Arc::new(t)),
                Err(_) => {
                    warn!(
                        "ffmpeg not available at '{}'; media conversions are disabled",
                        config.ffmpeg_path.display()
                    );
                    None
                }
            };

        let rasterizer = Arc::new(
            PdfiumRasterizer::new(config.pdfium_library_path.clone(), config.jpeg_quality)
                .with_max_pixels(config.max_rendered_pixels),
        );

        Self::new(transcoder, rasterizer)
    }

    pub fn has_transcoder(&self) -> bool {
        self.transcoder.is_some()
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("transcoder", &self.transcoder.is_some())
            .finish_non_exhaustive()
    }
}
