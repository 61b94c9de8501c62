//! PDF rasterisation: render every page of a PDF to an encoded image via
//! pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and
//! keeps thread-local state. `tokio::task::spawn_blocking` moves the work
//! onto the blocking pool so the runtime's worker threads never stall on a
//! large document.

use crate::engine::encode::{encode_image, RasterFormat};
use crate::error::ConversionError;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Renders PDF pages to raster images.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Render each page of `pdf` at `scale` and return one encoded image per
    /// page, in page order.
    async fn rasterize(
        &self,
        pdf: &[u8],
        format: RasterFormat,
        scale: f32,
    ) -> Result<Vec<Vec<u8>>, ConversionError>;
}

/// [`PdfRasterizer`] backed by the pdfium shared library.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    /// Directory containing libpdfium, or the library file itself.
    library_path: Option<PathBuf>,
    jpeg_quality: u8,
    /// Longest side of a rendered page in pixels.
    max_pixels: u32,
}

impl PdfiumRasterizer {
    pub fn new(library_path: Option<PathBuf>, jpeg_quality: u8) -> Self {
        Self {
            library_path,
            jpeg_quality,
            max_pixels: 5000,
        }
    }

    pub fn with_max_pixels(mut self, max_pixels: u32) -> Self {
        self.max_pixels = max_pixels.max(1);
        self
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::new(None, 95)
    }
}

#[async_trait]
impl PdfRasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        pdf: &[u8],
        format: RasterFormat,
        scale: f32,
    ) -> Result<Vec<Vec<u8>>, ConversionError> {
        let bytes = pdf.to_vec();
        let library_path = self.library_path.clone();
        let quality = self.jpeg_quality;
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || {
            let size = RenderSize { scale, max_pixels };
            rasterize_blocking(bytes, library_path.as_deref(), format, size, quality)
        })
        .await
        .map_err(|e| ConversionError::Rasterize(format!("render task panicked: {e}")))?
    }
}

/// Bind to pdfium from an explicit location or the system library path.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ConversionError> {
    let bindings = match library_path {
        Some(p) if p.is_file() => Pdfium::bind_to_library(p),
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| {
        ConversionError::EngineUnavailable(format!(
            "pdfium library could not be loaded ({e:?}); set PDFIUM_LIB_PATH"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

#[derive(Debug, Clone, Copy)]
struct RenderSize {
    scale: f32,
    max_pixels: u32,
}

impl RenderSize {
    /// Bitmap size for a page of `width_pt` × `height_pt` points: the scaled
    /// size, shrunk proportionally so neither side exceeds `max_pixels`.
    fn pixels(self, width_pt: f32, height_pt: f32) -> (i32, i32) {
        let w = width_pt * self.scale;
        let h = height_pt * self.scale;
        let longest = w.max(h);
        let shrink = if longest > self.max_pixels as f32 {
            self.max_pixels as f32 / longest
        } else {
            1.0
        };
        let px = |v: f32| ((v * shrink).round() as i32).max(1);
        (px(w), px(h))
    }
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    bytes: Vec<u8>,
    library_path: Option<&Path>,
    format: RasterFormat,
    size: RenderSize,
    jpeg_quality: u8,
) -> Result<Vec<Vec<u8>>, ConversionError> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium.load_pdf_from_byte_vec(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            ConversionError::Rasterize("document is password protected".into())
        } else {
            ConversionError::Rasterize(err_str)
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut images = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let (width, height) = size.pixels(page.width().value, page.height().value);
        let render_config = PdfRenderConfig::new().set_target_size(width, height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ConversionError::Rasterize(format!("page {}: {:?}", idx + 1, e)))?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let encoded = encode_image(&image, format, jpeg_quality)
            .map_err(|e| ConversionError::Image(format!("page {}: {}", idx + 1, e)))?;
        images.push(encoded);
    }

    if images.is_empty() {
        return Err(ConversionError::Rasterize("document has no pages".into()));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_engine_unavailable() {
        let err = bind_pdfium(Some(Path::new("/definitely/not/a/pdfium/dir"))).unwrap_err();
        assert!(matches!(err, ConversionError::EngineUnavailable(_)));
    }

    #[test]
    fn ordinary_pages_render_at_scale() {
        let size = RenderSize { scale: 2.0, max_pixels: 5000 };
        assert_eq!(size.pixels(595.0, 842.0), (1190, 1684));
    }

    #[test]
    fn oversized_pages_are_capped_proportionally() {
        let size = RenderSize { scale: 2.0, max_pixels: 5000 };
        assert_eq!(size.pixels(14_400.0, 14_400.0), (5000, 5000));
        assert_eq!(size.pixels(14_400.0, 7_200.0), (5000, 2500));

        let size = RenderSize { scale: 8.0, max_pixels: 2000 };
        let (w, h) = size.pixels(612.0, 792.0);
        assert_eq!(h, 2000);
        assert!(w < 2000);
    }
}
