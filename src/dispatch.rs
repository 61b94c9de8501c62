//! Per-file conversion dispatch.
//!
//! [`DispatchRule::select`] maps a `(source extension, target extension)`
//! pair onto exactly one rule; the first match in this order wins:
//!
//! | # | Source         | Target          | Rule                 |
//! |---|----------------|-----------------|----------------------|
//! | 1 | pdf            | png, jpg, jpeg  | `PdfToImages`        |
//! | 2 | md, markdown   | pdf             | `MarkdownToPdf`      |
//! | 3 | md, markdown   | html            | `MarkdownToHtml`     |
//! | 4 | html, htm      | pdf             | `HtmlToPdf`          |
//! | 5 | txt            | pdf             | `TextToPdf`          |
//! | 6 | docx           | pdf             | `DocxToPdf`          |
//! | 7 | docx           | html            | `DocxToHtml`         |
//! | 8 | docx           | md              | `DocxToMarkdown`     |
//! | 9 | video          | still image     | `VideoFrame`         |
//! |10 | any            | 3gp             | `FeaturePhone`       |
//! |11 | any            | any             | `Transcode`          |
//!
//! Selection is pure, so the table is tested without any engine. [`convert`]
//! then runs the selected rule against the [`Engines`].

use crate::config::MorphConfig;
use crate::engine::encode::RasterFormat;
use crate::engine::transcode::{default_args, feature_phone_args, video_frame_args};
use crate::engine::{archive, docx, markup, pdf, Engines};
use crate::error::ConversionError;
use crate::filename;
use crate::formats;
use crate::intake::SourceFile;
use crate::session::{ConversionTask, ConvertedFile};
use std::fmt;
use tracing::debug;

/// One precedence-ordered conversion route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRule {
    PdfToImages { format: RasterFormat },
    MarkdownToPdf,
    MarkdownToHtml,
    HtmlToPdf,
    TextToPdf,
    DocxToPdf,
    DocxToHtml,
    DocxToMarkdown,
    VideoFrame,
    FeaturePhone,
    Transcode,
}

impl DispatchRule {
    /// Pick the rule for a source/target pair. Case-insensitive; never fails
    /// because [`DispatchRule::Transcode`] matches everything.
    pub fn select(source_ext: &str, target_ext: &str) -> Self {
        let source = source_ext.to_ascii_lowercase();
        let target = target_ext.to_ascii_lowercase();

        match (source.as_str(), target.as_str()) {
            ("pdf", "png") => DispatchRule::PdfToImages {
                format: RasterFormat::Png,
            },
            ("pdf", "jpg" | "jpeg") => DispatchRule::PdfToImages {
                format: RasterFormat::Jpeg,
            },
            ("md" | "markdown", "pdf") => DispatchRule::MarkdownToPdf,
            ("md" | "markdown", "html") => DispatchRule::MarkdownToHtml,
            ("html" | "htm", "pdf") => DispatchRule::HtmlToPdf,
            ("txt", "pdf") => DispatchRule::TextToPdf,
            ("docx", "pdf") => DispatchRule::DocxToPdf,
            ("docx", "html") => DispatchRule::DocxToHtml,
            ("docx", "md") => DispatchRule::DocxToMarkdown,
            (s, t) if formats::is_video(s) && formats::is_still_image(t) => {
                DispatchRule::VideoFrame
            }
            (_, "3gp") => DispatchRule::FeaturePhone,
            _ => DispatchRule::Transcode,
        }
    }

    /// Does this rule call the media transcoder?
    pub fn needs_transcoder(self) -> bool {
        matches!(
            self,
            DispatchRule::VideoFrame | DispatchRule::FeaturePhone | DispatchRule::Transcode
        )
    }
}

impl fmt::Display for DispatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchRule::PdfToImages { .. } => "pdf-to-images",
            DispatchRule::MarkdownToPdf => "markdown-to-pdf",
            DispatchRule::MarkdownToHtml => "markdown-to-html",
            DispatchRule::HtmlToPdf => "html-to-pdf",
            DispatchRule::TextToPdf => "text-to-pdf",
            DispatchRule::DocxToPdf => "docx-to-pdf",
            DispatchRule::DocxToHtml => "docx-to-html",
            DispatchRule::DocxToMarkdown => "docx-to-markdown",
            DispatchRule::VideoFrame => "video-frame",
            DispatchRule::FeaturePhone => "3gp",
            DispatchRule::Transcode => "transcode",
        };
        f.write_str(s)
    }
}

/// Convert one task's source into its target format.
///
/// The output is named `stem.target`, except multi-page PDF rasterisation
/// which yields `stem_pages.zip`.
pub async fn convert(
    task: &ConversionTask,
    source: &SourceFile,
    engines: &Engines,
    config: &MorphConfig,
) -> Result<ConvertedFile, ConversionError> {
    let target = task
        .target_extension
        .as_deref()
        .ok_or(ConversionError::MissingTarget)?;
    let rule = DispatchRule::select(&task.source_extension, target);
    let output_name = filename::output_name(&task.name, target);
    let title = filename::strip_extension(&task.name).to_string();
    let options = config.document;

    debug!("{} → {} via {}", task.name, output_name, rule);

    match rule {
        DispatchRule::PdfToImages { format } => {
            let mut pages = engines
                .rasterizer
                .rasterize(&source.bytes, format, config.pdf_render_scale)
                .await?;
            match pages.len() {
                0 => Err(ConversionError::Rasterize("document has no pages".into())),
                1 => Ok(ConvertedFile::new(output_name, pages.remove(0))),
                n => {
                    debug!("{} has {} pages; packing into a zip", task.name, n);
                    let entries: Vec<archive::Entry> = pages
                        .into_iter()
                        .enumerate()
                        .map(|(i, bytes)| {
                            let ext = target.to_ascii_lowercase();
                            (format!("{}_page_{}.{}", title, i + 1, ext), bytes)
                        })
                        .collect();
                    let zip = archive::pack(&entries)?;
                    Ok(ConvertedFile::new(filename::pages_archive_name(&task.name), zip))
                }
            }
        }

        DispatchRule::MarkdownToPdf => {
            let html = markup::markdown_to_html(&decode_text(&source.bytes)?);
            let bytes = off_runtime(move || pdf::html_to_pdf(&html, &title, &options)).await?;
            Ok(ConvertedFile::new(output_name, bytes))
        }

        DispatchRule::MarkdownToHtml => {
            let body = markup::markdown_to_html(&decode_text(&source.bytes)?);
            let page = markup::html_document(&title, &body);
            Ok(ConvertedFile::new(output_name, page.into_bytes()))
        }

        DispatchRule::HtmlToPdf => {
            let html = decode_text(&source.bytes)?;
            let bytes = off_runtime(move || pdf::html_to_pdf(&html, &title, &options)).await?;
            Ok(ConvertedFile::new(output_name, bytes))
        }

        DispatchRule::TextToPdf => {
            let text = decode_text(&source.bytes)?;
            let bytes = off_runtime(move || pdf::text_to_pdf(&text, &title, &options)).await?;
            Ok(ConvertedFile::new(output_name, bytes))
        }

        DispatchRule::DocxToPdf => {
            let input = source.bytes.clone();
            let bytes = off_runtime(move || {
                let html = docx::docx_to_html(&input)?;
                pdf::html_to_pdf(&html, &title, &options)
            })
            .await?;
            Ok(ConvertedFile::new(output_name, bytes))
        }

        DispatchRule::DocxToHtml => {
            let input = source.bytes.clone();
            let page = off_runtime(move || {
                let body = docx::docx_to_html(&input)?;
                Ok(markup::html_document(&title, &body))
            })
            .await?;
            Ok(ConvertedFile::new(output_name, page.into_bytes()))
        }

        DispatchRule::DocxToMarkdown => {
            let input = source.bytes.clone();
            let markdown = off_runtime(move || docx::docx_to_markdown(&input)).await?;
            Ok(ConvertedFile::new(output_name, markdown.into_bytes()))
        }

        DispatchRule::VideoFrame | DispatchRule::FeaturePhone | DispatchRule::Transcode => {
            let transcoder = engines.transcoder.as_ref().ok_or_else(|| {
                ConversionError::EngineUnavailable("the media transcoder is not loaded".into())
            })?;

            let source_ext = match task.source_extension.to_ascii_lowercase() {
                ext if ext.is_empty() => "bin".to_string(),
                ext => ext,
            };
            let input_name = format!("input.{source_ext}");
            let scratch_output = format!("output.{}", target.to_ascii_lowercase());
            let args = match rule {
                DispatchRule::VideoFrame => video_frame_args(&input_name, &scratch_output),
                DispatchRule::FeaturePhone => feature_phone_args(&input_name, &scratch_output),
                _ => default_args(&input_name, &scratch_output),
            };

            let bytes = transcoder
                .transcode(&input_name, &source.bytes, &args, &scratch_output)
                .await?;
            Ok(ConvertedFile::new(output_name, bytes))
        }
    }
}

/// Run CPU-bound document work on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, ConversionError>
where
    F: FnOnce() -> Result<T, ConversionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConversionError::PdfAuthor(format!("document task panicked: {e}")))?
}

/// Decode a text source. UTF-16 with a byte-order mark is honoured;
/// anything else is read as UTF-8 with invalid sequences replaced.
fn decode_text(bytes: &[u8]) -> Result<String, ConversionError> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return Ok(String::from_utf8_lossy(rest).into_owned());
    }

    let utf16 = |rest: &[u8], from: fn([u8; 2]) -> u16| -> Result<String, ConversionError> {
        if rest.len() % 2 != 0 {
            return Err(ConversionError::Text("UTF-16 text has an odd byte count".into()));
        }
        let units: Vec<u16> = rest.chunks_exact(2).map(|c| from([c[0], c[1]])).collect();
        String::from_utf16(&units).map_err(|e| ConversionError::Text(e.to_string()))
    };

    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return utf16(rest, u16::from_be_bytes);
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PdfRasterizer, Transcoder};
    use crate::session::Session;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Call = (String, Vec<String>, String);

    #[derive(Default)]
    struct RecordingTranscoder {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl Transcoder for RecordingTranscoder {
        async fn transcode(
            &self,
            input_name: &str,
            _input: &[u8],
            args: &[String],
            output_name: &str,
        ) -> Result<Vec<u8>, ConversionError> {
            self.calls.lock().unwrap().push((
                input_name.to_string(),
                args.to_vec(),
                output_name.to_string(),
            ));
            Ok(b"transcoded".to_vec())
        }
    }

    struct PagesRasterizer(usize);

    #[async_trait]
    impl PdfRasterizer for PagesRasterizer {
        async fn rasterize(
            &self,
            _pdf: &[u8],
            _format: RasterFormat,
            _scale: f32,
        ) -> Result<Vec<Vec<u8>>, ConversionError> {
            Ok((0..self.0).map(|i| vec![i as u8; 4]).collect())
        }
    }

    fn engines(pages: usize, transcoder: Option<Arc<RecordingTranscoder>>) -> Engines {
        Engines::new(
            transcoder.map(|t| t as Arc<dyn Transcoder>),
            Arc::new(PagesRasterizer(pages)),
        )
    }

    async fn run(
        name: &str,
        bytes: &[u8],
        target: &str,
        engines: &Engines,
    ) -> Result<ConvertedFile, ConversionError> {
        let mut session = Session::new();
        let id = session.intake(vec![SourceFile::new(name, bytes.to_vec())]).unwrap()[0];
        session.set_target(id, target).unwrap();
        let (task, source) = session.task_and_source(0).unwrap();
        convert(task, source, engines, &MorphConfig::default()).await
    }

    #[test]
    fn select_follows_precedence() {
        use DispatchRule::*;
        let cases = [
            ("pdf", "png", PdfToImages { format: RasterFormat::Png }),
            ("PDF", "JPEG", PdfToImages { format: RasterFormat::Jpeg }),
            ("md", "pdf", MarkdownToPdf),
            ("markdown", "html", MarkdownToHtml),
            ("htm", "pdf", HtmlToPdf),
            ("txt", "pdf", TextToPdf),
            ("docx", "pdf", DocxToPdf),
            ("docx", "html", DocxToHtml),
            ("docx", "md", DocxToMarkdown),
            ("mp4", "png", VideoFrame),
            ("mov", "jpg", VideoFrame),
            ("mp4", "3gp", FeaturePhone),
            ("avi", "3gp", FeaturePhone),
            ("png", "webp", Transcode),
            ("mp4", "mp3", Transcode),
            ("png", "3gp", FeaturePhone),
            ("gif", "png", Transcode),
        ];
        for (src, dst, expected) in cases {
            assert_eq!(DispatchRule::select(src, dst), expected, "{src} → {dst}");
        }
    }

    #[test]
    fn only_media_rules_need_the_transcoder() {
        assert!(DispatchRule::Transcode.needs_transcoder());
        assert!(DispatchRule::VideoFrame.needs_transcoder());
        assert!(DispatchRule::FeaturePhone.needs_transcoder());
        assert!(!DispatchRule::MarkdownToHtml.needs_transcoder());
        assert!(!DispatchRule::PdfToImages { format: RasterFormat::Png }.needs_transcoder());
    }

    #[tokio::test]
    async fn single_page_pdf_keeps_requested_name() {
        let out = run("invoice.pdf", b"%PDF", "png", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "invoice.png");
        assert_eq!(out.media_type, "image/png");
    }

    #[tokio::test]
    async fn multi_page_pdf_becomes_pages_zip() {
        let out = run("invoice.pdf", b"%PDF", "jpg", &engines(3, None)).await.unwrap();
        assert_eq!(out.output_name, "invoice_pages.zip");

        let names: Vec<String> = archive::unpack(&out.bytes)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            ["invoice_page_1.jpg", "invoice_page_2.jpg", "invoice_page_3.jpg"]
        );
    }

    #[tokio::test]
    async fn markdown_to_html_is_a_full_document() {
        let out = run("notes.md", b"# Hello\n\nworld", "html", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "notes.html");
        let html = String::from_utf8(out.bytes).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<title>notes</title>"));
    }

    #[tokio::test]
    async fn text_to_pdf_produces_pdf_bytes() {
        let out = run("readme.txt", b"hello", "pdf", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "readme.pdf");
        assert!(out.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn markdown_to_pdf_produces_pdf_bytes() {
        let md = b"# Notes\n\nSome *body* text.\n\n- one\n- two\n";
        let out = run("notes.md", md, "pdf", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "notes.pdf");
        assert_eq!(out.media_type, "application/pdf");
        assert!(out.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn html_to_pdf_produces_pdf_bytes() {
        let html = b"<html><body><h1>Report</h1><p>First paragraph.</p></body></html>";
        let out = run("report.html", html, "pdf", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "report.pdf");
        assert_eq!(out.media_type, "application/pdf");
        assert!(out.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn docx_to_pdf_produces_pdf_bytes() {
        let docx = crate::engine::docx::tests::sample_docx();
        let out = run("quarterly.docx", &docx, "pdf", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "quarterly.pdf");
        assert_eq!(out.media_type, "application/pdf");
        assert!(out.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn docx_to_html_is_a_full_document() {
        let docx = crate::engine::docx::tests::sample_docx();
        let out = run("quarterly.docx", &docx, "html", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "quarterly.html");
        assert_eq!(out.media_type, "text/html");
        let html = String::from_utf8(out.bytes).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Quarterly Report</h1>"), "{html}");
    }

    #[tokio::test]
    async fn docx_to_markdown_keeps_headings() {
        let docx = crate::engine::docx::tests::sample_docx();
        let out = run("quarterly.docx", &docx, "md", &engines(1, None)).await.unwrap();
        assert_eq!(out.output_name, "quarterly.md");
        let md = String::from_utf8(out.bytes).unwrap();
        assert!(md.starts_with("# Quarterly Report"), "{md}");
    }

    #[tokio::test]
    async fn broken_docx_fails_the_task() {
        let err = run("broken.docx", b"not a zip", "html", &engines(1, None)).await.unwrap_err();
        assert!(matches!(err, ConversionError::Docx(_)), "{err:?}");
    }

    #[tokio::test]
    async fn transcode_uses_scratch_names() {
        let t = Arc::new(RecordingTranscoder::default());
        let out = run("holiday.MOV", b"video", "mp4", &engines(1, Some(t.clone())))
            .await
            .unwrap();
        assert_eq!(out.output_name, "holiday.mp4");
        assert_eq!(out.bytes, b"transcoded");

        let calls = t.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "input.mov");
        assert_eq!(calls[0].1, ["-i", "input.mov", "output.mp4"]);
        assert_eq!(calls[0].2, "output.mp4");
    }

    #[tokio::test]
    async fn feature_phone_and_frame_profiles() {
        let t = Arc::new(RecordingTranscoder::default());
        let e = engines(1, Some(t.clone()));
        run("clip.mp4", b"v", "3gp", &e).await.unwrap();
        run("clip.mp4", b"v", "png", &e).await.unwrap();

        let calls = t.calls.lock().unwrap();
        assert!(calls[0].1.contains(&"352x288".to_string()));
        assert!(calls[1].1.contains(&"00:00:01.000".to_string()));
        assert_eq!(calls[1].2, "output.png");
    }

    #[tokio::test]
    async fn media_without_transcoder_fails_the_task() {
        let err = run("photo.png", b"png", "webp", &engines(1, None)).await.unwrap_err();
        assert!(matches!(err, ConversionError::EngineUnavailable(_)));
    }

    #[test]
    fn decode_text_handles_boms() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhi").unwrap(), "hi");
        assert_eq!(decode_text(b"\xFF\xFEh\0i\0").unwrap(), "hi");
        assert_eq!(decode_text(b"\xFE\xFF\0h\0i").unwrap(), "hi");
        assert!(matches!(decode_text(b"\xFF\xFEh"), Err(ConversionError::Text(_))));
        assert_eq!(decode_text(b"ok\xFF").unwrap(), "ok\u{FFFD}");
    }
}
