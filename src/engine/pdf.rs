//! PDF authoring: lay text and HTML out into pages, then write them with
//! printpdf.
//!
//! Layout and rendering are separate passes. [`layout_text`] and
//! [`layout_html`] are pure functions producing positioned [`TextRun`]s, so
//! pagination can be tested without parsing PDF output; [`render`] turns a
//! [`PageLayout`] into bytes.
//!
//! ## Geometry
//!
//! Units are millimetres with `y` measured from the top edge, starting at
//! the margin:
//!
//! | Step                  | Advance                          |
//! |-----------------------|----------------------------------|
//! | text line             | `font_size * 0.5`                |
//! | before a heading      | `heading_size * 0.3`             |
//! | after a heading       | `font_size * 0.5`                |
//! | after a paragraph     | `font_size * 0.3`                |
//!
//! A new page starts when the cursor is below `page_height - margin`.
//! Headings are bold at `font_size * (2.5 - level * 0.3)` points.

use crate::config::{DocumentOptions, Orientation, PageSize};
use crate::engine::encode::{encode_image, RasterFormat};
use crate::error::ConversionError;
use image::DynamicImage;
use once_cell::sync::Lazy;
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm,
    PdfDocument, Px,
};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Points → millimetres.
const PT_TO_MM: f32 = 25.4 / 72.0;

/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_EM: f32 = 0.5;

/// Resolution images are placed at before scaling.
const IMAGE_DPI: f32 = 300.0;

/// Elements whose content is never rendered.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Elements that end the current line of inline text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "nav", "aside", "blockquote",
    "ul", "ol", "li", "table", "thead", "tbody", "tr", "td", "th", "dl", "dt", "dd", "figure",
    "figcaption", "hr", "address",
];

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// One line of text at a fixed position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x_mm: f32,
    /// Baseline, measured from the top of the page.
    pub y_mm: f32,
    pub size_pt: f32,
    pub bold: bool,
    pub text: String,
}

/// A paginated document ready for [`render`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub pages: Vec<Vec<TextRun>>,
}

impl PageLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Moves a cursor down the page, breaking pages as needed.
struct Composer {
    width: f32,
    height: f32,
    margin: f32,
    font_size: f32,
    y: f32,
    pages: Vec<Vec<TextRun>>,
}

impl Composer {
    fn new(options: &DocumentOptions) -> Self {
        let (width, height) = options.page_size.dimensions_mm(options.orientation);
        Self {
            width,
            height,
            margin: options.margin_mm,
            font_size: options.font_size,
            y: options.margin_mm,
            pages: vec![Vec::new()],
        }
    }

    fn max_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    fn advance(&mut self, dy: f32) {
        self.y += dy;
    }

    fn line(&mut self, text: &str, size_pt: f32, bold: bool) {
        if self.y > self.height - self.margin {
            self.pages.push(Vec::new());
            self.y = self.margin;
        }
        if !text.is_empty() {
            if let Some(page) = self.pages.last_mut() {
                page.push(TextRun {
                    x_mm: self.margin,
                    y_mm: self.y,
                    size_pt,
                    bold,
                    text: text.to_string(),
                });
            }
        }
        self.y += self.font_size * 0.5;
    }

    fn wrapped(&mut self, text: &str, size_pt: f32, bold: bool) {
        for line in wrap(text, self.max_width(), size_pt) {
            self.line(&line, size_pt, bold);
        }
    }

    fn finish(self) -> PageLayout {
        PageLayout {
            width_mm: self.width,
            height_mm: self.height,
            pages: self.pages,
        }
    }
}

/// Greedy word wrap against an estimated glyph width.
///
/// Words longer than a line are split by character.
pub fn wrap(text: &str, max_width_mm: f32, size_pt: f32) -> Vec<String> {
    let glyph_mm = size_pt * AVG_GLYPH_EM * PT_TO_MM;
    let max_chars = ((max_width_mm / glyph_mm).floor() as usize).max(1);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > max_chars && current_len > 0 {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Lay out plain text; source line breaks are kept.
pub fn layout_text(text: &str, options: &DocumentOptions) -> PageLayout {
    let mut composer = Composer::new(options);
    let size = options.font_size;
    for source_line in text.lines() {
        composer.wrapped(&source_line.replace('\t', "    "), size, false);
    }
    composer.finish()
}

/// Lay out the `<body>` of an HTML document or fragment.
pub fn layout_html(html: &str, options: &DocumentOptions) -> PageLayout {
    let document = Html::parse_document(html);
    let mut walker = HtmlWalker {
        composer: Composer::new(options),
        base_size: options.font_size,
        heading_size: None,
        inline: String::new(),
    };
    if let Some(body) = document.select(&BODY).next() {
        walker.walk(body);
        walker.flush();
    }
    walker.composer.finish()
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

struct HtmlWalker {
    composer: Composer,
    base_size: f32,
    /// Set while inside a heading.
    heading_size: Option<f32>,
    /// Inline text waiting for the end of its block.
    inline: String,
}

impl HtmlWalker {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.inline.push_str(text);
                continue;
            }
            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            let tag = child.value().name();

            if SKIPPED_TAGS.contains(&tag) {
                continue;
            }
            if tag == "br" {
                self.flush();
                continue;
            }
            if tag == "pre" {
                self.flush();
                let text: String = child.text().collect();
                for line in text.lines() {
                    self.composer
                        .wrapped(&line.replace('\t', "    "), self.base_size, false);
                }
                self.composer.advance(self.base_size * 0.3);
                continue;
            }
            if let Some(level) = heading_level(tag) {
                self.flush();
                let size = self.base_size * (2.5 - f32::from(level) * 0.3);
                self.composer.advance(size * 0.3);
                self.heading_size = Some(size);
                self.walk(child);
                self.flush();
                self.heading_size = None;
                self.composer.advance(self.base_size * 0.5);
                continue;
            }

            let block = BLOCK_TAGS.contains(&tag);
            if block {
                self.flush();
            }
            if tag == "li" {
                self.inline.push_str("- ");
            }
            self.walk(child);
            if block {
                self.flush();
            }
            if tag == "p" {
                self.composer.advance(self.base_size * 0.3);
            }
        }
    }

    fn flush(&mut self) {
        let text = self.inline.split_whitespace().collect::<Vec<_>>().join(" ");
        self.inline.clear();
        if text.is_empty() || text == "-" {
            return;
        }
        let (size, bold) = match self.heading_size {
            Some(size) => (size, true),
            None => (self.base_size, false),
        };
        self.composer.wrapped(&text, size, bold);
    }
}

/// Map text onto what the built-in Helvetica encoding can show.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => "'".to_string(),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => "\"".to_string(),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => "-".to_string(),
            '\u{2026}' => "...".to_string(),
            '\u{2022}' => "-".to_string(),
            '\u{00A0}' => " ".to_string(),
            c if (c as u32) < 0x20 => String::new(),
            c if (c as u32) <= 0xFF => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

fn authoring_error(e: impl std::fmt::Display) -> ConversionError {
    ConversionError::PdfAuthor(e.to_string())
}

/// Write a laid-out document as PDF bytes.
pub fn render(layout: &PageLayout, title: &str) -> Result<Vec<u8>, ConversionError> {
    let (w, h) = (layout.width_mm, layout.height_mm);
    let (doc, first_page, first_layer) = PdfDocument::new(title, Mm(w), Mm(h), "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(authoring_error)?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(authoring_error)?;

    for (index, runs) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(w), Mm(h), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };
        for run in runs {
            let font = if run.bold { &bold } else { &regular };
            layer.use_text(printable(&run.text), run.size_pt, Mm(run.x_mm), Mm(h - run.y_mm), font);
        }
    }

    let bytes = doc.save_to_bytes().map_err(authoring_error)?;
    debug!("Rendered {} page(s) → {} bytes", layout.page_count(), bytes.len());
    Ok(bytes)
}

/// Lay out and render plain text.
pub fn text_to_pdf(
    text: &str,
    title: &str,
    options: &DocumentOptions,
) -> Result<Vec<u8>, ConversionError> {
    render(&layout_text(text, options), title)
}

/// Lay out and render HTML.
pub fn html_to_pdf(
    html: &str,
    title: &str,
    options: &DocumentOptions,
) -> Result<Vec<u8>, ConversionError> {
    render(&layout_html(html, options), title)
}

// ── Images → PDF ─────────────────────────────────────────────────────────

/// Where an image lands on its page, in millimetres from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_mm: f32,
    pub y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Fit `px_w × px_h` inside the margins, keeping its ratio, centred.
pub fn fit_image(px_w: u32, px_h: u32, page_w: f32, page_h: f32, margin: f32) -> Placement {
    let max_w = page_w - margin * 2.0;
    let max_h = page_h - margin * 2.0;
    let ratio = (max_w / px_w.max(1) as f32).min(max_h / px_h.max(1) as f32);
    let width_mm = px_w as f32 * ratio;
    let height_mm = px_h as f32 * ratio;
    Placement {
        x_mm: (page_w - width_mm) / 2.0,
        y_mm: (page_h - height_mm) / 2.0,
        width_mm,
        height_mm,
    }
}

/// Build a PDF with one image per page, each scaled to fit and centred.
pub fn images_to_pdf(
    images: &[Vec<u8>],
    page_size: PageSize,
    orientation: Orientation,
    margin_mm: f32,
    jpeg_quality: Option<u8>,
) -> Result<Vec<u8>, ConversionError> {
    if images.is_empty() {
        return Err(ConversionError::PdfAuthor("no images provided".into()));
    }

    let (page_w, page_h) = page_size.dimensions_mm(orientation);
    if margin_mm < 0.0 || margin_mm * 2.0 >= page_w.min(page_h) {
        return Err(ConversionError::PdfAuthor(format!(
            "margin {margin_mm} mm leaves no room on a {page_w}×{page_h} mm page"
        )));
    }

    let (doc, first_page, first_layer) =
        PdfDocument::new("images", Mm(page_w), Mm(page_h), "Layer 1");

    for (index, bytes) in images.iter().enumerate() {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ConversionError::Image(format!("image {}: {}", index + 1, e)))?;
        let rgb = decoded.into_rgb8();
        let (w, h) = rgb.dimensions();

        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(page_w), Mm(page_h), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        let place = fit_image(w, h, page_w, page_h, margin_mm);
        let natural_width_mm = w as f32 / IMAGE_DPI * 25.4;
        let scale = place.width_mm / natural_width_mm;

        // With a quality the page embeds a JPEG stream instead of raw RGB.
        let (image_data, image_filter) = match jpeg_quality {
            Some(quality) => {
                let rgb = DynamicImage::ImageRgb8(rgb);
                let jpeg = encode_image(&rgb, RasterFormat::Jpeg, quality)
                    .map_err(|e| ConversionError::Image(format!("image {}: {}", index + 1, e)))?;
                (jpeg, Some(ImageFilter::DCT))
            }
            None => (rgb.into_raw(), None),
        };

        let xobject = ImageXObject {
            width: Px(w as usize),
            height: Px(h as usize),
            color_space: ColorSpace::Rgb,
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data,
            image_filter,
            clipping_bbox: None,
            smask: None,
        };
        Image::from(xobject).add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(place.x_mm)),
                translate_y: Some(Mm(place.y_mm)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        debug!("Placed image {} ({}x{} px) at {:?}", index + 1, w, h, place);
    }

    doc.save_to_bytes().map_err(authoring_error)
}
