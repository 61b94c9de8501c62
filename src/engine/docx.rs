//! DOCX extraction: WordprocessingML → HTML, and HTML → approximate Markdown.
//!
//! ## What is kept
//!
//! The HTML writer walks `word/document.xml` once and keeps the structure a
//! reader notices: headings (`HeadingN` and `Title` paragraph styles), bold
//! and italic runs, line breaks, tabs, hyperlinks, list paragraphs (grouped
//! into `<ul>`), tables, and embedded pictures (inlined as data URIs from
//! `word/media`). Everything else (fonts, colours, spacing, headers and
//! footers, comments, tracked deletions) is dropped.
//!
//! ## Markdown is approximate
//!
//! [`html_to_markdown`] is a fixed list of regex substitutions, not an HTML
//! parser. Nested or malformed markup produces best-effort output.

use crate::engine::archive::{read_limited, MAX_ENTRY_BYTES};
use crate::engine::encode::data_uri;
use crate::engine::markup::escape_html;
use crate::error::ConversionError;
use crate::filename;
use crate::formats;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

const DOCUMENT_PART: &str = "word/document.xml";
const RELATIONSHIPS_PART: &str = "word/_rels/document.xml.rels";

type DocxArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Convert a DOCX file to an HTML fragment.
pub fn docx_to_html(bytes: &[u8]) -> Result<String, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ConversionError::Docx(format!("not a DOCX container: {e}")))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?.ok_or_else(|| {
        ConversionError::Docx(format!("missing {DOCUMENT_PART}; is this a Word document?"))
    })?;
    let document = String::from_utf8(document)
        .map_err(|e| ConversionError::Docx(format!("{DOCUMENT_PART} is not UTF-8: {e}")))?;

    let relationships = match read_part(&mut archive, RELATIONSHIPS_PART)? {
        Some(xml) => parse_relationships(&String::from_utf8_lossy(&xml))?,
        None => HashMap::new(),
    };

    let html = HtmlWriter::new(&relationships).write(&document, &mut archive)?;
    debug!("DOCX → HTML: {} bytes of markup", html.len());
    Ok(html)
}

/// Convert a DOCX file to Markdown via [`docx_to_html`] and
/// [`html_to_markdown`].
pub fn docx_to_markdown(bytes: &[u8]) -> Result<String, ConversionError> {
    docx_to_html(bytes).map(|html| html_to_markdown(&html))
}

/// Read one archive member, `None` if it does not exist.
fn read_part(
    archive: &mut DocxArchive<'_>,
    name: &str,
) -> Result<Option<Vec<u8>>, ConversionError> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ConversionError::Docx(format!("{name}: {e}"))),
    };
    let buf = read_limited(&mut file, MAX_ENTRY_BYTES)
        .map_err(|e| ConversionError::Docx(format!("{name}: {e}")))?;
    Ok(Some(buf))
}

// ── Relationships ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Relationship {
    target: String,
    external: bool,
}

/// Local-name lookup of an attribute value, ignoring namespace prefixes.
fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, Relationship>, ConversionError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let external = attr(&e, b"TargetMode").is_some_and(|m| m == "External");
                    rels.insert(id, Relationship { target, external });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ConversionError::Docx(format!("{RELATIONSHIPS_PART}: {e}")));
            }
            _ => {}
        }
    }
    Ok(rels)
}

/// Archive path of a package-internal relationship target.
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{target}"),
    }
}

// ── Document walker ──────────────────────────────────────────────────────

/// Heading level for a paragraph style id such as `Heading2` or `Title`.
fn heading_level(style: &str) -> Option<u8> {
    let style = style.to_ascii_lowercase().replace(' ', "");
    if style == "title" {
        return Some(1);
    }
    let level = style.strip_prefix("heading")?.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

/// `<w:b/>` is on; `<w:b w:val="0"/>` and friends are off.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    attr(e, b"val").is_none_or(|v| !matches!(v.as_str(), "0" | "false" | "off" | "none"))
}

/// State of one open `w:p` and the run inside it.
#[derive(Default)]
struct Paragraph {
    html: String,
    run: String,
    heading: Option<u8>,
    list_item: bool,
    in_props: bool,
    in_run: bool,
    in_run_props: bool,
    in_text: bool,
    bold: bool,
    italic: bool,
}

struct HtmlWriter<'r> {
    relationships: &'r HashMap<String, Relationship>,
    out: String,
    current: Paragraph,
    /// Paragraphs suspended by a nested `w:p` (text boxes, shapes).
    outer: Vec<Paragraph>,
    open_paragraphs: usize,
    /// Blocks from nested paragraphs, emitted after the enclosing one.
    nested: String,
    list_open: bool,
    /// Depth inside `mc:Fallback`, whose content duplicates `mc:Choice`.
    fallback_depth: usize,
    /// One entry per open `w:hyperlink`: whether an `<a>` was emitted.
    links: Vec<bool>,
}

impl<'r> HtmlWriter<'r> {
    fn new(relationships: &'r HashMap<String, Relationship>) -> Self {
        Self {
            relationships,
            out: String::new(),
            current: Paragraph::default(),
            outer: Vec::new(),
            open_paragraphs: 0,
            nested: String::new(),
            list_open: false,
            fallback_depth: 0,
            links: Vec::new(),
        }
    }

    fn write(
        mut self,
        xml: &str,
        archive: &mut DocxArchive<'_>,
    ) -> Result<String, ConversionError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"Fallback" => {
                    self.fallback_depth += 1;
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"Fallback" => {
                    self.fallback_depth = self.fallback_depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ConversionError::Docx(format!(
                        "{DOCUMENT_PART} at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
                Ok(_) if self.fallback_depth > 0 => {}
                Ok(Event::Start(e)) => self.open(&e, false, archive)?,
                Ok(Event::Empty(e)) => self.open(&e, true, archive)?,
                Ok(Event::End(e)) => self.close(e.local_name().as_ref()),
                Ok(Event::Text(t)) if self.current.in_text => {
                    let text = t
                        .unescape()
                        .map_err(|e| ConversionError::Docx(format!("{DOCUMENT_PART}: {e}")))?;
                    self.current.run.push_str(&escape_html(&text));
                }
                _ => {}
            }
        }

        self.close_list();
        Ok(self.out)
    }

    fn open(
        &mut self,
        e: &BytesStart<'_>,
        empty: bool,
        archive: &mut DocxArchive<'_>,
    ) -> Result<(), ConversionError> {
        match e.local_name().as_ref() {
            b"p" if empty => {
                if self.open_paragraphs == 0 {
                    self.close_list();
                }
            }
            b"p" => {
                let suspended = std::mem::take(&mut self.current);
                if self.open_paragraphs > 0 {
                    self.outer.push(suspended);
                }
                self.open_paragraphs += 1;
            }
            b"pPr" if !empty => self.current.in_props = true,
            b"pStyle" if self.current.in_props => {
                self.current.heading = attr(e, b"val").as_deref().and_then(heading_level);
            }
            b"numPr" if self.current.in_props => self.current.list_item = true,
            b"r" if !empty => {
                self.current.in_run = true;
                self.current.bold = false;
                self.current.italic = false;
                self.current.run.clear();
            }
            b"rPr" if self.current.in_run && !empty => self.current.in_run_props = true,
            b"b" if self.current.in_run_props => self.current.bold = toggle_on(e),
            b"i" if self.current.in_run_props => self.current.italic = toggle_on(e),
            b"t" if self.current.in_run && !empty => self.current.in_text = true,
            b"br" | b"cr" if self.current.in_run => self.current.run.push_str("<br />"),
            b"tab" if self.current.in_run && !self.current.in_run_props => {
                self.current.run.push('\t');
            }
            b"hyperlink" if !empty => {
                let href = self.hyperlink_target(e);
                if let Some(href) = &href {
                    self.current
                        .html
                        .push_str(&format!("<a href=\"{}\">", escape_html(href)));
                }
                self.links.push(href.is_some());
            }
            b"blip" => {
                if let Some(img) = self.embedded_image(e, archive)? {
                    if self.current.in_run {
                        self.current.run.push_str(&img);
                    } else {
                        self.current.html.push_str(&img);
                    }
                }
            }
            b"tbl" if !empty => {
                self.close_list();
                self.out.push_str("<table>\n");
            }
            b"tr" if !empty => self.out.push_str("<tr>"),
            b"tc" if !empty => self.out.push_str("<td>"),
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"p" => self.finish_paragraph(),
            b"pPr" => self.current.in_props = false,
            b"r" => {
                flush_run(&mut self.current);
                self.current.in_run = false;
            }
            b"rPr" => self.current.in_run_props = false,
            b"t" => self.current.in_text = false,
            b"hyperlink" => {
                if self.links.pop() == Some(true) {
                    self.current.html.push_str("</a>");
                }
            }
            b"tbl" => self.out.push_str("</table>\n"),
            b"tr" => self.out.push_str("</tr>\n"),
            b"tc" => self.out.push_str("</td>"),
            _ => {}
        }
    }

    fn finish_paragraph(&mut self) {
        self.open_paragraphs = self.open_paragraphs.saturating_sub(1);
        let done = std::mem::take(&mut self.current);

        if let Some(parent) = self.outer.pop() {
            self.current = parent;
            if let Some(block) = block_html(&done) {
                self.nested.push_str(&block);
            }
            return;
        }

        if done.list_item {
            if !self.list_open {
                self.out.push_str("<ul>\n");
                self.list_open = true;
            }
            self.out.push_str(&format!("<li>{}</li>\n", done.html));
        } else {
            self.close_list();
            if let Some(block) = block_html(&done) {
                self.out.push_str(&block);
            }
        }

        if !self.nested.is_empty() {
            self.close_list();
            self.out.push_str(&std::mem::take(&mut self.nested));
        }
    }

    fn close_list(&mut self) {
        if self.list_open {
            self.out.push_str("</ul>\n");
            self.list_open = false;
        }
    }

    fn hyperlink_target(&self, e: &BytesStart<'_>) -> Option<String> {
        if let Some(rel) = attr(e, b"id").and_then(|id| self.relationships.get(&id)) {
            return Some(rel.target.clone());
        }
        attr(e, b"anchor").map(|anchor| format!("#{anchor}"))
    }

    /// `<img>` for an `a:blip` whose picture lives in the package.
    fn embedded_image(
        &self,
        e: &BytesStart<'_>,
        archive: &mut DocxArchive<'_>,
    ) -> Result<Option<String>, ConversionError> {
        let Some(rel) = attr(e, b"embed").and_then(|id| self.relationships.get(&id)) else {
            return Ok(None);
        };
        if rel.external {
            return Ok(None);
        }

        let path = part_path(&rel.target);
        let Some(bytes) = read_part(archive, &path)? else {
            debug!("Picture {} referenced but not packaged", path);
            return Ok(None);
        };
        let media_type = formats::media_type_for(filename::extension(&path));
        Ok(Some(format!("<img src=\"{}\" />", data_uri(&bytes, &media_type))))
    }
}

fn flush_run(p: &mut Paragraph) {
    if p.run.is_empty() {
        return;
    }
    let mut html = std::mem::take(&mut p.run);
    if p.italic {
        html = format!("<em>{html}</em>");
    }
    if p.bold {
        html = format!("<strong>{html}</strong>");
    }
    p.html.push_str(&html);
}

/// `<hN>` or `<p>` for a finished paragraph, `None` when it holds no text.
fn block_html(p: &Paragraph) -> Option<String> {
    if p.html.trim().is_empty() {
        return None;
    }
    Some(match p.heading {
        Some(level) => format!("<h{level}>{}</h{level}>\n", p.html),
        None => format!("<p>{}</p>\n", p.html),
    })
}

// ── HTML → Markdown ──────────────────────────────────────────────────────

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h([1-6])(?:\s[^>]*)?>(.*?)</h[1-6]>").unwrap());

static RE_BOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:strong|b)(?:\s[^>]*)?>(.*?)</(?:strong|b)>").unwrap()
});

static RE_ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(?:em|i)(?:\s[^>]*)?>(.*?)</(?:em|i)>").unwrap());

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").unwrap());

static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static RE_BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Approximate Markdown from HTML with a fixed, ordered rule list.
///
/// Rules (applied in order):
/// 1. `<hN>` → `N` hashes, a space, the content, a blank line
/// 2. `<strong>`/`<b>` → `**…**`
/// 3. `<em>`/`<i>` → `*…*`
/// 4. `<p>` → content followed by a blank line
/// 5. `<br>` → newline
/// 6. every remaining tag is removed
/// 7. three or more newlines collapse to two
///
/// The result is trimmed.
///
/// Tag names match case-insensitively, content may span lines, and a tag
/// name must end at `>` or whitespace, so `<pre>` is not read as `<p>` and
/// `<body>` is not read as `<b>`. Character entities such as `&amp;` are left
/// encoded.
pub fn html_to_markdown(html: &str) -> String {
    let s = RE_HEADING.replace_all(html, |caps: &Captures<'_>| {
        let level = caps[1].parse::<usize>().unwrap_or(1);
        format!("{} {}\n\n", "#".repeat(level), &caps[2])
    });
    let s = RE_BOLD.replace_all(&s, "**${1}**");
    let s = RE_ITALIC.replace_all(&s, "*${1}*");
    let s = RE_PARAGRAPH.replace_all(&s, "${1}\n\n");
    let s = RE_LINE_BREAK.replace_all(&s, "\n");
    let s = RE_ANY_TAG.replace_all(&s, "");
    let s = RE_BLANK_RUN.replace_all(&s, "\n\n");
    s.trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
<w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Revenue was </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>up</w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t xml:space="preserve"> again</w:t></w:r><w:r><w:t xml:space="preserve"> &amp; steady.</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>First</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Second</w:t></w:r></w:p>
<w:p><w:hyperlink r:id="rId2"><w:r><w:t>site</w:t></w:r></w:hyperlink></w:p>
<w:p><w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed="rId3"/></a:graphicData></a:graphic></w:drawing></w:r></w:p>
<w:p/>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:rPr><w:b w:val="0"/></w:rPr><w:t>plain</w:t><w:br/><w:t>next</w:t></w:r></w:p>
</w:body>
</w:document>"#;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

    pub(crate) fn build_docx(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in parts {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub(crate) fn sample_docx() -> Vec<u8> {
        build_docx(&[
            (DOCUMENT_PART, DOCUMENT.as_bytes()),
            (RELATIONSHIPS_PART, RELS.as_bytes()),
            ("word/media/image1.png", b"\x89PNG fake"),
        ])
    }

    #[test]
    fn headings_and_runs() {
        let html = docx_to_html(&sample_docx()).unwrap();
        assert!(html.contains("<h1>Quarterly Report</h1>"), "{html}");
        assert!(
            html.contains("<p>Revenue was <strong>up</strong><em> again</em> &amp; steady.</p>"),
            "{html}"
        );
        assert!(html.contains("<p>plain<br />next</p>"), "{html}");
    }

    #[test]
    fn lists_links_images_tables() {
        let html = docx_to_html(&sample_docx()).unwrap();
        assert!(html.contains("<ul>\n<li>First</li>\n<li>Second</li>\n</ul>"), "{html}");
        assert!(
            html.contains(r#"<a href="https://example.com/?a=1&amp;b=2">site</a>"#),
            "{html}"
        );
        assert!(html.contains(r#"<img src="data:image/png;base64,"#), "{html}");
        assert!(html.contains("<table>\n<tr><td><p>A1</p>\n</td></tr>\n</table>"), "{html}");
    }

    #[test]
    fn not_a_zip_is_a_docx_error() {
        let err = docx_to_html(b"plain text, not a container").unwrap_err();
        assert!(matches!(err, ConversionError::Docx(_)));
    }

    #[test]
    fn zip_without_document_part_is_rejected() {
        let bytes = build_docx(&[("hello.txt", b"hi")]);
        let err = docx_to_html(&bytes).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn heading_styles() {
        assert_eq!(heading_level("Heading1"), Some(1));
        assert_eq!(heading_level("heading 3"), Some(3));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Heading9"), None);
        assert_eq!(heading_level("Normal"), None);
    }

    #[test]
    fn markdown_rules_apply_in_order() {
        let html = "<h2>Title</h2><p>Some <strong>bold</strong> and <em>it</em><br/>next</p>\n\n\n<p>x</p>";
        assert_eq!(
            html_to_markdown(html),
            "## Title\n\nSome **bold** and *it*\nnext\n\nx"
        );
    }

    #[test]
    fn markdown_rules_do_not_touch_lookalike_tags() {
        let md = html_to_markdown("<pre>code</pre><blockquote>q</blockquote><img src=\"x\" />");
        assert_eq!(md, "codeq");
    }

    #[test]
    fn docx_to_markdown_end_to_end() {
        let md = docx_to_markdown(&sample_docx()).unwrap();
        assert!(md.starts_with("# Quarterly Report\n\n"), "{md}");
        assert!(md.contains("Revenue was **up*** again* &amp; steady."), "{md}");
    }

    fn body_only_docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:v="urn:schemas-microsoft-com:vml" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:wps="http://schemas.microsoft.com/office/word/2010/wordprocessingShape">
<w:body>{body}</w:body>
</w:document>"#
        );
        build_docx(&[(DOCUMENT_PART, xml.as_bytes())])
    }

    #[test]
    fn text_box_keeps_enclosing_paragraph() {
        let bytes = body_only_docx(
            "<w:p><w:r><w:t xml:space=\"preserve\">Before </w:t></w:r>\
             <w:r><w:pict><v:shape><v:textbox><w:txbxContent>\
             <w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Boxed</w:t></w:r></w:p>\
             </w:txbxContent></v:textbox></v:shape></w:pict></w:r>\
             <w:r><w:t>After</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Next</w:t></w:r></w:p>",
        );

        let html = docx_to_html(&bytes).unwrap();
        assert_eq!(
            html,
            "<p>Before After</p>\n<p><strong>Boxed</strong></p>\n<p>Next</p>\n"
        );
    }

    #[test]
    fn alternate_content_fallback_is_not_duplicated() {
        let bytes = body_only_docx(
            "<w:p><w:r><w:t xml:space=\"preserve\">Intro </w:t></w:r>\
             <w:r><mc:AlternateContent>\
             <mc:Choice Requires=\"wps\"><w:drawing><wps:txbx><w:txbxContent>\
             <w:p><w:r><w:t>Shape text</w:t></w:r></w:p>\
             </w:txbxContent></wps:txbx></w:drawing></mc:Choice>\
             <mc:Fallback><w:pict><v:textbox><w:txbxContent>\
             <w:p><w:r><w:t>Shape text</w:t></w:r></w:p>\
             </w:txbxContent></v:textbox></w:pict></mc:Fallback>\
             </mc:AlternateContent></w:r></w:p>",
        );

        let html = docx_to_html(&bytes).unwrap();
        assert_eq!(html, "<p>Intro </p>\n<p>Shape text</p>\n");
        assert_eq!(html.matches("Shape text").count(), 1);
    }
}
