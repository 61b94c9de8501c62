//! Filename helpers: source extension detection and output naming.

/// Return the substring after the final `.` of `name`, or `""` when the name
/// contains no dot.
///
/// The value is returned exactly as written; callers that compare against
/// the format tables lowercase it first.
///
/// ```
/// use metamorpher::filename::extension;
///
/// assert_eq!(extension("photo.png"), "png");
/// assert_eq!(extension("archive.tar.gz"), "gz");
/// assert_eq!(extension("README"), "");
/// ```
pub fn extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Return `name` without its final `.extension`, or the whole name when it
/// has no dot.
pub fn strip_extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
}

/// Output filename for converting `name` into `target`.
pub fn output_name(name: &str, target: &str) -> String {
    format!("{}.{}", strip_extension(name), target)
}

/// Output filename used when a multi-page PDF is rasterised into a zip.
pub fn pages_archive_name(name: &str) -> String {
    format!("{}_pages.zip", strip_extension(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_takes_text_after_last_dot() {
        assert_eq!(extension("photo.png"), "png");
        assert_eq!(extension("my.holiday.photo.JPG"), "JPG");
        assert_eq!(extension(".bashrc"), "bashrc");
        assert_eq!(extension("trailing."), "");
    }

    #[test]
    fn extension_empty_without_dot() {
        assert_eq!(extension("Makefile"), "");
        assert_eq!(extension(""), "");
    }

    #[test]
    fn strip_extension_keeps_inner_dots() {
        assert_eq!(strip_extension("my.holiday.photo.jpg"), "my.holiday.photo");
        assert_eq!(strip_extension("Makefile"), "Makefile");
    }

    #[test]
    fn output_name_swaps_extension() {
        assert_eq!(output_name("photo.png", "webp"), "photo.webp");
        assert_eq!(output_name("notes.md", "html"), "notes.html");
        assert_eq!(output_name("clip", "mp4"), "clip.mp4");
    }

    #[test]
    fn pages_archive_name_uses_suffix() {
        assert_eq!(pages_archive_name("invoice.pdf"), "invoice_pages.zip");
    }
}
