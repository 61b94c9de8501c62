//! In-memory zip assembly and extraction.

use crate::error::ConversionError;
use std::io::{Cursor, Read, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A named payload inside an archive.
pub type Entry = (String, Vec<u8>);

/// Largest single entry read out of a zip. Declared sizes in the header are
/// not trusted.
pub(crate) const MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

/// Read at most `limit` bytes from `reader`; more than that is an error.
pub(crate) fn read_limited(reader: impl Read, limit: u64) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(limit + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("entry larger than {limit} bytes"),
        ));
    }
    Ok(buf)
}

fn archive_error(e: impl std::fmt::Display) -> ConversionError {
    ConversionError::Archive(e.to_string())
}

/// Bundle `entries` into a zip, keeping every name exactly as given.
pub fn pack(entries: &[Entry]) -> Result<Vec<u8>, ConversionError> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        for (name, bytes) in entries {
            zip.start_file(name.as_str(), options)
                .map_err(|e| archive_error(format!("{name}: {e}")))?;
            zip.write_all(bytes)
                .map_err(|e| archive_error(format!("{name}: {e}")))?;
        }
        zip.finish().map_err(archive_error)?;
    }

    debug!("Packed {} entries → {} bytes", entries.len(), buffer.len());
    Ok(buffer)
}

/// Read every file out of a zip. Directories are skipped, as are entries
/// whose names would escape the extraction directory.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Entry>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(archive_error)?;
        if file.is_dir() {
            continue;
        }
        let Some(path) = file.enclosed_name() else {
            warn!("Skipping unsafe archive entry '{}'", file.name());
            continue;
        };
        let name = path.to_string_lossy().replace('\\', "/");

        let payload = read_limited(&mut file, MAX_ENTRY_BYTES)
            .map_err(|e| archive_error(format!("{name}: {e}")))?;
        entries.push((name, payload));
    }

    debug!("Unpacked {} entries", entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_limited_stops_at_the_limit() {
        assert_eq!(read_limited(&b"12345"[..], 5).unwrap(), b"12345");

        let err = read_limited(&b"123456"[..], 5).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn pack_preserves_names_and_order() {
        let entries = vec![
            ("invoice_page_1.jpg".to_string(), vec![1, 2, 3]),
            ("invoice_page_2.jpg".to_string(), vec![4, 5]),
            ("nested/dir/file.txt".to_string(), b"text".to_vec()),
        ];
        let zip = pack(&entries).unwrap();
        assert_eq!(&zip[..2], b"PK");
        assert_eq!(unpack(&zip).unwrap(), entries);
    }

    #[test]
    fn unpack_skips_directories() {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            zip.add_directory("photos/", SimpleFileOptions::default()).unwrap();
            zip.start_file("photos/a.png", SimpleFileOptions::default()).unwrap();
            zip.write_all(b"png").unwrap();
            zip.finish().unwrap();
        }
        let entries = unpack(&buffer).unwrap();
        assert_eq!(entries, vec![("photos/a.png".to_string(), b"png".to_vec())]);
    }

    #[test]
    fn unpack_rejects_non_zip() {
        assert!(matches!(unpack(b"not a zip"), Err(ConversionError::Archive(_))));
    }

    #[test]
    fn empty_archive_round_trips() {
        let zip = pack(&[]).unwrap();
        assert!(unpack(&zip).unwrap().is_empty());
    }
}
