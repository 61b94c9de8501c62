//! Output delivery: write converted payloads into a directory.
//!
//! Every file is written atomically (temp file, then rename) so a reader of
//! the output directory never sees a partial result.

use crate::engine::archive;
use crate::error::MorphError;
use crate::filename;
use crate::session::{ConversionTask, Session};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the archive written by [`save_all_as_zip`] when the caller has
/// no preference.
pub const DEFAULT_ZIP_NAME: &str = "converted-files.zip";

/// Save one task's result under its output name inside `dir`.
pub async fn save_result(task: &ConversionTask, dir: &Path) -> Result<PathBuf, MorphError> {
    let (name, bytes) = deliverable(task)?;
    write_atomic(&dir.join(name), bytes).await
}

/// Save every Converted task in queue order, waiting `stagger` between
/// files. Names that collide within the run get a ` (n)` suffix.
pub async fn save_all(
    session: &Session,
    dir: &Path,
    stagger: Duration,
) -> Result<Vec<PathBuf>, MorphError> {
    let tasks: Vec<&ConversionTask> = session.converted().collect();
    if tasks.is_empty() {
        return Err(MorphError::NothingToDownload);
    }

    let mut taken = HashSet::new();
    let mut saved = Vec::with_capacity(tasks.len());
    for (i, task) in tasks.into_iter().enumerate() {
        if i > 0 && !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }
        let (name, bytes) = deliverable(task)?;
        let name = unique_name(&mut taken, name);
        saved.push(write_atomic(&dir.join(name), bytes).await?);
    }

    info!("Saved {} file(s) to {}", saved.len(), dir.display());
    Ok(saved)
}

/// Bundle every Converted task into one zip inside `dir`.
pub async fn save_all_as_zip(
    session: &Session,
    dir: &Path,
    zip_name: &str,
) -> Result<PathBuf, MorphError> {
    let mut taken = HashSet::new();
    let mut entries = Vec::new();
    for task in session.converted() {
        let (name, bytes) = deliverable(task)?;
        entries.push((unique_name(&mut taken, name), bytes.to_vec()));
    }
    if entries.is_empty() {
        return Err(MorphError::NothingToDownload);
    }

    let zip = archive::pack(&entries).map_err(|e| MorphError::Internal(e.to_string()))?;
    let path = write_atomic(&dir.join(zip_name), &zip).await?;
    info!("Saved {} file(s) into {}", entries.len(), path.display());
    Ok(path)
}

/// Payload and safe file name of a task, or `DownloadUnavailable`.
fn deliverable(task: &ConversionTask) -> Result<(&str, &[u8]), MorphError> {
    let unavailable = || MorphError::DownloadUnavailable {
        name: task.name.clone(),
    };
    let result = task.result.as_ref().ok_or_else(unavailable)?;

    let name = Path::new(&result.output_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .ok_or_else(unavailable)?;
    Ok((name, &result.bytes))
}

/// `name`, or `stem (n).ext` if it is already in `taken`.
fn unique_name(taken: &mut HashSet<String>, name: &str) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let stem = filename::strip_extension(name);
    let ext = filename::extension(name);
    let mut n = 1;
    loop {
        let candidate = if ext.is_empty() {
            format!("{stem} ({n})")
        } else {
            format!("{stem} ({n}).{ext}")
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<PathBuf, MorphError> {
    let write_failed = |source| MorphError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;

    debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_name_suffixes_collisions() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name(&mut taken, "a.webp"), "a.webp");
        assert_eq!(unique_name(&mut taken, "a.webp"), "a (1).webp");
        assert_eq!(unique_name(&mut taken, "a.webp"), "a (2).webp");
        assert_eq!(unique_name(&mut taken, "README"), "README");
        assert_eq!(unique_name(&mut taken, "README"), "README (1)");
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");

        write_atomic(&path, b"hello").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("out.txt")]);
    }
}
