//! Export folder packaging and cleanup

use crate::error::ArchiveError;
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// `<prefix>_YYYYMMDD_HHMMSS.zip`
pub fn archive_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.zip", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Path of `path` below `root`, always with `/` separators
fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

fn collect_files(source: &Path, skip: &Path) -> Vec<PathBuf> {
    WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.path() != skip)
        .map(|entry| entry.into_path())
        .collect()
}

/// Zip every file under `source` into a timestamped archive in `archive_dir`.
///
/// A missing source directory is created for the operator and reported as
/// `NoFiles`, same as an empty one. No archive is written in either case.
pub fn compress_dir(
    source: &Path,
    archive_dir: &Path,
    prefix: &str,
    now: DateTime<Local>,
) -> Result<PathBuf, ArchiveError> {
    if !source.exists() {
        fs::create_dir_all(source)?;
        log::info!("Created export folder {}", source.display());
        return Err(ArchiveError::NoFiles(source.to_path_buf()));
    }

    let archive_path = archive_dir.join(archive_name(prefix, now));
    let files = collect_files(source, &archive_path);
    if files.is_empty() {
        return Err(ArchiveError::NoFiles(source.to_path_buf()));
    }

    fs::create_dir_all(archive_dir)?;
    match write_archive(source, &files, &archive_path) {
        Ok(()) => {
            log::info!("Compressed {} files into {}", files.len(), archive_path.display());
            Ok(archive_path)
        }
        Err(e) => {
            // Never leave a truncated archive behind
            let _ = fs::remove_file(&archive_path);
            Err(e)
        }
    }
}

fn write_archive(source: &Path, files: &[PathBuf], archive_path: &Path) -> Result<(), ArchiveError> {
    let mut zip = ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let Some(name) = relative_name(source, path) else {
            continue;
        };
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(path)?;
        io::copy(&mut input, &mut zip)?;
    }

    let mut file = zip.finish()?;
    file.flush()?;
    Ok(())
}

/// Empty the export folder and delete old archives; returns how many entries went
pub fn clear_exports(source: &Path, archive_dir: &Path, prefix: &str) -> usize {
    let mut removed = 0;

    if let Ok(entries) = fs::read_dir(source) {
        for entry in entries.flatten() {
            let path = entry.path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }

    let archive_prefix = format!("{}_", prefix);
    if let Ok(entries) = fs::read_dir(archive_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !(name.starts_with(&archive_prefix) && name.ends_with(".zip")) {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("Could not remove archive {}: {}", name, e),
            }
        }
    }

    log::info!("Cleared {} export entries", removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    fn archived_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("photos", now()), "photos_20240309_140507.zip");
    }

    #[test]
    fn test_empty_dir_is_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Exports");
        fs::create_dir_all(source.join("nested")).unwrap();

        let err = compress_dir(&source, dir.path(), "photos", now()).unwrap_err();
        assert!(matches!(err, ArchiveError::NoFiles(_)));
        assert!(!dir.path().join("photos_20240309_140507.zip").exists());
    }

    #[test]
    fn test_missing_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Exports");

        let err = compress_dir(&source, dir.path(), "photos", now()).unwrap_err();
        assert!(matches!(err, ArchiveError::NoFiles(_)));
        assert!(source.is_dir());
    }

    #[test]
    fn test_archive_holds_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Exports");
        fs::create_dir_all(source.join("raw")).unwrap();
        fs::write(source.join("a.jpg"), b"aaa").unwrap();
        fs::write(source.join("b.jpg"), b"bbb").unwrap();
        fs::write(source.join("raw").join("c.dng"), b"ccc").unwrap();

        let path = compress_dir(&source, dir.path(), "photos", now()).unwrap();
        assert_eq!(path, dir.path().join("photos_20240309_140507.zip"));
        assert_eq!(archived_names(&path), vec!["a.jpg", "b.jpg", "raw/c.dng"]);
    }

    #[test]
    fn test_archive_inside_source_is_not_included() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"aaa").unwrap();

        let path = compress_dir(dir.path(), dir.path(), "photos", now()).unwrap();
        assert_eq!(archived_names(&path), vec!["a.jpg"]);
    }

    #[test]
    fn test_clear_exports() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Exports");
        fs::create_dir_all(source.join("raw")).unwrap();
        fs::write(source.join("a.jpg"), b"a").unwrap();
        fs::write(dir.path().join("photos_20240309_140507.zip"), b"z").unwrap();
        fs::write(dir.path().join("keep.zip"), b"z").unwrap();

        assert_eq!(clear_exports(&source, dir.path(), "photos"), 3);
        assert!(source.is_dir());
        assert_eq!(fs::read_dir(&source).unwrap().count(), 0);
        assert!(dir.path().join("keep.zip").exists());
    }
}
