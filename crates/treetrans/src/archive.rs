//! Zip packaging of a job's output tree.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveError, ScanError};
use crate::sanitize;

/// Writes every regular file under `source_dir` into a zip at `zip_path`,
/// keyed by its forward-slash relative path. Symlinks are skipped.
///
/// The archive is assembled in a temporary file next to `zip_path` and only
/// renamed into place once complete, so a failure never leaves a truncated
/// archive at the final path. Returns the number of files written.
pub fn create_zip_from_directory(source_dir: &Path, zip_path: &Path) -> Result<usize, ArchiveError> {
    let parent = zip_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Create {
        path: parent.to_path_buf(),
        source,
    })?;

    let staging = NamedTempFile::new_in(parent).map_err(|source| ArchiveError::Create {
        path: zip_path.to_path_buf(),
        source,
    })?;

    let mut writer = ZipWriter::new(staging.as_file());
    let count = write_entries(&mut writer, source_dir, &[zip_path, staging.path()])?;
    let file = writer.finish().map_err(|e| ArchiveError::Finalize {
        path: zip_path.to_path_buf(),
        message: e.to_string(),
    })?;
    file.sync_all().map_err(|e| ArchiveError::Finalize {
        path: zip_path.to_path_buf(),
        message: e.to_string(),
    })?;

    staging.persist(zip_path).map_err(|e| ArchiveError::Finalize {
        path: zip_path.to_path_buf(),
        message: e.error.to_string(),
    })?;

    log::info!("Archived {} files into {}", count, sanitize::file_name_only(zip_path));
    Ok(count)
}

/// Async wrapper that runs [`create_zip_from_directory`] on the blocking pool.
pub async fn archive_directory(source_dir: PathBuf, zip_path: PathBuf) -> Result<usize, ArchiveError> {
    tokio::task::spawn_blocking(move || create_zip_from_directory(&source_dir, &zip_path))
        .await
        .map_err(|e| ArchiveError::TaskAborted(e.to_string()))?
}

fn write_entries<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    source_dir: &Path,
    exclude: &[&Path],
) -> Result<usize, ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(0o644);

    let mut count = 0;
    let walker = WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: source_dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() || exclude.iter().any(|p| *p == entry.path()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let Some(name) = relative.to_str().map(|s| s.replace('\\', "/")) else {
            log::warn!("Skipping non UTF-8 path in archive: {}", relative.display());
            continue;
        };

        writer
            .start_file(name.as_str(), options)
            .map_err(|source| ArchiveError::AddEntry {
                entry: name.clone(),
                source,
            })?;

        let mut file = File::open(entry.path()).map_err(|source| ArchiveError::ReadSource {
            path: entry.path().to_path_buf(),
            source,
        })?;
        std::io::copy(&mut file, writer).map_err(|source| ArchiveError::ReadSource {
            path: entry.path().to_path_buf(),
            source,
        })?;

        count += 1;
    }

    Ok(count)
}
