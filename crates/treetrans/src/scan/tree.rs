use std::collections::HashSet;
use std::path::{Component, Path};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ScanError;

/// Directory names pruned from every scan: version control metadata,
/// dependency caches, editor folders and common build output.
pub const DEFAULT_IGNORED_DIRECTORIES: &[&str] = &[
    ".git",
    "node_modules",
    ".next",
    ".turbo",
    ".idea",
    ".vscode",
    "dist",
    "build",
];

/// Lists every regular file under `root` as a forward-slash relative path,
/// sorted ascending.
///
/// Ignored directories are pruned at any depth and symbolic links are never
/// followed. An unreadable root is an error; unreadable entries below it are
/// logged and skipped.
pub fn list_files(root: &Path, extra_ignored: &[String]) -> Result<Vec<String>, ScanError> {
    let ignored: HashSet<&str> = DEFAULT_IGNORED_DIRECTORIES
        .iter()
        .copied()
        .chain(extra_ignored.iter().map(String::as_str))
        .collect();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map(|name| !ignored.contains(name))
                .unwrap_or(true)
        });

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(ScanError::Walk {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.depth() == 0 || entry.file_type().is_symlink() || !entry.file_type().is_file() {
            continue;
        }

        match relative_slash_path(root, entry.path()) {
            Some(relative) => files.push(relative),
            None => warn!("Skipping non UTF-8 path: {}", entry.path().display()),
        }
    }

    files.sort();

    debug!("Scan of {} found {:?}", root.display(), files);
    info!("Scanned {} files in {}", files.len(), root.display());
    Ok(files)
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}
