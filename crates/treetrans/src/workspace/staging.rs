use std::path::Path;

use crate::config::UploadLimits;
use crate::error::WorkspaceError;
use crate::path_safety::{normalize_relative_path, resolve_safe_path};
use crate::scan::should_ignore_upload_path;

/// One file of an uploaded folder.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Path relative to the uploaded folder, as reported by the client.
    pub relative_path: String,
    pub contents: Vec<u8>,
}

impl UploadedFile {
    pub fn new(relative_path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: contents.into(),
        }
    }
}

/// Writes uploaded files below `input_root` and returns how many were kept.
///
/// Paths are normalized and those inside ignored directories dropped. Every
/// limit is checked before the first byte is written, so a rejected upload
/// leaves nothing behind.
pub async fn stage_uploads(
    input_root: &Path,
    files: Vec<UploadedFile>,
    limits: &UploadLimits,
) -> Result<usize, WorkspaceError> {
    if files.is_empty() {
        return Err(WorkspaceError::InvalidUpload("No files were uploaded".to_string()));
    }

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let relative = normalize_relative_path(&file.relative_path)?;
        if should_ignore_upload_path(&relative) {
            continue;
        }
        staged.push((relative, file.contents));
    }

    if staged.is_empty() {
        return Err(WorkspaceError::InvalidUpload(
            "No eligible files were uploaded after filtering ignored directories".to_string(),
        ));
    }

    if staged.len() > limits.max_file_count {
        return Err(WorkspaceError::InvalidUpload(format!(
            "Too many files. Maximum {} files per job",
            limits.max_file_count
        )));
    }

    let mut total: u64 = 0;
    for (relative, contents) in &staged {
        let size = contents.len() as u64;
        if size > limits.max_file_bytes {
            return Err(WorkspaceError::InvalidUpload(format!("File too large: {}", relative)));
        }
        total += size;
        if total > limits.max_total_bytes {
            return Err(WorkspaceError::InvalidUpload("Uploaded folder is too large".to_string()));
        }
    }

    let count = staged.len();
    for (relative, contents) in staged {
        let destination = resolve_safe_path(input_root, &relative)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WorkspaceError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&destination, contents)
            .await
            .map_err(|source| WorkspaceError::WriteFile {
                path: destination.clone(),
                source,
            })?;
    }

    log::debug!("Staged {} uploaded files", count);
    Ok(count)
}
