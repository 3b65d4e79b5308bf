//! Read access to a finished job's output tree and archive.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::JobError;
use crate::path_safety::{normalize_relative_path, resolve_safe_path};
use crate::scan::list_files;

use super::orchestrator::JobService;
use super::record::{JobRecord, JobStatus};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutputFile {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileContent {
    pub relative_path: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ArchiveDownload {
    pub path: PathBuf,
    /// Suggested attachment name.
    pub file_name: String,
}

impl JobService {
    /// Relative path and size of every file in a completed job's output tree.
    pub async fn list_output_files(&self, id: &str) -> Result<Vec<OutputFile>, JobError> {
        let job = self.completed_job(id)?;
        let root = job.output_root.clone();

        tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for relative in list_files(&root, &[])? {
                let path = resolve_safe_path(&root, &relative)?;
                let size = std::fs::metadata(&path)
                    .map_err(|source| JobError::Io {
                        path: PathBuf::from(&relative),
                        source,
                    })?
                    .len();
                files.push(OutputFile { path: relative, size });
            }
            Ok::<_, JobError>(files)
        })
        .await
        .map_err(|e| JobError::Io {
            path: job.output_root.clone(),
            source: std::io::Error::other(e.to_string()),
        })?
    }

    /// Reads one output file. `relative_path` is untrusted.
    pub async fn read_output_file(&self, id: &str, relative_path: &str) -> Result<FileContent, JobError> {
        let job = self.completed_job(id)?;
        let relative = normalize_relative_path(relative_path)?;
        let path = resolve_safe_path(&job.output_root, &relative)?;

        // Errors name the relative path only.
        let bytes = tokio::fs::read(&path).await.map_err(|source| JobError::Io {
            path: PathBuf::from(&relative),
            source,
        })?;
        let content_type = mime_guess::from_path(&relative)
            .first_or_text_plain()
            .essence_str()
            .to_string();

        Ok(FileContent {
            relative_path: relative,
            bytes,
            content_type,
        })
    }

    /// Locates the archive of a completed job for download.
    pub async fn archive_for_download(&self, id: &str) -> Result<ArchiveDownload, JobError> {
        let job = self.completed_job(id)?;
        if job.all_files_failed() {
            return Err(JobError::AllFilesFailed);
        }

        match tokio::fs::metadata(&job.archive_path).await {
            Ok(meta) if meta.is_file() => Ok(ArchiveDownload {
                path: job.archive_path,
                file_name: format!("{}-translated.zip", job.id),
            }),
            _ => Err(JobError::MissingArtifact(job.archive_path)),
        }
    }

    fn completed_job(&self, id: &str) -> Result<JobRecord, JobError> {
        let job = self.get(id)?;
        if job.status != JobStatus::Completed {
            return Err(JobError::NotCompleted);
        }
        Ok(job)
    }
}
