use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::pipeline::FileError;

use super::record::{JobProgress, JobRecord, JobStatus, SourceKind};

/// What a client may see of a job. Filesystem locations stay server side.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobPublicView {
    pub id: String,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    pub translator: String,
    pub model: String,
    pub target_language: String,
    pub allowed_extensions: Vec<String>,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub errors: Vec<FileError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub all_files_failed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_url: Option<String>,
}

/// Projects a record for clients. Artifact links are only attached to
/// completed jobs and only when `base_url` is given.
pub fn to_public_view(job: &JobRecord, base_url: Option<&str>) -> JobPublicView {
    let links = base_url
        .filter(|_| job.status == JobStatus::Completed)
        .map(|base| {
            let prefix = format!("{}/api/jobs/{}", base.trim_end_matches('/'), job.id);
            (format!("{}/download", prefix), format!("{}/tree", prefix))
        });
    let (download_url, tree_url) = match links {
        Some((download, tree)) => (Some(download), Some(tree)),
        None => (None, None),
    };

    JobPublicView {
        id: job.id.clone(),
        source_kind: job.source_kind,
        repo_url: job.repo_url.clone(),
        translator: job.translator.clone(),
        model: job.model.clone(),
        target_language: job.target_language.clone(),
        allowed_extensions: job.allowed_extensions.clone(),
        status: job.status,
        progress: job.progress.clone(),
        errors: job.errors.clone(),
        last_error: job.last_error.clone(),
        all_files_failed: job.all_files_failed(),
        created_at: job.created_at,
        updated_at: job.updated_at,
        download_url,
        tree_url,
    }
}
