//! Job records and the status state machine.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::{FileError, PipelineProgress};

/// Where a job's input tree came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    LocalUpload,
    RemoteRepository,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::LocalUpload => write!(f, "local-upload"),
            SourceKind::RemoteRepository => write!(f, "remote-repository"),
        }
    }
}

/// Status of a job.
///
/// ```text
/// queued --> running --> completed | failed
/// queued | running --> cancelled
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is a legal transition. Staying in
    /// the same status is always allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            JobStatus::Queued => matches!(
                next,
                JobStatus::Running | JobStatus::Failed | JobStatus::Cancelled
            ),
            JobStatus::Running => matches!(
                next,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            ),
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

impl From<&PipelineProgress> for JobProgress {
    fn from(progress: &PipelineProgress) -> Self {
        Self {
            total_files: progress.total_files,
            processed_files: progress.processed_files,
            failed_files: progress.failed_files,
            current_file: Some(progress.current_file.clone()),
        }
    }
}

/// One unit of translation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    pub translator: String,
    pub model: String,
    pub target_language: String,
    pub allowed_extensions: Vec<String>,
    /// Output location as resolved at submission time.
    pub output_folder: PathBuf,
    pub workspace_root: PathBuf,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub archive_path: PathBuf,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub errors: Vec<FileError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// A completed run in which every discovered file failed.
    pub fn all_files_failed(&self) -> bool {
        self.progress.total_files > 0 && self.progress.processed_files == self.progress.failed_files
    }
}

/// Fields supplied when a job record is created.
#[derive(Debug, Clone)]
pub struct NewJob {
    /// Generated when absent.
    pub id: Option<String>,
    pub source_kind: SourceKind,
    pub repo_url: Option<String>,
    pub translator: String,
    pub model: String,
    pub target_language: String,
    pub allowed_extensions: Vec<String>,
    pub output_folder: PathBuf,
    pub workspace_root: PathBuf,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub archive_path: PathBuf,
}

/// A shallow set of changes merged into an existing record. `None` leaves a
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<JobProgress>,
    /// Replaces the error list.
    pub errors: Option<Vec<FileError>>,
    /// Appended to the error list after any replacement.
    pub append_errors: Vec<FileError>,
    /// `Some(None)` clears the last error.
    pub last_error: Option<Option<String>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(progress: JobProgress) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, progress: JobProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_errors(mut self, errors: Vec<FileError>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_appended_error(mut self, error: FileError) -> Self {
        self.append_errors.push(error);
        self
    }

    pub fn with_last_error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(Some(message.into()));
        self
    }

    pub fn clearing_last_error(mut self) -> Self {
        self.last_error = Some(None);
        self
    }
}
