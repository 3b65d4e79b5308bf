use std::path::PathBuf;
use thiserror::Error;

use crate::sanitize::file_name_only;

#[derive(Error, Debug)]
pub enum TreetransError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid relative path: {0}")]
    InvalidPath(String),

    #[error("Absolute paths are not allowed: {0}")]
    AbsolutePath(String),

    #[error("Path traversal is not allowed: {0}")]
    Traversal(String),

    #[error("Resolved path escapes root directory: {0}")]
    PathEscape(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read directory tree '{}': {source}", file_name_only(.path))]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create directory '{}': {source}", file_name_only(.path))]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{}': {source}", file_name_only(.path))]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidOutputLocation(String),

    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    InvalidRepository(String),

    #[error("Repository clone failed: {0}")]
    CloneFailed(String),

    #[error("Repository clone timed out after {0}s")]
    CloneTimeout(u64),

    #[error(transparent)]
    Path(#[from] PathError),
}

impl WorkspaceError {
    /// Errors caused by what the submitter sent rather than by the host.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            WorkspaceError::InvalidOutputLocation(_)
                | WorkspaceError::InvalidUpload(_)
                | WorkspaceError::InvalidRepository(_)
                | WorkspaceError::CloneFailed(_)
                | WorkspaceError::CloneTimeout(_)
                | WorkspaceError::Path(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to create archive '{}': {source}", file_name_only(.path))]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to add '{entry}' to archive: {source}")]
    AddEntry {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to read '{}' while archiving: {source}", file_name_only(.path))]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to finalize archive '{}': {message}", file_name_only(.path))]
    Finalize { path: PathBuf, message: String },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Archive task aborted: {0}")]
    TaskAborted(String),
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job is not completed yet")]
    NotCompleted,

    #[error("All files failed to translate. Please verify translator API key and try again.")]
    AllFilesFailed,

    #[error("Job artifact missing: {}", file_name_only(.0))]
    MissingArtifact(PathBuf),

    #[error(transparent)]
    Workspace(WorkspaceError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    /// True when the error should be reported back to the submitter as a bad request.
    pub fn is_user_input(&self) -> bool {
        match self {
            JobError::InvalidInput(_) | JobError::NotCompleted | JobError::AllFilesFailed => true,
            JobError::Workspace(e) => e.is_user_input(),
            _ => false,
        }
    }
}

impl From<WorkspaceError> for JobError {
    fn from(err: WorkspaceError) -> Self {
        JobError::Workspace(err)
    }
}

impl From<PathError> for JobError {
    fn from(err: PathError) -> Self {
        JobError::InvalidInput(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Logging already initialized")]
    AlreadyInitialized,

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

pub type Result<T> = std::result::Result<T, TreetransError>;
