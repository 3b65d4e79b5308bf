use serde::{Deserialize, Serialize};

/// A file that could not be translated. Its source bytes were copied to the
/// output tree instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub relative_path: String,
    pub message: String,
}

/// Snapshot emitted after each processed file.
#[derive(Debug, Clone)]
pub struct PipelineProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub current_file: String,
    /// Set when `current_file` failed.
    pub file_error: Option<FileError>,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &PipelineProgress);
}

/// No-op reporter for tests and one-shot runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _progress: &PipelineProgress) {}
}
