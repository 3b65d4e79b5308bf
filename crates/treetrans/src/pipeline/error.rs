use std::path::PathBuf;

use thiserror::Error;

use crate::error::ScanError;
use crate::sanitize::file_name_only;

/// Failures that stop a whole pipeline run. Per-file problems never end up
/// here; they are collected into the run's error list instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Translation was cancelled")]
    Cancelled,

    #[error("Failed to create output directory '{}': {source}", file_name_only(.path))]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to scan input tree: {0}")]
    Scan(#[from] ScanError),

    #[error("Scan task aborted: {0}")]
    TaskAborted(String),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}
