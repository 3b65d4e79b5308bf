use std::path::PathBuf;

use crate::jobs::SourceKind;

/// Everything one pipeline run needs besides the translator itself.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub job_id: String,
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    /// Normalized: leading dot, lowercase, deduplicated.
    pub allowed_extensions: Vec<String>,
    /// Eligible files above this size are copied verbatim.
    pub max_file_bytes: u64,
    pub source_kind: SourceKind,
    pub target_language: String,
    pub model: String,
}
