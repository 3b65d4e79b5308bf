use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::path_safety::resolve_safe_path;
use crate::scan::{is_eligible_for_transform, list_files, looks_like_text};
use crate::translator::{run_cancellable, TranslateContext, TranslateError, Translator};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::{FileError, PipelineProgress, ProgressReporter};

/// Totals of a run that was not cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub errors: Vec<FileError>,
}

enum FileFailure {
    Cancelled,
    Failed(String),
}

impl From<TranslateError> for FileFailure {
    fn from(err: TranslateError) -> Self {
        match err {
            TranslateError::Cancelled => FileFailure::Cancelled,
            other => FileFailure::Failed(other.to_string()),
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    translator: Arc<dyn Translator>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, translator: Arc<dyn Translator>) -> Self {
        Self { config, translator }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Translates the input tree into the output tree.
    ///
    /// Files are processed one at a time in scan order. Cancellation is
    /// checked before and after every file and also interrupts an in-flight
    /// translation call.
    pub async fn run(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let span = info_span!("pipeline",
            job_id = %self.config.job_id,
            translator = self.translator.name(),
            model = %self.config.model,
        );
        self.run_inner(progress, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        let output_root = &self.config.output_root;
        tokio::fs::create_dir_all(output_root)
            .await
            .map_err(|source| PipelineError::OutputRoot {
                path: output_root.clone(),
                source,
            })?;

        let input_root = self.config.input_root.clone();
        let files = tokio::task::spawn_blocking(move || list_files(&input_root, &[]))
            .await
            .map_err(|e| PipelineError::TaskAborted(e.to_string()))??;

        let mut result = PipelineResult {
            total_files: files.len(),
            ..PipelineResult::default()
        };
        info!(total_files = result.total_files, "Input tree scanned");

        for relative in &files {
            if cancel.is_cancelled() {
                info!(processed = result.processed_files, "Run cancelled");
                return Err(PipelineError::Cancelled);
            }

            let file_error = match self.process_file(relative, cancel).await {
                Ok(()) => None,
                Err(FileFailure::Cancelled) => {
                    info!(processed = result.processed_files, "Run cancelled mid-file");
                    return Err(PipelineError::Cancelled);
                }
                Err(FileFailure::Failed(message)) => {
                    warn!(file = %relative, error = %message, "Translation failed, copying source");
                    self.copy_through(relative).await;
                    let error = FileError {
                        relative_path: relative.clone(),
                        message,
                    };
                    result.failed_files += 1;
                    result.errors.push(error.clone());
                    Some(error)
                }
            };

            result.processed_files += 1;

            if cancel.is_cancelled() {
                info!(processed = result.processed_files, "Run cancelled");
                return Err(PipelineError::Cancelled);
            }

            progress.report(&PipelineProgress {
                total_files: result.total_files,
                processed_files: result.processed_files,
                failed_files: result.failed_files,
                current_file: relative.clone(),
                file_error,
            });
        }

        info!(
            processed = result.processed_files,
            failed = result.failed_files,
            "Run finished"
        );
        Ok(result)
    }

    async fn process_file(&self, relative: &str, cancel: &CancellationToken) -> Result<(), FileFailure> {
        let (source, destination) = self.resolve(relative)?;
        ensure_parent(&destination).await?;

        let bytes = tokio::fs::read(&source)
            .await
            .map_err(|e| FileFailure::Failed(format!("Failed to read source file: {}", e)))?;

        let eligible = is_eligible_for_transform(
            relative,
            &self.config.allowed_extensions,
            self.config.max_file_bytes,
            bytes.len() as u64,
        ) && looks_like_text(&bytes);

        let output = if eligible {
            // Invalid sequences become U+FFFD rather than skipping the file.
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    debug!(file = %relative, "Decoding non-UTF-8 text lossily");
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };
            let ctx = TranslateContext {
                relative_path: relative.to_string(),
                source_kind: self.config.source_kind,
                target_language: self.config.target_language.clone(),
                model: self.config.model.clone(),
                cancel: cancel.clone(),
            };
            debug!(file = %relative, "Translating");
            run_cancellable(cancel, self.translator.translate(&text, &ctx))
                .await?
                .into_bytes()
        } else {
            debug!(file = %relative, "Copying verbatim");
            bytes
        };

        tokio::fs::write(&destination, output)
            .await
            .map_err(|e| FileFailure::Failed(format!("Failed to write output file: {}", e)))
    }

    /// Copies the source bytes of a failed file so the output tree stays
    /// complete. Problems here are logged and otherwise ignored.
    async fn copy_through(&self, relative: &str) {
        let Ok((source, destination)) = self.resolve(relative) else {
            return;
        };
        if ensure_parent(&destination).await.is_err() {
            warn!(file = %relative, "Could not create output directory for fallback copy");
            return;
        }
        if let Err(e) = tokio::fs::copy(&source, &destination).await {
            warn!(file = %relative, error = %e, "Fallback copy failed");
        }
    }

    fn resolve(&self, relative: &str) -> Result<(PathBuf, PathBuf), FileFailure> {
        let source = resolve_safe_path(&self.config.input_root, relative)
            .map_err(|e| FileFailure::Failed(e.to_string()))?;
        let destination = resolve_safe_path(&self.config.output_root, relative)
            .map_err(|e| FileFailure::Failed(e.to_string()))?;
        Ok((source, destination))
    }
}

async fn ensure_parent(path: &Path) -> Result<(), FileFailure> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FileFailure::Failed(format!("Failed to create output directory: {}", e)))?;
    }
    Ok(())
}
