//! Job submission, background execution and cancellation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::archive::archive_directory;
use crate::config::Settings;
use crate::error::JobError;
use crate::pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineProgress, PipelineResult, ProgressReporter,
};
use crate::sanitize;
use crate::translator::{CredentialStore, Translator, TranslatorRegistry};
use crate::workspace::{
    clone_repository, normalize_github_url, stage_uploads, UploadedFile, WorkspaceManager,
};

use super::record::{JobProgress, JobRecord, JobStatus, JobUpdate, NewJob, SourceKind};
use super::store::JobStore;

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[".md", ".txt", ".rst", ".adoc"];

/// `last_error` recorded on cancelled jobs.
pub const CANCELLED_MESSAGE: &str = "Translation was cancelled by user";

/// Where the files of a new job come from.
#[derive(Debug, Clone)]
pub enum JobSource {
    Upload(Vec<UploadedFile>),
    Repository { url: String },
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source: JobSource,
    pub translator: String,
    /// Blank or absent selects the provider default.
    pub model: Option<String>,
    /// Blank or absent selects the configured default language.
    pub target_language: Option<String>,
    pub output_folder: String,
    /// Raw entries; see [`parse_allowed_extensions`].
    pub allowed_extensions: Vec<String>,
}

/// How a job's background execution ended.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(PipelineResult),
    Failed(String),
    Cancelled,
}

/// Normalizes an extension allow-list: trimmed, lowercased, dot-prefixed,
/// deduplicated in order. An empty result falls back to
/// [`DEFAULT_ALLOWED_EXTENSIONS`].
pub fn parse_allowed_extensions<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>, JobError> {
    let mut normalized: Vec<String> = Vec::new();
    for entry in raw {
        let trimmed = entry.as_ref().trim().to_lowercase();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains(['/', '\\']) || trimmed.chars().any(char::is_whitespace) {
            return Err(JobError::InvalidInput(format!(
                "Invalid file extension: {}",
                entry.as_ref().trim()
            )));
        }
        let extension = if trimmed.starts_with('.') {
            trimmed
        } else {
            format!(".{}", trimmed)
        };
        if extension == "." {
            continue;
        }
        if !normalized.contains(&extension) {
            normalized.push(extension);
        }
    }

    if normalized.is_empty() {
        return Ok(DEFAULT_ALLOWED_EXTENSIONS.iter().map(|e| e.to_string()).collect());
    }
    Ok(normalized)
}

/// Comma-separated form of [`parse_allowed_extensions`].
pub fn parse_allowed_extensions_csv(raw: &str) -> Result<Vec<String>, JobError> {
    let entries: Vec<&str> = raw.split(',').collect();
    parse_allowed_extensions(&entries)
}

/// Owns the job store, the translator registry and the per-job cancellation
/// tokens. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JobService {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    store: Arc<JobStore>,
    workspace: WorkspaceManager,
    translators: TranslatorRegistry,
    credentials: Arc<CredentialStore>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
    limiter: Option<Arc<Semaphore>>,
}

impl JobService {
    /// Builds a service with the built-in providers.
    pub fn new(settings: Settings) -> Self {
        let credentials = Arc::new(CredentialStore::from_settings(&settings.providers));
        let translators = TranslatorRegistry::with_builtin(&settings.providers, Arc::clone(&credentials));
        Self::with_translators(settings, translators, credentials)
    }

    pub fn with_translators(
        settings: Settings,
        translators: TranslatorRegistry,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let limiter = settings
            .max_concurrent_jobs
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            inner: Arc::new(Inner {
                workspace: WorkspaceManager::from_settings(&settings),
                settings,
                store: Arc::new(JobStore::new()),
                translators,
                credentials,
                cancellations: Mutex::new(HashMap::new()),
                limiter,
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.inner.store
    }

    pub fn translators(&self) -> &TranslatorRegistry {
        &self.inner.translators
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.credentials
    }

    /// Validates and stages a new job, then starts it in the background.
    ///
    /// Returns once the input tree is on disk, so the job can be polled right
    /// away. Invalid input is rejected here and never produces a record.
    pub async fn submit(&self, request: JobRequest) -> Result<JobRecord, JobError> {
        let inner = &self.inner;
        let translator = inner.translators.assert_configured(&request.translator)?;
        let model = inner
            .translators
            .resolve_model(&request.translator, request.model.as_deref());
        let allowed_extensions = parse_allowed_extensions(&request.allowed_extensions)?;
        let target_language = request
            .target_language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(&inner.settings.default_target_language)
            .to_string();

        let repo_url = match &request.source {
            JobSource::Repository { url } => Some(normalize_github_url(url)?),
            JobSource::Upload(_) => None,
        };

        let job_id = uuid::Uuid::new_v4().to_string();
        let paths = inner.workspace.prepare(&job_id, &request.output_folder).await?;

        let staged = match (request.source, &repo_url) {
            (JobSource::Upload(files), _) => stage_uploads(&paths.input, files, &inner.settings.uploads)
                .await
                .map(|_| (SourceKind::LocalUpload, paths.input.clone())),
            (JobSource::Repository { .. }, Some(url)) => {
                clone_repository(url, &paths.input, inner.settings.clone_timeout_secs)
                    .await
                    .map(|root| (SourceKind::RemoteRepository, root))
            }
            (JobSource::Repository { url }, None) => {
                return Err(JobError::InvalidInput(format!(
                    "Invalid repository URL: {}",
                    sanitize::redact_repo_url(&url)
                )))
            }
        };

        let (source_kind, input_root) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                inner.workspace.discard(&paths).await;
                return Err(e.into());
            }
        };

        let record = inner.store.create(NewJob {
            id: Some(job_id),
            source_kind,
            repo_url,
            translator: request.translator,
            model,
            target_language,
            allowed_extensions,
            output_folder: paths.output.clone(),
            workspace_root: paths.root,
            input_root,
            output_root: paths.output,
            archive_path: paths.archive,
        });

        info!(job_id = %record.id, source = %record.source_kind, translator = %record.translator, "Job accepted");

        let token = CancellationToken::new();
        self.tokens().insert(record.id.clone(), token.clone());
        tokio::spawn(self.clone().execute(record.id.clone(), translator, token));

        Ok(record)
    }

    /// Requests cancellation. Terminal jobs are returned unchanged; anything
    /// else is marked `cancelled` immediately and its execution signalled.
    pub fn cancel(&self, id: &str) -> Result<JobRecord, JobError> {
        let job = self.get(id)?;
        if job.is_finished() {
            return Ok(job);
        }

        if let Some(token) = self.tokens().get(id) {
            token.cancel();
        }

        info!(job_id = %id, "Cancellation requested");
        self.inner.store.update(
            id,
            JobUpdate::status(JobStatus::Cancelled).with_last_error(CANCELLED_MESSAGE),
        )
    }

    pub fn get(&self, id: &str) -> Result<JobRecord, JobError> {
        self.inner
            .store
            .get(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<JobRecord> {
        self.inner.store.list()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobRecord> {
        self.inner.store.subscribe()
    }

    /// Number of jobs whose background execution has not finished.
    pub fn active_jobs(&self) -> usize {
        self.tokens().len()
    }

    /// Resolves once the job reaches a terminal status.
    pub async fn wait_for_terminal(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut events = self.inner.store.subscribe();
        loop {
            let job = self.get(id)?;
            if job.is_finished() {
                return Ok(job);
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.get(id),
            }
        }
    }

    async fn execute(self, id: String, translator: Arc<dyn Translator>, token: CancellationToken) {
        let span = info_span!("job", job_id = %id);

        // Runs as its own task so a panicking provider still ends the job.
        let worker = self.clone();
        let worker_id = id.clone();
        let worker_token = token.clone();
        let handle = tokio::spawn(
            async move { worker.run(&worker_id, translator, &worker_token).await }
                .instrument(span.clone()),
        );

        async {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::error!(panic = %message, "Job execution panicked");
                    JobOutcome::Failed(format!("Job execution panicked: {}", message))
                }
                Err(e) => JobOutcome::Failed(format!("Job execution aborted: {}", e)),
            };
            self.finish(&id, outcome);
            self.tokens().remove(&id);
        }
        .instrument(span)
        .await
    }

    async fn run(&self, id: &str, translator: Arc<dyn Translator>, token: &CancellationToken) -> JobOutcome {
        let _permit = match &self.inner.limiter {
            Some(limiter) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return JobOutcome::Cancelled,
                    permit = Arc::clone(limiter).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => return JobOutcome::Failed("Job limiter was closed".to_string()),
                    },
                }
            }
            None => None,
        };

        let Some(job) = self.inner.store.get(id) else {
            return JobOutcome::Failed("Job record is missing".to_string());
        };
        if token.is_cancelled() || job.status == JobStatus::Cancelled {
            return JobOutcome::Cancelled;
        }

        if let Err(e) = self
            .inner
            .store
            .update(id, JobUpdate::status(JobStatus::Running).clearing_last_error())
        {
            return JobOutcome::Failed(e.to_string());
        }
        info!("Job running");

        let pipeline = Pipeline::new(
            PipelineConfig {
                job_id: job.id.clone(),
                input_root: job.input_root.clone(),
                output_root: job.output_root.clone(),
                allowed_extensions: job.allowed_extensions.clone(),
                max_file_bytes: self.inner.settings.max_translate_file_bytes,
                source_kind: job.source_kind,
                target_language: job.target_language.clone(),
                model: job.model.clone(),
            },
            translator,
        );
        let reporter = StoreProgress {
            store: Arc::clone(&self.inner.store),
            job_id: id.to_string(),
        };

        match pipeline.run(&reporter, token).await {
            Ok(result) => {
                if token.is_cancelled() {
                    return JobOutcome::Cancelled;
                }
                match archive_directory(job.output_root.clone(), job.archive_path.clone()).await {
                    Ok(_) => JobOutcome::Completed(result),
                    Err(e) => JobOutcome::Failed(format!("Failed to create archive: {}", e)),
                }
            }
            Err(PipelineError::Cancelled) => JobOutcome::Cancelled,
            Err(e) => JobOutcome::Failed(e.to_string()),
        }
    }

    fn finish(&self, id: &str, outcome: JobOutcome) {
        let update = match outcome {
            JobOutcome::Completed(result) => {
                info!(
                    processed = result.processed_files,
                    failed = result.failed_files,
                    "Job completed"
                );
                JobUpdate::status(JobStatus::Completed)
                    .with_progress(JobProgress {
                        total_files: result.total_files,
                        processed_files: result.processed_files,
                        failed_files: result.failed_files,
                        current_file: None,
                    })
                    .with_errors(result.errors)
            }
            JobOutcome::Failed(message) => {
                warn!(error = %message, "Job failed");
                JobUpdate::status(JobStatus::Failed).with_last_error(message)
            }
            JobOutcome::Cancelled => {
                info!("Job cancelled");
                JobUpdate::status(JobStatus::Cancelled).with_last_error(CANCELLED_MESSAGE)
            }
        };

        if let Err(e) = self.inner.store.update(id, update) {
            warn!(error = %e, "Could not record job outcome");
        }
    }

    fn tokens(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        match self.inner.cancellations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Cancellation map lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl std::fmt::Debug for JobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobService")
            .field("jobs", &self.inner.store.len())
            .field("active", &self.active_jobs())
            .field("translators", &self.inner.translators)
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Mirrors pipeline progress into the job record.
struct StoreProgress {
    store: Arc<JobStore>,
    job_id: String,
}

impl ProgressReporter for StoreProgress {
    fn report(&self, progress: &PipelineProgress) {
        let mut update = JobUpdate::progress(JobProgress::from(progress));
        if let Some(error) = &progress.file_error {
            update = update.with_appended_error(error.clone());
        }
        if let Err(e) = self.store.update(&self.job_id, update) {
            warn!(job_id = %self.job_id, error = %e, "Dropping progress update");
        }
    }
}
