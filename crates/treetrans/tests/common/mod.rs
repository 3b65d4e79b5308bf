//! Isolated job service for integration tests.
//!
//! Each `TestHarness` owns a temporary jobs base directory and registers three
//! extra providers next to the built-in ones:
//! - `gated`: signals when it starts translating, then blocks until cancelled
//! - `failing`: rejects every file
//! - `panicking`: panics on the first file

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use treetrans::config::ProviderSettings;
use treetrans::translator::{run_cancellable, CredentialStore};
use treetrans::{
    JobRecord, JobRequest, JobService, JobSource, Settings, TranslateContext, TranslateError,
    Translator, TranslatorRegistry, UploadedFile,
};

pub fn text_files(files: &[(&str, &str)]) -> Vec<UploadedFile> {
    files
        .iter()
        .map(|(path, contents)| UploadedFile::new(*path, contents.as_bytes()))
        .collect()
}

pub const WAIT: Duration = Duration::from_secs(10);

pub struct GatedTranslator {
    pub started: Arc<Notify>,
}

#[async_trait]
impl Translator for GatedTranslator {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn default_model(&self) -> String {
        "gated-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(&self, _text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        self.started.notify_one();
        run_cancellable(&ctx.cancel, std::future::pending::<Result<String, TranslateError>>()).await
    }
}

pub struct FailingTranslator;

#[async_trait]
impl Translator for FailingTranslator {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn default_model(&self) -> String {
        "failing-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(&self, _text: &str, _ctx: &TranslateContext) -> Result<String, TranslateError> {
        Err(TranslateError::Failed("provider unavailable".to_string()))
    }
}

pub struct PanickingTranslator;

#[async_trait]
impl Translator for PanickingTranslator {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn default_model(&self) -> String {
        "panicking-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(&self, _text: &str, _ctx: &TranslateContext) -> Result<String, TranslateError> {
        panic!("provider bug")
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub service: JobService,
    /// Notified each time the `gated` provider starts on a file.
    pub gate: Arc<Notify>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_job_limit(None)
    }

    pub fn with_job_limit(limit: Option<usize>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let settings = Settings {
            jobs_base_dir: temp_dir.path().join("jobs"),
            max_concurrent_jobs: limit,
            ..Settings::default()
        };

        let providers = ProviderSettings::default();
        let credentials = Arc::new(CredentialStore::from_settings(&providers));
        let mut registry = TranslatorRegistry::with_builtin(&providers, Arc::clone(&credentials));
        let gate = Arc::new(Notify::new());
        registry.register(Arc::new(GatedTranslator {
            started: Arc::clone(&gate),
        }));
        registry.register(Arc::new(FailingTranslator));
        registry.register(Arc::new(PanickingTranslator));

        Self {
            service: JobService::with_translators(settings, registry, credentials),
            temp_dir,
            gate,
        }
    }

    /// Absolute output folder inside the harness directory.
    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("out").join(name)
    }

    pub fn upload_request(&self, provider: &str, files: Vec<UploadedFile>) -> JobRequest {
        JobRequest {
            source: JobSource::Upload(files),
            translator: provider.to_string(),
            model: None,
            target_language: Some("German".to_string()),
            output_folder: self.output_dir("result").display().to_string(),
            allowed_extensions: vec![],
        }
    }

    pub async fn wait_for_terminal(&self, id: &str) -> JobRecord {
        tokio::time::timeout(WAIT, self.service.wait_for_terminal(id))
            .await
            .expect("job did not finish in time")
            .expect("job disappeared")
    }

    /// Waits until no job is executing in the background.
    pub async fn wait_until_idle(&self) {
        tokio::time::timeout(WAIT, async {
            while self.service.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background jobs did not settle");
    }
}
