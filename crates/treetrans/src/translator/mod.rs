//! Translation providers.
//!
//! A provider turns one file's text into its translation. The pipeline only
//! depends on the [`Translator`] trait; the built-in providers talk to remote
//! HTTP APIs through `reqwest`.

pub mod credentials;
pub mod gemini;
pub mod local;
pub mod openai;
pub mod registry;

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::jobs::SourceKind;

pub use credentials::{CredentialKind, CredentialStore};
pub use gemini::GeminiTranslator;
pub use local::LocalTranslator;
pub use openai::OpenAiTranslator;
pub use registry::{ProviderStatus, TranslatorRegistry};

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Translation was cancelled")]
    Cancelled,

    #[error("{0}")]
    NotConfigured(String),

    #[error("{provider} request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} translation failed ({status}): {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} translation returned empty content")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} returned an invalid payload")]
    InvalidPayload { provider: &'static str },

    #[error("{0}")]
    Failed(String),
}

/// Per-file information passed to a provider.
#[derive(Debug, Clone)]
pub struct TranslateContext {
    pub relative_path: String,
    pub source_kind: SourceKind,
    pub target_language: String,
    pub model: String,
    pub cancel: CancellationToken,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Provider name as used in job requests.
    fn name(&self) -> &'static str;

    /// Model used when the request does not name one.
    fn default_model(&self) -> String;

    /// Whether the provider has what it needs (credentials) to run.
    fn is_configured(&self) -> bool;

    /// Environment variable that supplies this provider's credentials, if any.
    fn credential_env_var(&self) -> Option<&'static str> {
        None
    }

    async fn translate(&self, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError>;
}

/// Runs `fut` unless `cancel` fires first.
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TranslateError>
where
    F: Future<Output = Result<T, TranslateError>>,
{
    if cancel.is_cancelled() {
        return Err(TranslateError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TranslateError::Cancelled),
        result = fut => result,
    }
}

/// Reads a failed response body for the error message.
pub(crate) async fn status_error(provider: &'static str, response: reqwest::Response) -> TranslateError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TranslateError::Status {
        provider,
        status,
        body,
    }
}

/// Builds the shared HTTP client used by the built-in providers.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}
