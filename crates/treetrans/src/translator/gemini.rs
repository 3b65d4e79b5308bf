use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::credentials::{CredentialKind, CredentialStore};
use super::{http_client, run_cancellable, status_error, TranslateContext, TranslateError, Translator};

const PROVIDER: &str = "gemini";

/// Google Gemini `generateContent`.
pub struct GeminiTranslator {
    base_url: String,
    default_model: String,
    credentials: Arc<CredentialStore>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiTranslator {
    pub fn new(
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        credentials: Arc<CredentialStore>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: default_model.into(),
            credentials,
            client: http_client(timeout_secs),
        }
    }

    async fn request(&self, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        let api_key = self
            .credentials
            .resolve(CredentialKind::Gemini)
            .ok_or_else(|| TranslateError::NotConfigured("GEMINI_API_KEY is not configured".to_string()))?;

        let model = if ctx.model.trim().is_empty() {
            self.default_model.as_str()
        } else {
            ctx.model.as_str()
        };

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(format!(
                        "Translate the following content to {}. Preserve formatting:\n\n{}",
                        ctx.target_language, text
                    )),
                }],
            }],
        };

        // Header, not query string: URLs end up in logs.
        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|source| TranslateError::Request {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|_| TranslateError::InvalidPayload { provider: PROVIDER })?;

        payload
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or(TranslateError::EmptyResponse { provider: PROVIDER })
    }
}

#[async_trait]
impl Translator for GeminiTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_key(CredentialKind::Gemini)
    }

    fn credential_env_var(&self) -> Option<&'static str> {
        Some("GEMINI_API_KEY")
    }

    async fn translate(&self, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        run_cancellable(&ctx.cancel, self.request(text, ctx)).await
    }
}
