use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::settings::DEFAULT_LOCAL_MODEL;

use super::{http_client, run_cancellable, status_error, TranslateContext, TranslateError, Translator};

const PROVIDER: &str = "local";

/// Self-hosted translator. Without an endpoint it tags the text with the
/// target language, which is enough to exercise the whole job flow offline.
pub struct LocalTranslator {
    endpoint: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalRequest<'a> {
    text: &'a str,
    target_language: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalResponse {
    translated_text: Option<String>,
}

impl LocalTranslator {
    pub fn new(endpoint: Option<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.filter(|e| !e.trim().is_empty()),
            client: http_client(timeout_secs),
        }
    }

    async fn request(&self, endpoint: &str, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        let response = self
            .client
            .post(endpoint)
            .json(&LocalRequest {
                text,
                target_language: &ctx.target_language,
            })
            .send()
            .await
            .map_err(|source| TranslateError::Request {
                provider: PROVIDER,
                source,
            })?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }

        let payload: LocalResponse = response
            .json()
            .await
            .map_err(|_| TranslateError::InvalidPayload { provider: PROVIDER })?;

        payload
            .translated_text
            .ok_or(TranslateError::InvalidPayload { provider: PROVIDER })
    }
}

#[async_trait]
impl Translator for LocalTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> String {
        DEFAULT_LOCAL_MODEL.to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn translate(&self, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        match &self.endpoint {
            None => {
                if ctx.cancel.is_cancelled() {
                    return Err(TranslateError::Cancelled);
                }
                Ok(format!("[{}] {}", ctx.target_language, text))
            }
            Some(endpoint) => run_cancellable(&ctx.cancel, self.request(endpoint, text, ctx)).await,
        }
    }
}
