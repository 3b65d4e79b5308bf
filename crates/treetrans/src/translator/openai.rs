use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::credentials::{CredentialKind, CredentialStore};
use super::{http_client, run_cancellable, status_error, TranslateContext, TranslateError, Translator};

const PROVIDER: &str = "openai";

/// OpenAI chat completions.
pub struct OpenAiTranslator {
    base_url: String,
    default_model: String,
    credentials: Arc<CredentialStore>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl OpenAiTranslator {
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
            .resolve(CredentialKind::OpenAi)
            .ok_or_else(|| TranslateError::NotConfigured("OPENAI_API_KEY is not configured".to_string()))?;

        let model = if ctx.model.trim().is_empty() {
            self.default_model.as_str()
        } else {
            ctx.model.as_str()
        };

        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You are a professional translator. Translate content to {}. \
                         Keep original structure, formatting, and code blocks untouched whenever possible.",
                        ctx.target_language
                    )
                    .into(),
                },
                ChatMessage {
                    role: "user",
                    content: text.into(),
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
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

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|_| TranslateError::InvalidPayload { provider: PROVIDER })?;

        payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
            .ok_or(TranslateError::EmptyResponse { provider: PROVIDER })
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        self.credentials.has_key(CredentialKind::OpenAi)
    }

    fn credential_env_var(&self) -> Option<&'static str> {
        Some("OPENAI_API_KEY")
    }

    async fn translate(&self, text: &str, ctx: &TranslateContext) -> Result<String, TranslateError> {
        run_cancellable(&ctx.cancel, self.request(text, ctx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::SourceKind;
    use secrecy::SecretString;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(model: &str) -> TranslateContext {
        TranslateContext {
            relative_path: "readme.md".to_string(),
            source_kind: SourceKind::RemoteRepository,
            target_language: "Japanese".to_string(),
            model: model.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    fn translator(base_url: &str, key: Option<&str>) -> OpenAiTranslator {
        let credentials = CredentialStore::new(key.map(|k| SecretString::from(k.to_string())), None);
        OpenAiTranslator::new(base_url, "gpt-4.1-mini", Arc::new(credentials), 5)
    }

    #[tokio::test]
    async fn test_translates_via_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "こんにちは" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let out = translator(&server.uri(), Some("sk-test"))
            .translate("Hello", &context("gpt-4o"))
            .await
            .unwrap();
        assert_eq!(out, "こんにちは");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let translator = translator("http://127.0.0.1:9", None);
        assert!(!translator.is_configured());
        let err = translator.translate("Hello", &context("")).await.unwrap_err();
        assert!(matches!(err, TranslateError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = translator(&server.uri(), Some("sk-test"))
            .translate("Hello", &context(""))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslateError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_slow_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(std::time::Duration::from_secs(10))
                    .set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let translator = translator(&server.uri(), Some("sk-test"));
        let ctx = context("");
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let err = translator.translate("Hello", &ctx).await.unwrap_err();
        assert!(matches!(err, TranslateError::Cancelled));
    }
}
