use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::settings::DEFAULT_OPENAI_MODEL;
use crate::config::ProviderSettings;
use crate::error::JobError;

use super::credentials::CredentialStore;
use super::{GeminiTranslator, LocalTranslator, OpenAiTranslator, Translator};

/// Configuration state of one provider, safe to show to users.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub name: String,
    pub configured: bool,
    pub default_model: String,
}

/// Provider name to implementation.
#[derive(Clone, Default)]
pub struct TranslatorRegistry {
    providers: BTreeMap<String, Arc<dyn Translator>>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in `openai`, `gemini` and `local` providers.
    pub fn with_builtin(settings: &ProviderSettings, credentials: Arc<CredentialStore>) -> Self {
        let timeout = settings.request_timeout_secs;
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiTranslator::new(
            settings.openai_base_url.clone(),
            settings.openai_model.clone(),
            Arc::clone(&credentials),
            timeout,
        )));
        registry.register(Arc::new(GeminiTranslator::new(
            settings.gemini_base_url.clone(),
            settings.gemini_model.clone(),
            credentials,
            timeout,
        )));
        registry.register(Arc::new(LocalTranslator::new(
            settings.local_translator_url.clone(),
            timeout,
        )));
        registry
    }

    /// Adds a provider, replacing any provider with the same name.
    pub fn register(&mut self, translator: Arc<dyn Translator>) {
        self.providers.insert(translator.name().to_string(), translator);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Translator>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// The requested model when non-blank, otherwise the provider default.
    /// Unknown providers fall back to the OpenAI default.
    pub fn resolve_model(&self, name: &str, requested: Option<&str>) -> String {
        if let Some(model) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return model.to_string();
        }
        self.providers
            .get(name)
            .map(|p| p.default_model())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string())
    }

    pub fn status(&self) -> Vec<ProviderStatus> {
        self.providers
            .values()
            .map(|p| ProviderStatus {
                name: p.name().to_string(),
                configured: p.is_configured(),
                default_model: p.default_model(),
            })
            .collect()
    }

    /// Looks up a provider that is ready to run.
    pub fn assert_configured(&self, name: &str) -> Result<Arc<dyn Translator>, JobError> {
        let provider = self
            .get(name)
            .ok_or_else(|| JobError::InvalidInput(format!("Unsupported translator provider: {}", name)))?;

        if !provider.is_configured() {
            let message = match provider.credential_env_var() {
                Some(var) => format!(
                    "Translator '{}' is not configured: provide an API key at runtime or set {}",
                    name, var
                ),
                None => format!("Translator '{}' is not configured", name),
            };
            return Err(JobError::InvalidInput(message));
        }

        Ok(provider)
    }
}

impl std::fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslatorRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::credentials::CredentialKind;
    use secrecy::SecretString;

    fn registry(openai_key: Option<&str>) -> TranslatorRegistry {
        let settings = ProviderSettings::default();
        let credentials = CredentialStore::new(openai_key.map(|k| SecretString::from(k.to_string())), None);
        TranslatorRegistry::with_builtin(&settings, Arc::new(credentials))
    }

    #[test]
    fn test_builtin_providers() {
        assert_eq!(registry(None).names(), vec!["gemini", "local", "openai"]);
    }

    #[test]
    fn test_resolve_model() {
        let registry = registry(None);
        assert_eq!(registry.resolve_model("openai", Some("  gpt-4o ")), "gpt-4o");
        assert_eq!(registry.resolve_model("openai", Some("   ")), "gpt-4.1-mini");
        assert_eq!(registry.resolve_model("gemini", None), "gemini-2.0-flash");
        assert_eq!(registry.resolve_model("local", None), "local-default");
        assert_eq!(registry.resolve_model("unknown", None), "gpt-4.1-mini");
    }

    #[test]
    fn test_status_reports_configuration() {
        let status = registry(Some("sk")).status();
        let by_name = |n: &str| status.iter().find(|s| s.name == n).unwrap().configured;
        assert!(by_name("openai"));
        assert!(!by_name("gemini"));
        assert!(by_name("local"));
    }

    #[test]
    fn test_assert_configured() {
        let registry = registry(None);
        assert!(registry.assert_configured("local").is_ok());

        let err = registry.assert_configured("openai").err().unwrap();
        assert!(err.is_user_input());
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = registry.assert_configured("deepl").err().unwrap();
        assert!(err.to_string().contains("Unsupported translator provider"));
    }

    #[test]
    fn test_runtime_key_makes_provider_usable() {
        let settings = ProviderSettings::default();
        let credentials = Arc::new(CredentialStore::new(None, None));
        let registry = TranslatorRegistry::with_builtin(&settings, Arc::clone(&credentials));
        assert!(registry.assert_configured("gemini").is_err());

        credentials.set_runtime_key(CredentialKind::Gemini, Some("g-key"));
        assert!(registry.assert_configured("gemini").is_ok());
    }
}
