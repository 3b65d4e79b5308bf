//! API keys for the hosted providers.
//!
//! Keys come from two places: the environment (captured once into
//! [`ProviderSettings`]) and keys supplied at runtime, e.g. typed into a UI.
//! A runtime key always wins over the environment.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};

use crate::config::ProviderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    OpenAi,
    Gemini,
}

#[derive(Default)]
struct Keys {
    openai: Option<SecretString>,
    gemini: Option<SecretString>,
}

impl Keys {
    fn slot(&mut self, kind: CredentialKind) -> &mut Option<SecretString> {
        match kind {
            CredentialKind::OpenAi => &mut self.openai,
            CredentialKind::Gemini => &mut self.gemini,
        }
    }

    fn get(&self, kind: CredentialKind) -> Option<&SecretString> {
        match kind {
            CredentialKind::OpenAi => self.openai.as_ref(),
            CredentialKind::Gemini => self.gemini.as_ref(),
        }
    }
}

pub struct CredentialStore {
    env: Keys,
    runtime: RwLock<Keys>,
}

impl CredentialStore {
    pub fn new(openai: Option<SecretString>, gemini: Option<SecretString>) -> Self {
        Self {
            env: Keys { openai, gemini },
            runtime: RwLock::new(Keys::default()),
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(
            settings.openai_api_key.as_ref().map(copy_secret),
            settings.gemini_api_key.as_ref().map(copy_secret),
        )
    }

    /// Sets or clears the runtime key for `kind`. Blank values clear it.
    pub fn set_runtime_key(&self, kind: CredentialKind, value: Option<&str>) {
        let normalized = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::from(v.to_string()));

        let mut keys = match self.runtime.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Credential lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *keys.slot(kind) = normalized;
    }

    /// The effective key: runtime first, then environment.
    pub fn resolve(&self, kind: CredentialKind) -> Option<SecretString> {
        let runtime = match self.runtime.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Credential lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        runtime
            .get(kind)
            .or_else(|| self.env.get(kind))
            .map(copy_secret)
    }

    pub fn has_key(&self, kind: CredentialKind) -> bool {
        self.resolve(kind).is_some()
    }

    /// Whether a runtime key (as opposed to an environment key) is set.
    pub fn has_runtime_key(&self, kind: CredentialKind) -> bool {
        self.runtime
            .read()
            .map(|keys| keys.get(kind).is_some())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("openai", &self.has_key(CredentialKind::OpenAi))
            .field("gemini", &self.has_key(CredentialKind::Gemini))
            .finish()
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}
