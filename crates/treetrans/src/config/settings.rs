use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TARGET_LANGUAGE: &str = "Traditional Chinese (zh-TW)";
pub const DEFAULT_ARCHIVE_NAME: &str = "translated.zip";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_LOCAL_MODEL: &str = "local-default";

const MIB: u64 = 1024 * 1024;

/// Runtime settings for the job service.
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Directory under which per-job workspaces are created.
    pub jobs_base_dir: PathBuf,
    /// Sandboxed hosts only allow writes below the system temp directory.
    pub restricted_environment: bool,
    /// Files larger than this are copied verbatim instead of translated.
    pub max_translate_file_bytes: u64,
    pub uploads: UploadLimits,
    pub clone_timeout_secs: u64,
    /// `None` runs every submitted job immediately.
    pub max_concurrent_jobs: Option<usize>,
    pub default_target_language: String,
    pub archive_name: String,
    pub providers: ProviderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs_base_dir: std::env::temp_dir().join("project-translate-jobs"),
            restricted_environment: false,
            max_translate_file_bytes: 2 * MIB,
            uploads: UploadLimits::default(),
            clone_timeout_secs: 120,
            max_concurrent_jobs: None,
            default_target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            providers: ProviderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct UploadLimits {
    pub max_file_count: usize,
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_count: 3000,
            max_file_bytes: 2 * MIB,
            max_total_bytes: 80 * MIB,
        }
    }
}

/// Provider endpoints and credentials. API keys are never read from the
/// settings file, only from the environment or at runtime.
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderSettings {
    #[serde(skip)]
    pub openai_api_key: Option<SecretString>,
    pub openai_model: String,
    pub openai_base_url: String,
    #[serde(skip)]
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub local_translator_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            local_translator_url: None,
            request_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Applies overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` in place of the process environment.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty("TREETRANS_JOBS_BASE_DIR").or_else(|| non_empty("JOBS_BASE_DIR")) {
            self.jobs_base_dir = PathBuf::from(dir);
        }

        if let Some(raw) = non_empty("TREETRANS_RESTRICTED") {
            self.restricted_environment = parse_bool("TREETRANS_RESTRICTED", &raw)?;
        } else if non_empty("VERCEL").is_some() {
            self.restricted_environment = true;
        }

        if let Some(raw) = non_empty("TREETRANS_MAX_CONCURRENT_JOBS") {
            let limit = raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "TREETRANS_MAX_CONCURRENT_JOBS".to_string(),
                    message: e.to_string(),
                })?;
            self.max_concurrent_jobs = Some(limit);
        }

        let providers = &mut self.providers;
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            providers.openai_api_key = Some(SecretString::from(key.trim().to_string()));
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            providers.openai_model = model;
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            providers.openai_base_url = url;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY") {
            providers.gemini_api_key = Some(SecretString::from(key.trim().to_string()));
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            providers.gemini_model = model;
        }
        if let Some(url) = non_empty("GEMINI_BASE_URL") {
            providers.gemini_base_url = url;
        }
        if let Some(url) = non_empty("LOCAL_TRANSLATOR_URL") {
            providers.local_translator_url = Some(url);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_jobs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "maxConcurrentJobs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let name = self.archive_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ConfigError::InvalidValue {
                key: "archiveName".to_string(),
                message: format!("'{}' is not a plain file name", self.archive_name),
            });
        }

        if self.uploads.max_file_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "uploads.maxFileCount".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.jobs_base_dir,
            std::env::temp_dir().join("project-translate-jobs")
        );
        assert!(!settings.restricted_environment);
        assert_eq!(settings.max_translate_file_bytes, 2 * 1024 * 1024);
        assert_eq!(settings.uploads.max_file_count, 3000);
        assert_eq!(settings.archive_name, "translated.zip");
        assert!(settings.max_concurrent_jobs.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_with(env(&[
                ("JOBS_BASE_DIR", "/srv/jobs"),
                ("VERCEL", "1"),
                ("OPENAI_API_KEY", " sk-test "),
                ("GEMINI_MODEL", "gemini-pro"),
                ("TREETRANS_MAX_CONCURRENT_JOBS", "4"),
            ]))
            .unwrap();

        assert_eq!(settings.jobs_base_dir, PathBuf::from("/srv/jobs"));
        assert!(settings.restricted_environment);
        assert_eq!(
            settings.providers.openai_api_key.as_ref().unwrap().expose_secret(),
            "sk-test"
        );
        assert_eq!(settings.providers.gemini_model, "gemini-pro");
        assert_eq!(settings.max_concurrent_jobs, Some(4));
    }

    #[test]
    fn test_prefixed_base_dir_wins() {
        let mut settings = Settings::default();
        settings
            .apply_env_with(env(&[
                ("JOBS_BASE_DIR", "/a"),
                ("TREETRANS_JOBS_BASE_DIR", "/b"),
            ]))
            .unwrap();
        assert_eq!(settings.jobs_base_dir, PathBuf::from("/b"));
    }

    #[test]
    fn test_explicit_restricted_flag_overrides_vercel() {
        let mut settings = Settings::default();
        settings
            .apply_env_with(env(&[("VERCEL", "1"), ("TREETRANS_RESTRICTED", "false")]))
            .unwrap();
        assert!(!settings.restricted_environment);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_env_with(env(&[("TREETRANS_RESTRICTED", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        let result = settings.apply_env_with(env(&[("TREETRANS_MAX_CONCURRENT_JOBS", "lots")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_archive_name_and_zero_limit() {
        let settings = Settings {
            archive_name: "../out.zip".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            max_concurrent_jobs: Some(0),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }
}
