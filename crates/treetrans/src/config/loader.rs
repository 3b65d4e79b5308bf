use std::path::Path;

use crate::config::settings::Settings;
use crate::error::ConfigError;

/// Loads settings from an optional YAML file, then applies environment
/// overrides and validates the result.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            parse_settings(&content)?
        }
        None => Settings::default(),
    };

    settings.apply_env()?;
    settings.validate()?;

    Ok(settings)
}

/// Parses and validates settings YAML without consulting the environment.
pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings = parse_settings(content)?;
    settings.validate()?;
    Ok(settings)
}

fn parse_settings(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    Ok(serde_yaml::from_str(content)?)
}
