//! Configuration Loader
//!
//! Loads and merges client settings files from multiple locations.

use crate::error::{MistralError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable pointing at an explicit settings file
pub const CONFIG_PATH_ENV: &str = "MISTRAL_CONFIG_PATH";

/// Settings read from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL for the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// End-to-end request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Name of the environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Settings loader with support for multiple sources
pub struct ConfigLoader {
    settings: Settings,
}

impl ConfigLoader {
    /// Create a new loader and read every settings file that exists
    pub fn new() -> Result<Self> {
        let mut loader = Self {
            settings: Settings::default(),
        };

        for path in Self::get_config_paths() {
            if path.exists() {
                loader.load_from_file(&path)?;
            }
        }

        Ok(loader)
    }

    /// Create a loader from one specific file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self {
            settings: Settings::default(),
        };
        loader.load_from_file(path)?;
        Ok(loader)
    }

    /// Candidate settings files, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".mistral").join("config.json"));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mistral").join("config.json"));
        }

        paths.push(PathBuf::from("mistral.json"));

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load settings from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MistralError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let settings: Settings = serde_json::from_str(&content).map_err(|e| {
            MistralError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        tracing::debug!(path = %path.display(), "Loaded client settings");
        self.merge(settings);
        Ok(())
    }

    /// Merge another file's settings over the current ones
    fn merge(&mut self, other: Settings) {
        if other.base_url.is_some() {
            self.settings.base_url = other.base_url;
        }
        if other.timeout_secs.is_some() {
            self.settings.timeout_secs = other.timeout_secs;
        }
        if other.api_key_env.is_some() {
            self.settings.api_key_env = other.api_key_env;
        }
    }

    /// Get the loaded settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Take ownership of the settings
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "base_url": "https://proxy.example.com",
                "timeout_secs": 120
            }}"#
        )
        .unwrap();

        let loader = ConfigLoader::from_path(file.path()).unwrap();
        assert_eq!(
            loader.settings().base_url.as_deref(),
            Some("https://proxy.example.com")
        );
        assert_eq!(loader.settings().timeout_secs, Some(120));
        assert_eq!(loader.settings().api_key_env, None);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = ConfigLoader::from_path(file.path()).err().unwrap();
        assert!(matches!(err, MistralError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ConfigLoader::from_path("/definitely/not/here.json")
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let mut loader = ConfigLoader {
            settings: Settings {
                base_url: Some("https://first.example.com".to_string()),
                timeout_secs: Some(30),
                api_key_env: None,
            },
        };

        loader.merge(Settings {
            base_url: None,
            timeout_secs: Some(90),
            api_key_env: Some("OTHER_KEY".to_string()),
        });

        let settings = loader.into_settings();
        assert_eq!(settings.base_url.as_deref(), Some("https://first.example.com"));
        assert_eq!(settings.timeout_secs, Some(90));
        assert_eq!(settings.api_key_env.as_deref(), Some("OTHER_KEY"));
    }
}
