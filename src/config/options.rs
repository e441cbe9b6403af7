//! Client Options
//!
//! Base URL, credential, timeouts and HTTP client selection.

use crate::config::loader::{ConfigLoader, Settings};
use crate::error::{MistralError, Result};
use std::fmt;
use std::time::Duration;

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Default end-to-end request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout for the built-in HTTP client
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "MISTRAL_BASE_URL";

/// Environment variable overriding the timeout, in seconds
pub const TIMEOUT_ENV: &str = "MISTRAL_TIMEOUT_SECS";

/// Configuration for a [`MistralClient`](crate::MistralClient)
#[derive(Clone)]
pub struct ClientConfig {
    /// API key sent as a bearer token
    pub(crate) api_key: String,

    /// Base URL, without a trailing slash
    pub(crate) base_url: String,

    /// End-to-end timeout applied to every request, including streamed bodies.
    /// `None` leaves timing to the HTTP client itself.
    pub(crate) timeout: Option<Duration>,

    /// Connect timeout for the built-in HTTP client
    pub(crate) connect_timeout: Duration,

    /// Caller-supplied HTTP client
    pub(crate) http_client: Option<reqwest::Client>,
}

impl ClientConfig {
    /// Create a configuration with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            http_client: None,
        }
    }

    /// Load settings files, `.env` and environment variables.
    ///
    /// Precedence, lowest first: built-in defaults, settings files found by
    /// [`ConfigLoader`], then `MISTRAL_BASE_URL` / `MISTRAL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let loader = ConfigLoader::new()?;
        Self::from_settings(loader.settings())
    }

    /// Build a configuration from loaded settings plus environment overrides
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let key_env = settings.api_key_env.as_deref().unwrap_or(API_KEY_ENV);
        let api_key = std::env::var(key_env).map_err(|_| {
            MistralError::Config(format!("No API key found. Set the {} env var", key_env))
        })?;

        Self::from_settings_with_key(settings, api_key)
    }

    /// Like [`from_settings`](ClientConfig::from_settings), but with an
    /// explicit key instead of the environment lookup
    pub fn from_settings_with_key(settings: &Settings, api_key: impl Into<String>) -> Result<Self> {
        let mut config = Self::new(api_key);

        if let Some(url) = &settings.base_url {
            config = config.with_base_url(url.clone());
        }
        if let Some(secs) = settings.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config = config.with_base_url(url);
        }
        if let Ok(value) = std::env::var(TIMEOUT_ENV) {
            let secs = value.trim().parse::<u64>().map_err(|e| {
                MistralError::Config(format!("Invalid {} value '{}': {}", TIMEOUT_ENV, value, e))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Use a different API endpoint (a proxy or a custom deployment)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the end-to-end timeout for every request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout of the built-in HTTP client
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Use a caller-configured HTTP client.
    ///
    /// The client's own timeout settings apply unless [`with_timeout`] is
    /// called afterwards.
    ///
    /// [`with_timeout`]: ClientConfig::with_timeout
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self.timeout = None;
        self
    }

    /// The configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The configured end-to-end timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether a caller-supplied HTTP client is set
    pub fn has_custom_http_client(&self) -> bool {
        self.http_client.is_some()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("custom_http_client", &self.http_client.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ClientConfig::new("test-api-key");

        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.timeout(), Some(DEFAULT_TIMEOUT));
        assert_eq!(config.api_key, "test-api-key");
        assert!(!config.has_custom_http_client());
    }

    #[test]
    fn test_with_base_url() {
        let config =
            ClientConfig::new("test-api-key").with_base_url("https://custom.api.example.com/");
        assert_eq!(config.base_url(), "https://custom.api.example.com");
    }

    #[test]
    fn test_last_timeout_wins() {
        let config = ClientConfig::new("test-api-key")
            .with_timeout(Duration::from_secs(100))
            .with_timeout(Duration::from_secs(200));
        assert_eq!(config.timeout(), Some(Duration::from_secs(200)));
    }

    #[test]
    fn test_http_client_then_timeout() {
        let config = ClientConfig::new("test-api-key")
            .with_http_client(reqwest::Client::new())
            .with_timeout(Duration::from_secs(60));

        assert!(config.has_custom_http_client());
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_timeout_then_http_client() {
        let config = ClientConfig::new("test-api-key")
            .with_timeout(Duration::from_secs(90))
            .with_http_client(reqwest::Client::new());

        // The custom client's own settings govern
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ClientConfig::new("super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_from_settings_custom_key_env() {
        std::env::set_var("MISTRAL_TEST_KEY_FROM_SETTINGS", "settings-key");
        let settings = Settings {
            base_url: Some("https://settings.example.com".to_string()),
            timeout_secs: Some(15),
            api_key_env: Some("MISTRAL_TEST_KEY_FROM_SETTINGS".to_string()),
        };

        let config = ClientConfig::from_settings(&settings).unwrap();
        assert_eq!(config.api_key, "settings-key");

        // Environment overrides may be set by the surrounding shell
        if std::env::var(BASE_URL_ENV).is_err() {
            assert_eq!(config.base_url(), "https://settings.example.com");
        }
        if std::env::var(TIMEOUT_ENV).is_err() {
            assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        }
    }

    #[test]
    fn test_explicit_key_keeps_file_settings() {
        let settings = Settings {
            base_url: Some("https://file.example.com/".to_string()),
            timeout_secs: Some(25),
            api_key_env: Some("MISTRAL_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
        };

        let config = ClientConfig::from_settings_with_key(&settings, "flag-key").unwrap();
        assert_eq!(config.api_key, "flag-key");

        if std::env::var(BASE_URL_ENV).is_err() {
            assert_eq!(config.base_url(), "https://file.example.com");
        }
        if std::env::var(TIMEOUT_ENV).is_err() {
            assert_eq!(config.timeout(), Some(Duration::from_secs(25)));
        }
    }

    #[test]
    fn test_from_settings_missing_key() {
        let settings = Settings {
            api_key_env: Some("MISTRAL_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..Default::default()
        };

        let err = ClientConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, MistralError::Config(_)));
    }
}
