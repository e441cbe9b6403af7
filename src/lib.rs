//! Mistral Client - typed async access to the Mistral AI API
//!
//! Chat completions (plain and streamed), embeddings, files and models over
//! one authenticated HTTP client.
//!
//! ```no_run
//! use futures::StreamExt;
//! use mistral_client::{ChatCompletionRequest, ChatMessage, MistralClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> mistral_client::Result<()> {
//! let client = MistralClient::from_env()?;
//! let request = ChatCompletionRequest::new(
//!     "mistral-small-latest",
//!     vec![ChatMessage::user("Write a haiku about Rust")],
//! );
//!
//! let mut stream = client.chat_stream(&request, CancellationToken::new());
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod stream;

use client::HttpClient;

pub use api::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    EmbeddingRequest, EmbeddingResponse, FilePurpose, ListFilesParams, MessageContent, Role,
    StreamAccumulator, UploadFileRequest,
};
pub use config::ClientConfig;
pub use error::{ApiError, MistralError, Result};
pub use stream::ChatCompletionStream;
pub use tokio_util::sync::CancellationToken;

/// Client for the Mistral AI API.
///
/// Cheap to clone; clones share one connection pool. Holds no mutable state,
/// so a single client can serve any number of concurrent calls and streams.
#[derive(Debug, Clone)]
pub struct MistralClient {
    pub(crate) http: HttpClient,
}

impl MistralClient {
    /// Create a client with the default endpoint and timeout
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig::new(api_key))
    }

    /// Create a client from an explicit configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(MistralError::Config("API key is empty".to_string()));
        }

        tracing::debug!(base_url = %config.base_url, timeout = ?config.timeout, "Creating client");
        Ok(Self {
            http: HttpClient::new(&config)?,
        })
    }

    /// Create a client from settings files, `.env` and the environment
    pub fn from_env() -> Result<Self> {
        Self::with_config(ClientConfig::from_env()?)
    }

    /// The base URL requests are sent to
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_api_key_rejected() {
        let err = MistralClient::new("  ").unwrap_err();
        assert!(matches!(err, MistralError::Config(_)));
    }

    #[test]
    fn test_custom_base_url() {
        let client = MistralClient::with_config(
            ClientConfig::new("key").with_base_url("http://localhost:8080/"),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_timeout_option_ordering() {
        let custom = reqwest::Client::new();

        let client = MistralClient::with_config(
            ClientConfig::new("key").with_http_client(custom.clone()),
        )
        .unwrap();
        assert_eq!(client.http.timeout(), None);

        let client = MistralClient::with_config(
            ClientConfig::new("key")
                .with_http_client(custom)
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.http.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<MistralClient>();
    }
}
