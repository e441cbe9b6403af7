//! HTTP Client
//!
//! Authenticated request execution and error-response handling shared by the
//! streaming and non-streaming endpoints.

use crate::config::ClientConfig;
use crate::error::{ApiError, MistralError, Result};
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Content type of JSON request and response bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Accept header value for server-sent event responses
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Maximum number of body characters quoted in a decode error
const ERROR_BODY_EXCERPT: usize = 500;

/// A boxed stream of response body bytes
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body of an outbound request
pub enum RequestBody {
    /// No body
    Empty,

    /// Pre-serialized JSON
    Json(Vec<u8>),

    /// Multipart form upload
    Multipart(Form),
}

impl RequestBody {
    /// Serialize a value as a JSON body
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_vec(value)
            .map(RequestBody::Json)
            .map_err(MistralError::Serialize)
    }
}

/// HTTP client bound to one base URL and credential.
///
/// Holds no per-request state; clones share the underlying connection pool.
#[derive(Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Base URL without trailing slash
    base_url: Arc<str>,

    /// Pre-built `Authorization` header value
    auth: HeaderValue,

    /// End-to-end timeout applied per request
    timeout: Option<Duration>,
}

impl HttpClient {
    /// Create a new HTTP client from a configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        reqwest::Url::parse(&config.base_url).map_err(|e| {
            MistralError::Config(format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| MistralError::Config(format!("Invalid API key format: {}", e)))?;
        auth.set_sensitive(true);

        let client = match &config.http_client {
            Some(client) => client.clone(),
            None => Client::builder()
                .connect_timeout(config.connect_timeout)
                .user_agent(concat!("mistral-client/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    MistralError::Config(format!("Failed to create HTTP client: {}", e))
                })?,
        };

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.as_str()),
            auth,
            timeout: config.timeout,
        })
    }

    /// The base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The per-request timeout, if one is applied
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Issue a single request and return the raw response.
    ///
    /// Non-success statuses are returned as responses, not errors; callers
    /// decide what counts as success.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: RequestBody,
        accept: Option<&'static str>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(AUTHORIZATION, self.auth.clone());

        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(bytes) => request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(bytes),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        debug!(%method, path, "Sending request");

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                MistralError::InvalidRequest(e.to_string())
            } else {
                MistralError::Transport(e)
            }
        })?;

        debug!(%method, path, status = response.status().as_u16(), "Received response");
        Ok(response)
    }

    /// Send a request and decode a JSON response; any 2xx status is success
    pub async fn request_json<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: RequestBody,
    ) -> Result<R> {
        let response = self
            .send(method, path, query, body, Some(JSON_CONTENT_TYPE))
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let bytes = response.bytes().await?;
        decode_json(&bytes)
    }

    /// Send a request and hand back the raw response body as a byte stream
    pub async fn request_bytes(&self, method: Method, path: &str) -> Result<ByteStream> {
        let response = self
            .send(method, path, &[], RequestBody::Empty, None)
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(|e| MistralError::Read(e.to_string()));
            }
        };

        Ok(Box::pin(s))
    }

    /// Read a failed response to the end and turn it into an API error
    pub async fn error_from_response(response: Response) -> MistralError {
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        let error = ApiError::from_response_body(status, &body);

        warn!(
            status,
            error_type = ?error.error_type,
            message = %error.message,
            "API returned an error"
        );
        MistralError::Api(error)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Decode a JSON body, quoting the start of the body on failure
pub(crate) fn decode_json<R: DeserializeOwned>(body: &[u8]) -> Result<R> {
    serde_json::from_slice(body).map_err(|e| {
        let excerpt: String = String::from_utf8_lossy(body)
            .chars()
            .take(ERROR_BODY_EXCERPT)
            .collect();
        MistralError::Decode(format!("{}. Body: {}", e, excerpt))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new(&ClientConfig::new("test-api-key"));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "https://api.mistral.ai");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::new("test-api-key").with_base_url("not a url");
        let err = HttpClient::new(&config).unwrap_err();
        assert!(matches!(err, MistralError::Config(_)));
    }

    #[test]
    fn test_invalid_api_key() {
        let err = HttpClient::new(&ClientConfig::new("bad\nkey")).unwrap_err();
        assert!(err.to_string().contains("Invalid API key format"));
    }

    #[test]
    fn test_debug_hides_credential() {
        let client = HttpClient::new(&ClientConfig::new("super-secret")).unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }

    #[test]
    fn test_decode_json_error_quotes_body() {
        let body = "x".repeat(2_000);
        let err = decode_json::<serde_json::Value>(body.as_bytes()).unwrap_err();

        match err {
            MistralError::Decode(msg) => {
                assert!(msg.contains("Body: xxx"));
                assert!(msg.len() < 700);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
