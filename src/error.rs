//! Mistral Client Error Types
//!
//! Error handling for the client library: construction, transport, API,
//! decoding, streaming and cancellation failures.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Main error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum MistralError {
    /// Configuration errors (missing API key, invalid base URL, bad settings file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The outbound request could not be built
    #[error("Failed to create request: {0}")]
    InvalidRequest(String),

    /// The request body could not be serialized
    #[error("Failed to marshal request: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Network-level failure before a response was received
    #[error("Failed to execute request: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A non-streaming response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A well-framed stream event carried a malformed payload
    #[error("Failed to unmarshal stream chunk: {source}. Data: {data}")]
    Parse {
        data: String,
        #[source]
        source: serde_json::Error,
    },

    /// The response body failed while it was being streamed
    #[error("Error reading stream: {0}")]
    Read(String),

    /// The caller cancelled the operation
    #[error("Request cancelled")]
    Cancelled,
}

impl MistralError {
    /// Whether this error was caused by caller-driven cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, MistralError::Cancelled)
    }

    /// Whether the underlying transport timed out
    pub fn is_timeout(&self) -> bool {
        match self {
            MistralError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// The structured API error, if this is one
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            MistralError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP status code attached to the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            MistralError::Api(e) => Some(e.status_code),
            MistralError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// An error response returned by the API.
///
/// `status_code` always carries the real HTTP status, whether or not the body
/// could be decoded. When it could not, `message` holds the raw body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status_code: u16,

    pub message: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<String>,
}

/// Outcome of decoding an error body
enum ErrorBody {
    Structured(ApiError),
    Raw(String),
}

impl ErrorBody {
    fn decode(body: &[u8]) -> Self {
        // `message` is required: JSON without it falls back to the raw text
        // rather than an empty message.
        match serde_json::from_slice::<ApiError>(body) {
            Ok(error) => ErrorBody::Structured(error),
            Err(_) => ErrorBody::Raw(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

impl ApiError {
    /// Build an error from a failed response's status and body bytes
    pub fn from_response_body(status_code: u16, body: &[u8]) -> Self {
        match ErrorBody::decode(body) {
            ErrorBody::Structured(error) => ApiError {
                status_code,
                ..error
            },
            ErrorBody::Raw(message) => ApiError {
                status_code,
                message,
                error_type: None,
                code: None,
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            Some(error_type) if !error_type.is_empty() => {
                write!(f, "{}: {}", error_type, self.message)
            }
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, MistralError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_body() {
        let body = br#"{"message":"Invalid API key","type":"authentication_error"}"#;
        let error = ApiError::from_response_body(401, body);

        assert_eq!(error.status_code, 401);
        assert_eq!(error.message, "Invalid API key");
        assert_eq!(error.error_type.as_deref(), Some("authentication_error"));
        assert_eq!(error.to_string(), "authentication_error: Invalid API key");
    }

    #[test]
    fn test_raw_error_body_fallback() {
        let error = ApiError::from_response_body(500, b"Internal Server Error");

        assert_eq!(error.status_code, 500);
        assert_eq!(error.message, "Internal Server Error");
        assert!(error.error_type.is_none());
        assert!(error.code.is_none());
        assert_eq!(error.to_string(), "Internal Server Error");
    }

    #[test]
    fn test_error_body_without_message_is_raw() {
        let body = br#"{"detail":"not found"}"#;
        let error = ApiError::from_response_body(404, body);

        assert_eq!(error.message, r#"{"detail":"not found"}"#);
        assert!(error.error_type.is_none());
    }

    #[test]
    fn test_numeric_error_code() {
        let body = br#"{"message":"Too many tokens","type":"invalid_request_error","code":3051}"#;
        let error = ApiError::from_response_body(400, body);

        assert_eq!(error.code.as_deref(), Some("3051"));
    }

    #[test]
    fn test_display_without_type() {
        let error = ApiError {
            status_code: 500,
            message: "Internal server error".to_string(),
            error_type: None,
            code: None,
        };
        assert_eq!(error.to_string(), "Internal server error");
    }

    #[test]
    fn test_error_helpers() {
        let api: MistralError = ApiError::from_response_body(429, b"slow down").into();
        assert_eq!(api.status_code(), Some(429));
        assert!(api.as_api_error().is_some());
        assert!(!api.is_cancelled());

        assert!(MistralError::Cancelled.is_cancelled());
        assert_eq!(MistralError::Cancelled.status_code(), None);
    }
}
