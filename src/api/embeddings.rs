//! Embeddings API

use crate::api::chat::Usage;
use crate::client::RequestBody;
use crate::error::Result;
use crate::MistralClient;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Path of the embeddings endpoint
pub const EMBEDDINGS_PATH: &str = "/v1/embeddings";

/// Request to embed a batch of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Embedding model (e.g. "mistral-embed")
    pub model: String,

    /// Strings to embed, one vector per entry
    pub input: Vec<String>,

    /// "float" (default) or "base64"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
}

impl EmbeddingRequest {
    pub fn new<I, S>(model: impl Into<String>, input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model: model.into(),
            input: input.into_iter().map(Into::into).collect(),
            encoding_format: None,
        }
    }

    pub fn with_encoding_format(mut self, format: impl Into<String>) -> Self {
        self.encoding_format = Some(format.into());
        self
    }
}

/// Embeddings for every input of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub id: String,

    #[serde(default)]
    pub object: String,

    /// One entry per input, correlated through `index`
    pub data: Vec<Embedding>,

    pub model: String,

    #[serde(default)]
    pub usage: Usage,
}

impl EmbeddingResponse {
    /// Vectors ordered by their input index
    pub fn vectors(&self) -> Vec<&[f64]> {
        let mut data: Vec<&Embedding> = self.data.iter().collect();
        data.sort_by_key(|e| e.index);
        data.into_iter().map(|e| e.embedding.as_slice()).collect()
    }
}

/// A single embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    #[serde(default)]
    pub object: String,

    pub embedding: Vec<f64>,

    pub index: usize,
}

impl MistralClient {
    /// Generate embeddings for the request's inputs
    pub async fn embeddings(&self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.http
            .request_json(
                Method::POST,
                EMBEDDINGS_PATH,
                &[],
                RequestBody::json(request)?,
            )
            .await
    }
}
