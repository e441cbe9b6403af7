//! Models API

use crate::client::RequestBody;
use crate::error::Result;
use crate::MistralClient;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Path of the models collection
pub const MODELS_PATH: &str = "/v1/models";

/// A model card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,

    #[serde(default)]
    pub object: String,

    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub owned_by: String,

    /// "base" or "fine-tuned"
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub model_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Available models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub object: String,

    pub data: Vec<Model>,
}

/// Acknowledgement of a model deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteModelResponse {
    pub id: String,

    #[serde(default)]
    pub object: String,

    pub deleted: bool,
}

impl MistralClient {
    /// List base and fine-tuned models available to this key
    pub async fn list_models(&self) -> Result<ModelList> {
        self.http
            .request_json(Method::GET, MODELS_PATH, &[], RequestBody::Empty)
            .await
    }

    /// Get one model card
    pub async fn get_model(&self, model_id: &str) -> Result<Model> {
        self.http
            .request_json(
                Method::GET,
                &format!("{}/{}", MODELS_PATH, model_id),
                &[],
                RequestBody::Empty,
            )
            .await
    }

    /// Delete a fine-tuned model. Base models cannot be deleted.
    pub async fn delete_model(&self, model_id: &str) -> Result<DeleteModelResponse> {
        self.http
            .request_json(
                Method::DELETE,
                &format!("{}/{}", MODELS_PATH, model_id),
                &[],
                RequestBody::Empty,
            )
            .await
    }
}
