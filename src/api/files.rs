//! Files API
//!
//! Upload, list, inspect, delete and download files used for fine-tuning and
//! batch jobs.

use crate::client::{ByteStream, RequestBody};
use crate::error::{MistralError, Result};
use crate::MistralClient;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of the files collection
pub const FILES_PATH: &str = "/v1/files";

/// What an uploaded file is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilePurpose {
    /// Training data for fine-tuning, usually JSONL
    #[serde(rename = "fine-tune")]
    FineTune,

    /// Batch processing requests
    #[serde(rename = "batch")]
    Batch,
}

impl FilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilePurpose::FineTune => "fine-tune",
            FilePurpose::Batch => "batch",
        }
    }
}

impl fmt::Display for FilePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FilePurpose {
    type Err = MistralError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fine-tune" => Ok(FilePurpose::FineTune),
            "batch" => Ok(FilePurpose::Batch),
            other => Err(MistralError::InvalidRequest(format!(
                "Unknown file purpose '{}'",
                other
            ))),
        }
    }
}

/// A file to upload
#[derive(Debug, Clone)]
pub struct UploadFileRequest {
    /// File content
    pub file: Bytes,

    /// Name to store the file under, including its extension
    pub filename: String,

    /// Intended use; omitted from the form when unset
    pub purpose: Option<FilePurpose>,
}

impl UploadFileRequest {
    pub fn new(file: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            filename: filename.into(),
            purpose: None,
        }
    }

    pub fn with_purpose(mut self, purpose: FilePurpose) -> Self {
        self.purpose = Some(purpose);
        self
    }

    fn into_form(self) -> Form {
        let mut form = Form::new();
        if let Some(purpose) = self.purpose {
            form = form.text("purpose", purpose.as_str());
        }
        let part = Part::bytes(self.file.to_vec()).file_name(self.filename);
        form.part("file", part)
    }
}

/// Pagination and filtering for [`MistralClient::list_files`].
/// Zero and empty values are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilesParams {
    /// Page number
    pub page: u32,

    /// Files per page
    pub page_size: u32,

    pub purpose: Option<FilePurpose>,

    /// Substring match on filenames
    pub search: String,
}

impl ListFilesParams {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if self.page > 0 {
            query.push(("page", self.page.to_string()));
        }
        if self.page_size > 0 {
            query.push(("page_size", self.page_size.to_string()));
        }
        if let Some(purpose) = self.purpose {
            query.push(("purpose", purpose.to_string()));
        }
        if !self.search.is_empty() {
            query.push(("search", self.search.clone()));
        }
        query
    }
}

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id: String,

    #[serde(default)]
    pub object: String,

    /// Size in bytes
    pub bytes: u64,

    pub created_at: DateTime<Utc>,

    pub filename: String,

    #[serde(default)]
    pub purpose: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A page of files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub object: String,

    pub data: Vec<File>,
}

/// Acknowledgement of a file deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFileResponse {
    pub id: String,

    #[serde(default)]
    pub object: String,

    pub deleted: bool,
}

fn file_path(file_id: &str) -> String {
    format!("{}/{}", FILES_PATH, file_id)
}

impl MistralClient {
    /// Upload a file as a multipart form
    pub async fn upload_file(&self, request: UploadFileRequest) -> Result<File> {
        tracing::debug!(
            filename = %request.filename,
            size = request.file.len(),
            "Uploading file"
        );
        self.http
            .request_json(
                Method::POST,
                FILES_PATH,
                &[],
                RequestBody::Multipart(request.into_form()),
            )
            .await
    }

    /// List uploaded files
    pub async fn list_files(&self, params: Option<&ListFilesParams>) -> Result<FileList> {
        let query = params.map(ListFilesParams::to_query).unwrap_or_default();
        self.http
            .request_json(Method::GET, FILES_PATH, &query, RequestBody::Empty)
            .await
    }

    /// Get a file's metadata
    pub async fn get_file(&self, file_id: &str) -> Result<File> {
        self.http
            .request_json(Method::GET, &file_path(file_id), &[], RequestBody::Empty)
            .await
    }

    /// Delete a file
    pub async fn delete_file(&self, file_id: &str) -> Result<DeleteFileResponse> {
        self.http
            .request_json(Method::DELETE, &file_path(file_id), &[], RequestBody::Empty)
            .await
    }

    /// Stream a file's content.
    ///
    /// The returned stream owns the response body; dropping it releases the
    /// connection.
    pub async fn download_file(&self, file_id: &str) -> Result<ByteStream> {
        self.http
            .request_bytes(Method::GET, &format!("{}/content", file_path(file_id)))
            .await
    }
}
