//! API Module
//!
//! Request and response types for each endpoint family, and the client
//! methods that call them.

pub mod chat;
pub mod embeddings;
pub mod files;
pub mod models;
pub mod streaming;

pub use chat::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, ContentPart, FunctionCall,
    FunctionDefinition, ImageUrl, MessageContent, ResponseFormat, Role, Tool, ToolCall,
    ToolChoice, Usage,
};
pub use embeddings::{Embedding, EmbeddingRequest, EmbeddingResponse};
pub use files::{
    DeleteFileResponse, File, FileList, FilePurpose, ListFilesParams, UploadFileRequest,
};
pub use models::{DeleteModelResponse, Model, ModelList};
pub use streaming::{
    ChatCompletionChunk, FunctionDelta, StreamAccumulator, StreamChoice, StreamDelta,
    ToolCallAccumulator, ToolCallDelta,
};
