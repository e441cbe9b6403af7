//! Client Module
//!
//! HTTP transport shared by every endpoint.

pub mod http;

pub use http::{ByteStream, HttpClient, RequestBody, EVENT_STREAM_CONTENT_TYPE, JSON_CONTENT_TYPE};
