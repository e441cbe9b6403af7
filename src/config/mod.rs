//! Configuration Module
//!
//! Client options and settings-file loading.

pub mod loader;
pub mod options;

pub use loader::{ConfigLoader, Settings};
pub use options::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
