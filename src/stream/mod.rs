//! Streaming Module
//!
//! SSE parsing and the streaming chat completion session.

pub mod parser;
pub mod session;

pub use parser::{EventStreamParser, LineDecoder, MAX_LINE_BYTES};
pub use session::ChatCompletionStream;
