//! Streaming Types
//!
//! Chunk shapes delivered by a streaming chat completion, and the accumulator
//! that folds them back into a complete message.

use crate::api::chat::{ChatMessage, FunctionCall, MessageContent, Role, ToolCall, Usage};
use serde::{Deserialize, Serialize};

/// One incremental piece of a streamed chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Completion ID, shared by every chunk of one response
    pub id: String,

    /// Object type ("chat.completion.chunk")
    #[serde(default)]
    pub object: String,

    /// Creation timestamp (Unix seconds)
    #[serde(default)]
    pub created: i64,

    /// Model name
    pub model: String,

    /// Choices with deltas
    pub choices: Vec<StreamChoice>,

    /// Usage info (only in final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    /// Content delta of the first choice, if any
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// The delta (partial message)
    #[serde(default)]
    pub delta: StreamDelta,

    /// Finish reason (set in final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Role (usually only in first chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Content delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool calls delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Delta for tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index in the tool_calls array
    #[serde(default)]
    pub index: u32,

    /// Tool call ID (only in first chunk for this tool call)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Type (only in first chunk)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,

    /// Function delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Delta for function calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name (only in first chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Arguments delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Accumulator for streaming chunks
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Accumulated content
    pub content: String,

    /// Accumulated tool calls
    pub tool_calls: Vec<ToolCallAccumulator>,

    /// Role from first chunk
    pub role: Option<Role>,

    /// Finish reason from last chunk
    pub finish_reason: Option<String>,

    /// Response ID
    pub id: Option<String>,

    /// Model name
    pub model: Option<String>,

    /// Created timestamp
    pub created: Option<i64>,

    /// Usage from final chunk
    pub usage: Option<Usage>,

    /// Number of chunks folded in
    pub chunks: usize,
}

/// Accumulator for a single tool call
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    pub id: String,
    pub call_type: String,
    pub name: String,
    pub arguments: String,
}

impl StreamAccumulator {
    /// Create a new accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk into the accumulated message
    pub fn process_chunk(&mut self, chunk: &ChatCompletionChunk) {
        self.chunks += 1;

        if self.id.is_none() {
            self.id = Some(chunk.id.clone());
            self.model = Some(chunk.model.clone());
            self.created = Some(chunk.created);
        }

        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }

        // Only the first choice is folded; n > 1 streams need per-index accumulators.
        for choice in chunk.choices.iter().filter(|c| c.index == 0) {
            if self.role.is_none() {
                self.role = choice.delta.role;
            }

            if let Some(content) = &choice.delta.content {
                self.content.push_str(content);
            }

            for tc_delta in choice.delta.tool_calls.iter().flatten() {
                let idx = tc_delta.index as usize;
                if self.tool_calls.len() <= idx {
                    self.tool_calls
                        .resize_with(idx + 1, ToolCallAccumulator::default);
                }

                let tc = &mut self.tool_calls[idx];
                if let Some(id) = &tc_delta.id {
                    tc.id = id.clone();
                }
                if let Some(call_type) = &tc_delta.call_type {
                    tc.call_type = call_type.clone();
                }
                if let Some(func) = &tc_delta.function {
                    if let Some(name) = &func.name {
                        tc.name.push_str(name);
                    }
                    if let Some(args) = &func.arguments {
                        tc.arguments.push_str(args);
                    }
                }
            }

            if let Some(reason) = &choice.finish_reason {
                self.finish_reason = Some(reason.clone());
            }
        }
    }

    /// Convert to a final message
    pub fn into_message(self) -> ChatMessage {
        let tool_calls = if self.tool_calls.is_empty() {
            None
        } else {
            Some(
                self.tool_calls
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        call_type: if tc.call_type.is_empty() {
                            "function".to_string()
                        } else {
                            tc.call_type
                        },
                        function: FunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect(),
            )
        };

        ChatMessage {
            role: self.role.unwrap_or(Role::Assistant),
            content: MessageContent::Text(self.content),
            name: None,
            tool_call_id: None,
            tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(delta: StreamDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: "cmpl-1".to_string(),
            object: "chat.completion.chunk".to_string(),
            created: 12345,
            model: "mistral-small".to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage: None,
        }
    }

    #[test]
    fn test_chunk_deserialization() {
        let json = r#"{"id":"cmpl-123","object":"chat.completion.chunk","created":1677652288,"model":"mistral-small","choices":[{"index":0,"delta":{"role":"assistant","content":"Hello"},"finish_reason":null}]}"#;

        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.id, "cmpl-123");
        assert_eq!(chunk.content(), Some("Hello"));
        assert_eq!(chunk.choices[0].delta.role, Some(Role::Assistant));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_final_chunk_with_usage_and_empty_delta() {
        let json = r#"{"id":"c","object":"chat.completion.chunk","created":1,"model":"m","choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#;

        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.content(), None);
        assert_eq!(chunk.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(chunk.usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn test_stream_accumulator() {
        let mut acc = StreamAccumulator::new();

        acc.process_chunk(&chunk(
            StreamDelta {
                role: Some(Role::Assistant),
                content: Some("Hello".to_string()),
                tool_calls: None,
            },
            None,
        ));
        acc.process_chunk(&chunk(
            StreamDelta {
                role: None,
                content: Some(" World".to_string()),
                tool_calls: None,
            },
            Some("stop"),
        ));

        assert_eq!(acc.content, "Hello World");
        assert_eq!(acc.role, Some(Role::Assistant));
        assert_eq!(acc.finish_reason.as_deref(), Some("stop"));
        assert_eq!(acc.chunks, 2);

        let message = acc.into_message();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.content.to_string_content(), "Hello World");
        assert!(message.tool_calls.is_none());
    }

    #[test]
    fn test_accumulator_joins_tool_call_fragments() {
        let mut acc = StreamAccumulator::new();

        let fragment = |id: Option<&str>, name: Option<&str>, args: &str| StreamDelta {
            role: None,
            content: None,
            tool_calls: Some(vec![ToolCallDelta {
                index: 0,
                id: id.map(str::to_string),
                call_type: None,
                function: Some(FunctionDelta {
                    name: name.map(str::to_string),
                    arguments: Some(args.to_string()),
                }),
            }]),
        };

        acc.process_chunk(&chunk(fragment(Some("call_1"), Some("get_weather"), "{\"city\":"), None));
        acc.process_chunk(&chunk(fragment(None, None, "\"Paris\"}"), Some("tool_calls")));

        let message = acc.into_message();
        let calls = message.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].call_type, "function");
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, "{\"city\":\"Paris\"}");
    }
}
