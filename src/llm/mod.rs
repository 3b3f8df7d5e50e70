//! LLM provider contract.
//!
//! The core treats the language model as an external collaborator: it
//! defines the narrow streaming chat interface [`LlmProvider`] and ships a
//! concrete [`ollama::OllamaProvider`] transport plus a deterministic
//! [`mock::MockProvider`] for tests, but never assumes a specific wire
//! protocol beyond this trait boundary.

mod error;
pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::LlmError;

/// Who produced a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls: None, tool_call_id: None }
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self { role: Role::Assistant, content: String::new(), tool_calls: Some(tool_calls), tool_call_id: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A function call the model wants executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A tool the model may call, described as JSON Schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One incremental delta from a streaming completion. Exactly one terminal
/// chunk with `done = true` closes out a stream.
#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    pub thinking: Option<String>,
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub done: bool,
}

/// Parameters for one streaming chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub enable_thinking: bool,
    pub format: Option<serde_json::Value>,
    pub keep_alive: Option<String>,
    pub num_ctx: u32,
    pub num_predict: i32,
    pub temperature: Option<f32>,
    pub repeat_penalty: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            enable_thinking: false,
            format: None,
            keep_alive: None,
            num_ctx: 8192,
            num_predict: -1,
            temperature: None,
            repeat_penalty: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A streaming chat completion provider. Implementations own the wire
/// protocol; the executor only ever speaks this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one streaming completion, invoking `on_chunk` for every delta as
    /// it arrives and returning the fully assembled final message once the
    /// stream's terminal `done` chunk has been delivered.
    async fn chat_stream(
        &self,
        request: ChatRequest,
        on_chunk: &mut (dyn FnMut(ChatChunk) + Send),
    ) -> Result<ChatMessage, LlmError>;
}
