//! Ollama-compatible streaming chat transport — the default local,
//! zero-cost backend a terminal harness like this one runs against (see
//! the `ollama/*` entries in the teacher's model catalog).

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ChatChunk, ChatMessage, ChatRequest, LlmError, LlmProvider, Role, ToolCall};

/// Talks to a local (or remote) Ollama-compatible `/api/chat` endpoint.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Serialize)]
struct WireOptions {
    num_ctx: u32,
    num_predict: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    think: bool,
    options: WireOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    message: Option<WireResponseMessage>,
    #[serde(default)]
    done: bool,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn to_wire_tool_calls(calls: &[ToolCall]) -> Vec<WireToolCall> {
    calls
        .iter()
        .map(|c| WireToolCall {
            id: Some(c.id.clone()),
            function: WireFunctionCall { name: c.name.clone(), arguments: c.arguments.clone() },
        })
        .collect()
}

fn from_wire_tool_calls(calls: Vec<WireToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(i, c)| ToolCall {
            id: c.id.unwrap_or_else(|| format!("call_{i}")),
            name: c.function.name,
            arguments: c.function.arguments,
        })
        .collect()
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat_stream(
        &self,
        request: ChatRequest,
        on_chunk: &mut (dyn FnMut(ChatChunk) + Send),
    ) -> Result<ChatMessage, LlmError> {
        let wire_req = WireRequest {
            model: request.model,
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: role_str(m.role),
                    content: m.content.clone(),
                    tool_calls: m.tool_calls.as_deref().map(to_wire_tool_calls),
                })
                .collect(),
            stream: true,
            think: request.enable_thinking,
            options: WireOptions {
                num_ctx: request.num_ctx,
                num_predict: request.num_predict,
                temperature: request.temperature,
                repeat_penalty: request.repeat_penalty,
            },
            format: request.format,
            keep_alive: request.keep_alive,
            tools: request.tools.iter().map(tool_definition_to_wire).collect(),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&wire_req)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let mut stream = response.bytes_stream();
        let mut content = String::new();
        let mut tool_calls: Option<Vec<ToolCall>> = None;
        let mut buffer = Vec::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| LlmError::Transport(e.to_string()))?;
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = line.strip_suffix(b"\n").unwrap_or(&line);
                if line.is_empty() {
                    continue;
                }
                let parsed: WireResponse = serde_json::from_slice(line)
                    .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

                let mut delta = ChatChunk { done: parsed.done, ..Default::default() };
                if let Some(msg) = parsed.message {
                    if !msg.content.is_empty() {
                        content.push_str(&msg.content);
                        delta.content = Some(msg.content);
                    }
                    delta.thinking = msg.thinking;
                    if let Some(calls) = msg.tool_calls {
                        let converted = from_wire_tool_calls(calls);
                        delta.tool_calls = Some(converted.clone());
                        tool_calls = Some(converted);
                    }
                }
                on_chunk(delta);
            }
        }

        Ok(match tool_calls {
            Some(calls) => ChatMessage::assistant_with_tool_calls(calls),
            None => ChatMessage::assistant(content),
        })
    }
}

fn tool_definition_to_wire(def: &super::ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": def.name,
            "description": def.description,
            "parameters": def.parameters,
        }
    })
}
