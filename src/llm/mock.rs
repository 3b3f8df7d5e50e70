//! Deterministic in-memory provider used by the executor's test suite —
//! no network calls, scripted responses per call.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatChunk, ChatMessage, ChatRequest, LlmError, LlmProvider, Role};

/// One scripted turn: either a final assistant message, or a set of tool
/// calls to emit before the caller feeds back tool results.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Message(String),
    ToolCalls(Vec<super::ToolCall>),
}

/// Replays a fixed script of responses, one per call to `chat_stream`,
/// regardless of what's in the request. Panics if the script runs out —
/// tests should script exactly as many turns as the executor will take.
pub struct MockProvider {
    script: Mutex<Vec<ScriptedTurn>>,
}

impl MockProvider {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self { script: Mutex::new(script) }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn chat_stream(
        &self,
        _request: ChatRequest,
        on_chunk: &mut (dyn FnMut(ChatChunk) + Send),
    ) -> Result<ChatMessage, LlmError> {
        let turn = {
            let mut script = self.script.lock().expect("mock script mutex poisoned");
            if script.is_empty() {
                panic!("MockProvider script exhausted — scripted too few turns for this test");
            }
            script.remove(0)
        };

        match turn {
            ScriptedTurn::Message(content) => {
                on_chunk(ChatChunk { content: Some(content.clone()), ..Default::default() });
                on_chunk(ChatChunk { done: true, ..Default::default() });
                Ok(ChatMessage::assistant(content))
            }
            ScriptedTurn::ToolCalls(calls) => {
                on_chunk(ChatChunk { tool_calls: Some(calls.clone()), done: true, ..Default::default() });
                Ok(ChatMessage {
                    role: Role::Assistant,
                    content: String::new(),
                    tool_calls: Some(calls),
                    tool_call_id: None,
                })
            }
        }
    }
}
