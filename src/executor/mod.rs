//! Background execution of a single agent turn: the LLM iteration loop,
//! tool-call fan-out, and streamed progress — modeled on the
//! `tokio::spawn` background-task shape the corpus uses for long-running
//! work with a progress channel back to a consumer, adapted here to drive
//! [`crate::llm::LlmProvider`] instead of a Discord bot.

pub mod pipeline;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::agents::AgentDefinition;
use crate::llm::{ChatMessage, ChatRequest, LlmError, LlmProvider};
use crate::tools::{ToolContext, ToolRegistry};

use pipeline::StreamSender;

const MAX_TOOL_DEPTH: u32 = 25;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// How one agent invocation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStatus {
    Completed,
    NeedsInput,
    MaxIterations,
    Cancelled,
    Error,
}

/// The result of one [`AgentExecutor::run`] or [`AgentExecutor::resume_with_user_input`] call.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub status: ExecutorStatus,
    pub success: bool,
    pub data: Option<String>,
    pub thinking: Option<String>,
    pub error_message: Option<String>,
    pub iterations: u32,
}

impl AgentResult {
    fn error(status: ExecutorStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            data: None,
            thinking: None,
            error_message: Some(message.into()),
            iterations: 0,
        }
    }
}

/// Drives one agent's conversation with the model, one execution at a time.
pub struct AgentExecutor {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    model: String,
    num_ctx: u32,
    history: Vec<ChatMessage>,
}

impl AgentExecutor {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, model: impl Into<String>, num_ctx: u32) -> Self {
        Self { provider, tools, model: model.into(), num_ctx, history: Vec::new() }
    }

    pub fn message_history_len(&self) -> usize {
        self.history.len()
    }

    /// Start a fresh conversation for `definition` with `user_input`.
    pub async fn run(
        &mut self,
        definition: &AgentDefinition,
        user_input: &str,
        cancel: &AtomicBool,
        tx: &StreamSender,
    ) -> AgentResult {
        self.history.clear();
        self.history.push(ChatMessage::system(definition.system_prompt.clone()));
        self.history.push(ChatMessage::user(user_input.to_string()));
        self.drive(definition, cancel, tx).await
    }

    /// Continue a `conversation_mode` agent with a new user message, without
    /// resetting prior history.
    pub async fn resume_with_user_input(
        &mut self,
        definition: &AgentDefinition,
        user_input: &str,
        cancel: &AtomicBool,
        tx: &StreamSender,
    ) -> AgentResult {
        self.history.push(ChatMessage::user(user_input.to_string()));
        self.drive(definition, cancel, tx).await
    }

    async fn drive(&mut self, definition: &AgentDefinition, cancel: &AtomicBool, tx: &StreamSender) -> AgentResult {
        let tool_defs = self.tools.definitions_for(&definition.tools);
        let tool_ctx = ToolContext { agent_name: definition.name.clone() };
        let mut tool_depth = 0u32;

        for iteration in 1..=definition.max_iterations {
            if cancel.load(Ordering::SeqCst) {
                tx.send_done().await;
                return AgentResult {
                    status: ExecutorStatus::Cancelled,
                    success: false,
                    data: None,
                    thinking: None,
                    error_message: None,
                    iterations: iteration - 1,
                };
            }

            info!(agent = %definition.name, iteration, "agent iteration");

            let request = ChatRequest::new(self.model.clone(), self.history.clone())
                .with_tools(tool_defs.clone());
            let response = match self.chat_with_retry(request, tx).await {
                Ok(message) => message,
                Err(err) => {
                    tx.send_done().await;
                    return AgentResult::error(ExecutorStatus::Error, err.to_string());
                }
            };

            match &response.tool_calls {
                None => {
                    self.history.push(response.clone());
                    tx.send_done().await;
                    return AgentResult {
                        status: if definition.conversation_mode {
                            ExecutorStatus::NeedsInput
                        } else {
                            ExecutorStatus::Completed
                        },
                        success: true,
                        data: Some(response.content),
                        thinking: None,
                        error_message: None,
                        iterations: iteration,
                    };
                }
                Some(calls) => {
                    tool_depth += 1;
                    if tool_depth > MAX_TOOL_DEPTH {
                        tx.send_done().await;
                        return AgentResult::error(
                            ExecutorStatus::Error,
                            format!("exceeded max tool depth ({MAX_TOOL_DEPTH})"),
                        );
                    }

                    self.history.push(response.clone());
                    for call in calls {
                        tx.send_tool_start(&call.name).await;
                        let start = Instant::now();
                        let result = self
                            .tools
                            .execute_tool_call(call, &definition.tools, &tool_ctx)
                            .await;
                        let elapsed_ms = start.elapsed().as_millis() as u64;
                        tx.send_tool_complete(
                            &call.name,
                            result.success,
                            elapsed_ms,
                            call.arguments.clone(),
                            result.content.clone(),
                            result.content.len(),
                        )
                        .await;
                        self.history.push(ChatMessage::tool_result(call.id.clone(), result.content));

                        if cancel.load(Ordering::SeqCst) {
                            tx.send_done().await;
                            return AgentResult {
                                status: ExecutorStatus::Cancelled,
                                success: false,
                                data: None,
                                thinking: None,
                                error_message: None,
                                iterations: iteration,
                            };
                        }
                    }
                }
            }
        }

        tx.send_done().await;
        AgentResult {
            status: ExecutorStatus::MaxIterations,
            success: false,
            data: None,
            thinking: None,
            error_message: Some("reached max_iterations without a final answer".to_string()),
            iterations: definition.max_iterations,
        }
    }

    /// Run one streaming completion, forwarding chunks to `tx`. On a
    /// transport error, emits a synthetic notice, retries once, and
    /// surfaces the second failure to the caller.
    async fn chat_with_retry(&self, request: ChatRequest, tx: &StreamSender) -> Result<ChatMessage, LlmError> {
        match self.stream_once(request.clone(), tx).await {
            Ok(message) => Ok(message),
            Err(LlmError::Transport(reason)) => {
                warn!(%reason, "transport error, retrying once");
                tx.send_chunk(pipeline::ProgressChunk {
                    content: Some(format!("Connection failed: {reason}. Retrying...")),
                    ..Default::default()
                })
                .await;
                tokio::time::sleep(RETRY_BACKOFF).await;
                match self.stream_once(request, tx).await {
                    Ok(message) => Ok(message),
                    Err(err) => {
                        tx.send_chunk(pipeline::ProgressChunk {
                            content: Some(format!("Connection failed again: {err}")),
                            ..Default::default()
                        })
                        .await;
                        Err(err)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn stream_once(&self, request: ChatRequest, tx: &StreamSender) -> Result<ChatMessage, LlmError> {
        let chunks = std::sync::Mutex::new(Vec::new());
        let message = self
            .provider
            .chat_stream(request, &mut |chunk| {
                chunks.lock().unwrap_or_else(|p| p.into_inner()).push(chunk);
            })
            .await?;

        for chunk in chunks.into_inner().unwrap_or_else(|p| p.into_inner()) {
            if chunk.thinking.is_some() || chunk.content.is_some() {
                tx.send_chunk(pipeline::ProgressChunk {
                    thinking: chunk.thinking,
                    content: chunk.content,
                    done: false,
                })
                .await;
            }
        }
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDefinition;
    use crate::llm::mock::{MockProvider, ScriptedTurn};
    use crate::llm::ToolCall;
    use crate::scheduler::TaskScheduler;
    use crate::tools::task_tools::register_all;
    use std::sync::Mutex;

    fn definition(tools: Vec<&str>) -> AgentDefinition {
        AgentDefinition {
            name: "tester".into(),
            description: "test agent".into(),
            tools: tools.into_iter().map(str::to_string).collect(),
            max_iterations: 4,
            conversation_mode: false,
            system_prompt: "You are a test agent.".into(),
            source: "test".into(),
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        let mut registry = ToolRegistry::new();
        register_all(&mut registry, Arc::new(Mutex::new(sched)));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn plain_message_completes_without_tool_calls() {
        let provider = Arc::new(MockProvider::new(vec![ScriptedTurn::Message("all done".into())]));
        let mut executor = AgentExecutor::new(provider, registry(), "test-model", 4096);
        let (tx, _rx) = pipeline::channel();
        let cancel = AtomicBool::new(false);
        let result = executor.run(&definition(vec![]), "do the thing", &cancel, &tx).await;
        assert_eq!(result.status, ExecutorStatus::Completed);
        assert_eq!(result.data.as_deref(), Some("all done"));
    }

    #[tokio::test]
    async fn tool_call_then_message_round_trips() {
        let provider = Arc::new(MockProvider::new(vec![
            ScriptedTurn::ToolCalls(vec![ToolCall {
                id: "call_1".into(),
                name: "task_list".into(),
                arguments: serde_json::json!({}),
            }]),
            ScriptedTurn::Message("here is the list".into()),
        ]));
        let mut executor = AgentExecutor::new(provider, registry(), "test-model", 4096);
        let (tx, mut rx) = pipeline::channel();
        let cancel = AtomicBool::new(false);
        let result = executor.run(&definition(vec!["task_list"]), "list tasks", &cancel, &tx).await;
        assert_eq!(result.status, ExecutorStatus::Completed);
        assert_eq!(result.iterations, 2);

        let event = rx.tool_events.try_recv().unwrap();
        assert!(matches!(event, pipeline::ToolEvent::Start { name } if name == "task_list"));
    }

    #[tokio::test]
    async fn cancellation_between_iterations_stops_the_loop() {
        let provider = Arc::new(MockProvider::new(vec![ScriptedTurn::Message("unused".into())]));
        let mut executor = AgentExecutor::new(provider, registry(), "test-model", 4096);
        let (tx, _rx) = pipeline::channel();
        let cancel = AtomicBool::new(true);
        let result = executor.run(&definition(vec![]), "do the thing", &cancel, &tx).await;
        assert_eq!(result.status, ExecutorStatus::Cancelled);
    }

    #[tokio::test]
    async fn disallowed_tool_reports_permission_denied_but_continues() {
        let provider = Arc::new(MockProvider::new(vec![
            ScriptedTurn::ToolCalls(vec![ToolCall {
                id: "call_1".into(),
                name: "task_create".into(),
                arguments: serde_json::json!({"title": "x"}),
            }]),
            ScriptedTurn::Message("noted".into()),
        ]));
        let mut executor = AgentExecutor::new(provider, registry(), "test-model", 4096);
        let (tx, mut rx) = pipeline::channel();
        let cancel = AtomicBool::new(false);
        // Allowlist only task_list, so the scripted task_create call is denied.
        let result = executor.run(&definition(vec!["task_list"]), "create a task", &cancel, &tx).await;
        assert_eq!(result.status, ExecutorStatus::Completed);

        let mut saw_failure = false;
        while let Ok(event) = rx.tool_events.try_recv() {
            if let pipeline::ToolEvent::Complete { success, .. } = event {
                saw_failure |= !success;
            }
        }
        assert!(saw_failure);
    }
}
