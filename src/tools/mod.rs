//! Tool registry: the capability surface an agent's LLM turn is allowed to
//! reach into. Mirrors the `Tool` trait shape of the teacher's
//! `tools/builtin/task.rs`, generalized from a `TaskRepository`-backed
//! implementation to one backed by the in-process [`crate::store::TaskStore`].

mod error;
pub mod task_tools;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use error::ToolError;

/// Identity of the agent a tool call is executing on behalf of — the only
/// context a tool needs, since all state lives behind the scheduler mutex
/// the registry is constructed with.
pub struct ToolContext {
    pub agent_name: String,
}

/// Result of one successful tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub text: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>, elapsed: Duration) -> Self {
        Self { text: text.into(), elapsed }
    }
}

/// A capability an agent's tool-calling turn may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;
}

/// The outcome of routing one [`crate::llm::ToolCall`] through the registry,
/// in the shape the executor feeds back to the model as a tool result.
#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub success: bool,
    pub content: String,
    pub error_kind: Option<&'static str>,
    pub elapsed: Duration,
}

/// Name → tool map plus a per-agent allowlist check.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tool definitions for the subset of registered tools named in
    /// `allowed`, in the wire shape the LLM provider contract expects.
    pub fn definitions_for(&self, allowed: &[String]) -> Vec<crate::llm::ToolDefinition> {
        allowed
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| crate::llm::ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Execute a single tool call, enforcing the caller's allowlist. Never
    /// returns `Err` — permission and execution failures both come back as
    /// a failed [`ToolCallResult`] so the caller can feed the failure back
    /// to the model as a tool result rather than aborting the turn.
    pub async fn execute_tool_call(
        &self,
        call: &crate::llm::ToolCall,
        allowed: &[String],
        ctx: &ToolContext,
    ) -> ToolCallResult {
        let start = Instant::now();

        if !allowed.iter().any(|a| a == &call.name) {
            return ToolCallResult {
                tool_call_id: call.id.clone(),
                success: false,
                content: format!("tool '{}' is not in this agent's allowlist", call.name),
                error_kind: Some("permission_denied"),
                elapsed: start.elapsed(),
            };
        }

        let Some(tool) = self.tools.get(&call.name) else {
            return ToolCallResult {
                tool_call_id: call.id.clone(),
                success: false,
                content: format!("unknown tool '{}'", call.name),
                error_kind: Some("not_found"),
                elapsed: start.elapsed(),
            };
        };

        match tool.execute(call.arguments.clone(), ctx).await {
            Ok(output) => ToolCallResult {
                tool_call_id: call.id.clone(),
                success: true,
                content: output.text,
                error_kind: None,
                elapsed: start.elapsed(),
            },
            Err(err) => ToolCallResult {
                tool_call_id: call.id.clone(),
                success: false,
                content: err.to_string(),
                error_kind: Some(err.kind()),
                elapsed: start.elapsed(),
            },
        }
    }
}
