//! The six tools an agent may call to observe and mutate the task graph —
//! adapted from the teacher's `tools::builtin::task` module, rebased from an
//! async `TaskRepository` onto the synchronous [`TaskScheduler`] behind a
//! shared mutex.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde_json::json;

use crate::scheduler::TaskScheduler;
use crate::store::{CreateTaskParams, DependencyType, TaskFilter, TaskPriority, TaskType};

use super::{Tool, ToolContext, ToolError, ToolOutput};

pub(crate) fn parse_priority(s: &str) -> Result<TaskPriority, ToolError> {
    match s {
        "critical" => Ok(TaskPriority::Critical),
        "high" => Ok(TaskPriority::High),
        "medium" => Ok(TaskPriority::Medium),
        "low" => Ok(TaskPriority::Low),
        "wishlist" => Ok(TaskPriority::Wishlist),
        other => Err(ToolError::InvalidArgument(format!("unknown priority '{other}'"))),
    }
}

pub(crate) fn parse_task_type(s: &str) -> Result<TaskType, ToolError> {
    match s {
        "task" => Ok(TaskType::Task),
        "bug" => Ok(TaskType::Bug),
        "feature" => Ok(TaskType::Feature),
        "research" => Ok(TaskType::Research),
        "wisp" => Ok(TaskType::Wisp),
        "molecule" => Ok(TaskType::Molecule),
        other => Err(ToolError::InvalidArgument(format!("unknown task_type '{other}'"))),
    }
}

pub(crate) fn parse_status(s: &str) -> Result<crate::store::TaskStatus, ToolError> {
    use crate::store::TaskStatus::*;
    match s {
        "pending" => Ok(Pending),
        "in_progress" => Ok(InProgress),
        "completed" => Ok(Completed),
        "blocked" => Ok(Blocked),
        "cancelled" => Ok(Cancelled),
        other => Err(ToolError::InvalidArgument(format!("unknown status '{other}'"))),
    }
}

fn str_param<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn require_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, ToolError> {
    str_param(params, key).ok_or_else(|| ToolError::InvalidArgument(format!("missing '{key}'")))
}

fn lock(scheduler: &Mutex<TaskScheduler>) -> std::sync::MutexGuard<'_, TaskScheduler> {
    scheduler.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// `task_create` — add a task, optionally blocked by existing tasks.
pub struct TaskCreateTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskCreateTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskCreateTool {
    fn name(&self) -> &str {
        "task_create"
    }

    fn description(&self) -> &str {
        "Create a new task in the task graph, optionally blocked by existing tasks."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "description": {"type": "string"},
                "priority": {"type": "string", "enum": ["critical", "high", "medium", "low", "wishlist"]},
                "task_type": {"type": "string", "enum": ["task", "bug", "feature", "research", "wisp", "molecule"]},
                "labels": {"type": "array", "items": {"type": "string"}},
                "parent_id": {"type": "string"},
                "blocked_by": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["title"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let title = require_str(&params, "title")?.to_string();
        let description = str_param(&params, "description").map(str::to_string);
        let priority = match str_param(&params, "priority") {
            Some(p) => parse_priority(p)?,
            None => TaskPriority::default(),
        };
        let task_type = match str_param(&params, "task_type") {
            Some(t) => parse_task_type(t)?,
            None => TaskType::default(),
        };
        let labels = params
            .get("labels")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let parent_id = str_param(&params, "parent_id").map(str::to_string);
        let blocked_by = params
            .get("blocked_by")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let id = lock(&self.scheduler).store_mut().create_task(CreateTaskParams {
            title,
            description,
            priority,
            task_type,
            labels,
            parent_id,
            blocked_by,
        })?;

        Ok(ToolOutput::text(format!("created task {id}"), start.elapsed()))
    }
}

/// `task_list` — query the graph by status/priority/type/label.
pub struct TaskListTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskListTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "task_list"
    }

    fn description(&self) -> &str {
        "List tasks, optionally filtered by status, priority, task_type, or label."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "status": {"type": "string", "enum": ["pending", "in_progress", "completed", "blocked", "cancelled"]},
                "priority": {"type": "string", "enum": ["critical", "high", "medium", "low", "wishlist"]},
                "task_type": {"type": "string", "enum": ["task", "bug", "feature", "research", "wisp", "molecule"]},
                "label": {"type": "string"}
            }
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let filter = TaskFilter {
            status: str_param(&params, "status").map(parse_status).transpose()?,
            priority: str_param(&params, "priority").map(parse_priority).transpose()?,
            task_type: str_param(&params, "task_type").map(parse_task_type).transpose()?,
            label: str_param(&params, "label").map(str::to_string),
        };

        let guard = lock(&self.scheduler);
        let tasks = guard.store().list_tasks(&filter);
        let lines: Vec<String> = tasks
            .iter()
            .map(|t| format!("{} [{}/{}] {}", t.id, t.status, t.priority, t.title))
            .collect();
        let text = if lines.is_empty() { "no matching tasks".to_string() } else { lines.join("\n") };
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// `task_update` — change status, priority, title, or task_type.
pub struct TaskUpdateTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskUpdateTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskUpdateTool {
    fn name(&self) -> &str {
        "task_update"
    }

    fn description(&self) -> &str {
        "Update a task's status, priority, title, or task_type."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "status": {"type": "string", "enum": ["pending", "in_progress", "completed", "blocked", "cancelled"]},
                "priority": {"type": "string", "enum": ["critical", "high", "medium", "low", "wishlist"]},
                "title": {"type": "string"},
                "task_type": {"type": "string", "enum": ["task", "bug", "feature", "research", "wisp", "molecule"]}
            },
            "required": ["id"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let id = require_str(&params, "id")?;
        let mut guard = lock(&self.scheduler);
        let store = guard.store_mut();

        let mut changes = Vec::new();
        if let Some(s) = str_param(&params, "status") {
            store.update_status(id, parse_status(s)?)?;
            changes.push("status");
        }
        if let Some(p) = str_param(&params, "priority") {
            store.update_priority(id, parse_priority(p)?)?;
            changes.push("priority");
        }
        if let Some(title) = str_param(&params, "title") {
            store.update_title(id, title.to_string())?;
            changes.push("title");
        }
        if let Some(tt) = str_param(&params, "task_type") {
            store.update_task_type(id, parse_task_type(tt)?)?;
            changes.push("task_type");
        }

        if changes.is_empty() {
            return Err(ToolError::InvalidArgument("no fields to update".into()));
        }
        Ok(ToolOutput::text(format!("updated {id}: {}", changes.join(", ")), start.elapsed()))
    }
}

/// `task_ready` — the current task plus the ready queue.
pub struct TaskReadyTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskReadyTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskReadyTool {
    fn name(&self) -> &str {
        "task_ready"
    }

    fn description(&self) -> &str {
        "Report the current task and the ready queue (unblocked, pending, non-molecule tasks)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let mut guard = lock(&self.scheduler);
        let current = guard.get_current_task().map(|t| format!("{} ({})", t.id, t.title));
        let ready = guard.ready_tasks();

        let mut text = match current {
            Some(c) => format!("current: {c}\n"),
            None => "current: none\n".to_string(),
        };
        text.push_str(&format!("ready ({}): {}", ready.len(), ready.join(", ")));
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// `task_comment` — append to a task's comment log. This is also how agents
/// emit the `BLOCKED:`/`REJECTED:`/`APPROVED:`/`SUMMARY:` protocol messages
/// the orchestrator routes on.
pub struct TaskCommentTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskCommentTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskCommentTool {
    fn name(&self) -> &str {
        "task_comment"
    }

    fn description(&self) -> &str {
        "Append a comment to a task. Use the BLOCKED:/REJECTED:/APPROVED:/SUMMARY: \
         prefixes to signal a routing decision to the orchestrator."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "string"},
                "content": {"type": "string"}
            },
            "required": ["id", "content"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let id = require_str(&params, "id")?;
        let content = require_str(&params, "content")?;
        lock(&self.scheduler).store_mut().add_comment(id, &ctx.agent_name, content)?;
        Ok(ToolOutput::text(format!("commented on {id}"), start.elapsed()))
    }
}

/// `task_export` — the full graph as JSON, for an agent that wants to reason
/// over task state directly instead of querying it piecemeal.
pub struct TaskExportTool {
    scheduler: Arc<Mutex<TaskScheduler>>,
}

impl TaskExportTool {
    pub fn new(scheduler: Arc<Mutex<TaskScheduler>>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for TaskExportTool {
    fn name(&self) -> &str {
        "task_export"
    }

    fn description(&self) -> &str {
        "Export the full task graph (tasks and dependencies) as JSON."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(
        &self,
        _params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let guard = lock(&self.scheduler);
        let tasks: Vec<_> = guard.store().all_tasks().collect();
        let deps: Vec<_> = guard.store().all_dependencies().collect();
        let payload = json!({"tasks": tasks, "dependencies": deps});
        let text = serde_json::to_string_pretty(&payload)
            .map_err(|e| ToolError::Internal(e.to_string()))?;
        Ok(ToolOutput::text(text, start.elapsed()))
    }
}

/// Register all six task tools against a shared scheduler handle.
pub fn register_all(registry: &mut super::ToolRegistry, scheduler: Arc<Mutex<TaskScheduler>>) {
    registry.register(Arc::new(TaskCreateTool::new(scheduler.clone())));
    registry.register(Arc::new(TaskListTool::new(scheduler.clone())));
    registry.register(Arc::new(TaskUpdateTool::new(scheduler.clone())));
    registry.register(Arc::new(TaskReadyTool::new(scheduler.clone())));
    registry.register(Arc::new(TaskCommentTool::new(scheduler.clone())));
    registry.register(Arc::new(TaskExportTool::new(scheduler)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext { agent_name: "tester".into() }
    }

    fn new_scheduler() -> Arc<Mutex<TaskScheduler>> {
        let mut sched = TaskScheduler::new();
        sched.start_session();
        Arc::new(Mutex::new(sched))
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let sched = new_scheduler();
        let create = TaskCreateTool::new(sched.clone());
        let out = create.execute(json!({"title": "write docs"}), &ctx()).await.unwrap();
        assert!(out.text.starts_with("created task "));

        let list = TaskListTool::new(sched);
        let out = list.execute(json!({}), &ctx()).await.unwrap();
        assert!(out.text.contains("write docs"));
    }

    #[tokio::test]
    async fn update_rejects_unknown_status() {
        let sched = new_scheduler();
        let id = sched
            .lock()
            .unwrap()
            .store_mut()
            .create_task(CreateTaskParams { title: "A".into(), ..Default::default() })
            .unwrap();
        let update = TaskUpdateTool::new(sched);
        let err = update.execute(json!({"id": id, "status": "nonsense"}), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
    }

    #[tokio::test]
    async fn comment_uses_caller_allowlist_identity() {
        let sched = new_scheduler();
        let id = sched
            .lock()
            .unwrap()
            .store_mut()
            .create_task(CreateTaskParams { title: "A".into(), ..Default::default() })
            .unwrap();
        let comment = TaskCommentTool::new(sched.clone());
        comment
            .execute(json!({"id": id, "content": "BLOCKED: waiting on review"}), &ctx())
            .await
            .unwrap();
        let guard = sched.lock().unwrap();
        let task = guard.store().get_task(&id).unwrap();
        assert_eq!(task.comments.len(), 1);
        assert_eq!(task.comments[0].agent, "tester");
    }

    #[tokio::test]
    async fn unknown_tool_is_permission_denied_when_not_allowlisted() {
        let sched = new_scheduler();
        let mut registry = super::super::ToolRegistry::new();
        register_all(&mut registry, sched);
        let call = crate::llm::ToolCall {
            id: "call_1".into(),
            name: "task_create".into(),
            arguments: json!({"title": "A"}),
        };
        let result = registry.execute_tool_call(&call, &["task_list".to_string()], &ctx()).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some("permission_denied"));
    }
}
