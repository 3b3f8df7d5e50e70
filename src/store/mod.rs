//! In-memory task graph: the dependency DAG, cached ready queue, and the
//! append-only comment log that doubles as the inter-agent message bus.
//!
//! Grounded in the dependency/ready-queue/event-log shape of
//! `workspace/tasks.rs`, adapted from an async PostgreSQL repository to a
//! synchronous in-memory store — the relational/durable side of the same
//! model lives in [`crate::persistence`].

mod error;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use error::StoreError;

/// Opaque 8-hex-character task identifier.
pub type TaskId = String;

/// Epoch-seconds (de)serialization for `DateTime<Utc>`, matching the
/// `created_at:N` integer convention of the JSONL wire schema — the same
/// `unix_ts` convention `Session::new()` uses for its session id.
mod epoch {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        dt.timestamp().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Utc.timestamp_opt(secs, 0).single().ok_or_else(|| serde::de::Error::custom(format!("invalid epoch seconds {secs}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            dt.map(|dt| dt.timestamp()).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            let secs: Option<i64> = Option::deserialize(deserializer)?;
            secs.map(|secs| {
                Utc.timestamp_opt(secs, 0).single().ok_or_else(|| serde::de::Error::custom(format!("invalid epoch seconds {secs}")))
            })
            .transpose()
        }
    }
}

/// Task status lifecycle.
///
/// ```text
/// pending ⇄ blocked → (pending) → in_progress → completed
///                                             ↘ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Variant order is urgency order — `Critical` sorts first.
/// The discriminant is the wire rank used by the JSONL schema (`"priority":2`
/// for `medium`), not just an internal implementation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
    Wishlist = 4,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Wishlist => "wishlist",
        }
    }

    fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(Self::Critical),
            1 => Some(Self::High),
            2 => Some(Self::Medium),
            3 => Some(Self::Low),
            4 => Some(Self::Wishlist),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskPriority {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for TaskPriority {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rank = u8::deserialize(deserializer)?;
        Self::from_rank(rank).ok_or_else(|| serde::de::Error::custom(format!("invalid priority rank {rank}")))
    }
}

/// Task kind. `Molecule` is a non-executable epic container; `Wisp` is
/// ephemeral and excluded from persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Task,
    Bug,
    Feature,
    Research,
    Wisp,
    Molecule,
}

/// Dependency edge kind. Only `Blocks` participates in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Blocks,
    Parent,
    Related,
    Discovered,
}

/// One entry in a task's append-only comment log. Comment prefixes
/// (`BLOCKED:`, `REJECTED:`, `APPROVED:`, `SUMMARY:`) are the control
/// protocol the orchestrator reads to route between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub agent: String,
    pub content: String,
    #[serde(with = "epoch")]
    pub timestamp: DateTime<Utc>,
}

/// A task in the graph. `blocked_by_count` is derived from dependency edges
/// and is never transmitted on the wire — it is rebuilt by
/// [`TaskStore::insert_raw_dependency`] on import/restore, so it is excluded
/// from (de)serialization here rather than trusted from a stale snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub labels: Vec<String>,
    pub parent_id: Option<TaskId>,
    #[serde(skip_serializing, default)]
    pub blocked_by_count: u32,
    pub comments: Vec<Comment>,
    #[serde(with = "epoch")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "epoch")]
    pub updated_at: DateTime<Utc>,
    #[serde(with = "epoch::option", default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A directed dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub src: TaskId,
    pub dst: TaskId,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    pub weight: f64,
}

/// Parameters for [`TaskStore::create_task`].
#[derive(Debug, Clone, Default)]
pub struct CreateTaskParams {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub task_type: TaskType,
    pub labels: Vec<String>,
    pub parent_id: Option<TaskId>,
    /// Tasks that must complete before this one may run (`blocks` edges
    /// pointing *into* the new task).
    pub blocked_by: Vec<TaskId>,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Default for TaskType {
    fn default() -> Self {
        Self::Task
    }
}

/// Filter predicate for [`TaskStore::list_tasks`]. `None` fields match
/// anything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub label: Option<String>,
}

/// The outcome of completing a task: which dependents became unblocked.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub id: TaskId,
    pub unblocked: Vec<TaskId>,
}

/// In-memory dependency graph plus cached ready-queue.
///
/// Single-threaded by design (see the concurrency model): all mutation goes
/// through `&mut self`, callers serialize access with an outer mutex.
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    /// `src -> edges originating at src`.
    outgoing: HashMap<TaskId, Vec<Dependency>>,
    /// `dst -> edges terminating at dst`.
    incoming: HashMap<TaskId, Vec<Dependency>>,
    ready_cache: Option<Vec<TaskId>>,
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            ready_cache: None,
        }
    }

    fn invalidate_ready_cache(&mut self) {
        self.ready_cache = None;
    }

    /// Derives `sha256(title || timestamp_bytes)[0..4]` deterministically —
    /// no retry nonce. A collision is rejected rather than papered over, so
    /// callers that race on the same title within the same nanosecond see it.
    fn generate_id(&self, title: &str, now: DateTime<Utc>) -> Result<TaskId, StoreError> {
        let mut hasher = Sha256::new();
        hasher.update(title.as_bytes());
        hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        let digest = hasher.finalize();
        let id: TaskId = digest[..4].iter().map(|b| format!("{b:02x}")).collect();
        if self.tasks.contains_key(&id) {
            return Err(StoreError::TaskIdCollision(id));
        }
        Ok(id)
    }

    pub fn create_task(&mut self, params: CreateTaskParams) -> Result<TaskId, StoreError> {
        if params.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let now = Utc::now();
        let id = self.generate_id(&params.title, now)?;

        for src in &params.blocked_by {
            if !self.tasks.contains_key(src) {
                return Err(StoreError::SourceMissing(src.clone()));
            }
        }

        let mut task = Task {
            id: id.clone(),
            title: params.title,
            description: params.description,
            status: TaskStatus::Pending,
            priority: params.priority,
            task_type: params.task_type,
            labels: params.labels,
            parent_id: params.parent_id,
            blocked_by_count: 0,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.tasks.insert(id.clone(), task.clone());

        for src in params.blocked_by {
            // Edges to a brand new task can never cycle back to it.
            let dep = Dependency {
                src: src.clone(),
                dst: id.clone(),
                dep_type: DependencyType::Blocks,
                weight: 1.0,
            };
            self.outgoing.entry(src.clone()).or_default().push(dep.clone());
            self.incoming.entry(id.clone()).or_default().push(dep);
            if !self.tasks[&src].status.is_terminal() {
                task.blocked_by_count += 1;
            }
        }
        if task.blocked_by_count > 0 {
            task.status = TaskStatus::Blocked;
        }
        self.tasks.insert(id.clone(), task);

        self.invalidate_ready_cache();
        Ok(id)
    }

    fn edge_exists(&self, src: &str, dst: &str, dep_type: DependencyType) -> bool {
        self.outgoing
            .get(src)
            .map(|edges| edges.iter().any(|e| e.dst == dst && e.dep_type == dep_type))
            .unwrap_or(false)
    }

    /// DFS reachability check: is `target` reachable from `start` by
    /// following `blocks` edges forward?
    fn has_path(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start.to_string()];
        let mut seen: HashSet<TaskId> = HashSet::new();
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !seen.insert(node.clone()) {
                continue;
            }
            if let Some(edges) = self.outgoing.get(&node) {
                for e in edges {
                    if e.dep_type == DependencyType::Blocks {
                        stack.push(e.dst.clone());
                    }
                }
            }
        }
        false
    }

    /// Would adding `blocks(src, dst)` create a cycle in the blocking
    /// subgraph? True also when `src == dst`.
    pub fn would_create_cycle(&self, src: &str, dst: &str) -> bool {
        src == dst || self.has_path(dst, src)
    }

    pub fn add_dependency(
        &mut self,
        src: &str,
        dst: &str,
        dep_type: DependencyType,
    ) -> Result<(), StoreError> {
        if src == dst {
            return Err(StoreError::SelfDependency);
        }
        if !self.tasks.contains_key(src) {
            return Err(StoreError::SourceMissing(src.to_string()));
        }
        if !self.tasks.contains_key(dst) {
            return Err(StoreError::DestMissing(dst.to_string()));
        }
        if self.edge_exists(src, dst, dep_type) {
            return Err(StoreError::DuplicateEdge);
        }
        if dep_type == DependencyType::Blocks && self.has_path(dst, src) {
            return Err(StoreError::CircularDependency);
        }

        let dep = Dependency {
            src: src.to_string(),
            dst: dst.to_string(),
            dep_type,
            weight: 1.0,
        };
        self.outgoing.entry(src.to_string()).or_default().push(dep.clone());
        self.incoming.entry(dst.to_string()).or_default().push(dep);

        if dep_type == DependencyType::Blocks {
            let src_completed = self.tasks[src].status.is_terminal();
            if !src_completed {
                let dst_task = self.tasks.get_mut(dst).expect("checked above");
                dst_task.blocked_by_count += 1;
                if dst_task.status == TaskStatus::Pending {
                    dst_task.status = TaskStatus::Blocked;
                }
                dst_task.updated_at = Utc::now();
            }
        }
        self.invalidate_ready_cache();
        Ok(())
    }

    pub fn remove_dependency(
        &mut self,
        src: &str,
        dst: &str,
        dep_type: DependencyType,
    ) -> Result<(), StoreError> {
        let removed = self
            .outgoing
            .get_mut(src)
            .map(|edges| {
                let before = edges.len();
                edges.retain(|e| !(e.dst == dst && e.dep_type == dep_type));
                before != edges.len()
            })
            .unwrap_or(false);
        if !removed {
            return Err(StoreError::EdgeNotFound);
        }
        if let Some(edges) = self.incoming.get_mut(dst) {
            edges.retain(|e| !(e.src == src && e.dep_type == dep_type));
        }

        if dep_type == DependencyType::Blocks {
            if let Some(task) = self.tasks.get_mut(dst) {
                task.blocked_by_count = task.blocked_by_count.saturating_sub(1);
                if task.blocked_by_count == 0 && task.status == TaskStatus::Blocked {
                    task.status = TaskStatus::Pending;
                }
                task.updated_at = Utc::now();
            }
        }
        self.invalidate_ready_cache();
        Ok(())
    }

    pub fn complete_task(&mut self, id: &str) -> Result<CompletionOutcome, StoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        let now = Utc::now();
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        task.updated_at = now;

        let mut unblocked = Vec::new();
        let outgoing_blocks: Vec<Dependency> = self
            .outgoing
            .get(id)
            .map(|edges| edges.iter().filter(|e| e.dep_type == DependencyType::Blocks).cloned().collect())
            .unwrap_or_default();

        for edge in &outgoing_blocks {
            if let Some(dst_task) = self.tasks.get_mut(&edge.dst) {
                dst_task.blocked_by_count = dst_task.blocked_by_count.saturating_sub(1);
                if dst_task.blocked_by_count == 0 && dst_task.status == TaskStatus::Blocked {
                    dst_task.status = TaskStatus::Pending;
                    unblocked.push(edge.dst.clone());
                }
                dst_task.updated_at = now;
            }
        }

        if let Some(edges) = self.outgoing.get_mut(id) {
            edges.retain(|e| e.dep_type != DependencyType::Blocks);
        }
        for edge in &outgoing_blocks {
            if let Some(edges) = self.incoming.get_mut(&edge.dst) {
                edges.retain(|e| !(e.src == id && e.dep_type == DependencyType::Blocks));
            }
        }

        self.invalidate_ready_cache();
        Ok(CompletionOutcome { id: id.to_string(), unblocked })
    }

    pub fn update_status(&mut self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.status = status;
        task.updated_at = Utc::now();
        if status == TaskStatus::Completed {
            // Route through complete_task so cascade bookkeeping runs.
            drop(task);
            self.complete_task(id)?;
            return Ok(());
        }
        self.invalidate_ready_cache();
        Ok(())
    }

    pub fn update_priority(&mut self, id: &str, priority: TaskPriority) -> Result<(), StoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.priority = priority;
        task.updated_at = Utc::now();
        self.invalidate_ready_cache();
        Ok(())
    }

    pub fn update_title(&mut self, id: &str, title: String) -> Result<(), StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.title = title;
        task.updated_at = Utc::now();
        Ok(())
    }

    pub fn update_task_type(&mut self, id: &str, task_type: TaskType) -> Result<(), StoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        if task.task_type == TaskType::Wisp || task_type == TaskType::Wisp {
            return Err(StoreError::CannotChangeWispType);
        }
        task.task_type = task_type;
        task.updated_at = Utc::now();
        self.invalidate_ready_cache();
        Ok(())
    }

    pub fn add_comment(&mut self, id: &str, agent: &str, content: &str) -> Result<(), StoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.comments.push(Comment {
            agent: agent.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        task.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status == s))
            .filter(|t| filter.priority.is_none_or(|p| t.priority == p))
            .filter(|t| filter.task_type.is_none_or(|tt| t.task_type == tt))
            .filter(|t| {
                filter
                    .label
                    .as_ref()
                    .is_none_or(|l| t.labels.iter().any(|tl| tl == l))
            })
            .collect()
    }

    pub fn get_children(&self, parent: &str) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.parent_id.as_deref() == Some(parent)).collect()
    }

    pub fn get_siblings(&self, id: &str) -> Vec<&Task> {
        match self.tasks.get(id).and_then(|t| t.parent_id.clone()) {
            Some(parent) => self
                .tasks
                .values()
                .filter(|t| t.id != id && t.parent_id.as_deref() == Some(parent.as_str()))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn get_blocked_by(&self, id: &str) -> Vec<&Task> {
        self.incoming
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| e.dep_type == DependencyType::Blocks)
                    .filter_map(|e| self.tasks.get(&e.src))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_blocking(&self, id: &str) -> Vec<&Task> {
        self.outgoing
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| e.dep_type == DependencyType::Blocks)
                    .filter_map(|e| self.tasks.get(&e.dst))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ready tasks sorted ascending by priority then creation time. Rebuilds
    /// the cache on first access after any mutation.
    pub fn get_ready_tasks(&mut self) -> Vec<&Task> {
        if self.ready_cache.is_none() {
            let mut ids: Vec<TaskId> = self
                .tasks
                .values()
                .filter(|t| {
                    t.status == TaskStatus::Pending
                        && t.blocked_by_count == 0
                        && t.task_type != TaskType::Molecule
                })
                .map(|t| t.id.clone())
                .collect();
            ids.sort_by(|a, b| {
                let ta = &self.tasks[a];
                let tb = &self.tasks[b];
                ta.priority.cmp(&tb.priority).then(ta.created_at.cmp(&tb.created_at))
            });
            self.ready_cache = Some(ids);
        }
        self.ready_cache
            .as_ref()
            .expect("populated above")
            .iter()
            .map(|id| &self.tasks[id])
            .collect()
    }

    /// BFS over edges of `edge_type` (or all types if `None`), undirected,
    /// up to `max_depth` hops from `start`.
    pub fn traverse_dependencies(
        &self,
        start: &str,
        max_depth: usize,
        edge_type: Option<DependencyType>,
    ) -> Vec<&Task> {
        let mut visited: HashSet<TaskId> = HashSet::new();
        visited.insert(start.to_string());
        let mut frontier = vec![start.to_string()];
        let mut result = Vec::new();

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for node in &frontier {
                let neighbors = self
                    .outgoing
                    .get(node)
                    .into_iter()
                    .flatten()
                    .filter(|e| edge_type.is_none_or(|et| e.dep_type == et))
                    .map(|e| e.dst.clone())
                    .chain(
                        self.incoming
                            .get(node)
                            .into_iter()
                            .flatten()
                            .filter(|e| edge_type.is_none_or(|et| e.dep_type == et))
                            .map(|e| e.src.clone()),
                    );
                for n in neighbors {
                    if visited.insert(n.clone()) {
                        if let Some(t) = self.tasks.get(&n) {
                            result.push(t);
                        }
                        next.push(n);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        result
    }

    pub fn get_tasks_with_comment_prefix(&self, prefix: &str) -> Vec<&Task> {
        self.tasks
            .values()
            .filter(|t| t.comments.iter().any(|c| c.content.starts_with(prefix)))
            .collect()
    }

    /// Summary counts for a molecule's children, used by the orchestrator
    /// to decide whether an epic is fully resolved.
    pub fn get_epic_summary(&self, molecule_id: &str) -> EpicSummary {
        let children = self.get_children(molecule_id);
        let mut summary = EpicSummary::default();
        for child in children {
            summary.total += 1;
            match child.status {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Blocked => summary.blocked += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
                _ => summary.open += 1,
            }
        }
        summary
    }

    /// Tasks reachable from any root (no incoming `blocks` edge) at exactly
    /// `depth` hops along `blocks` edges.
    pub fn get_open_at_depth(&self, depth: usize) -> Vec<&Task> {
        let roots: Vec<TaskId> = self
            .tasks
            .values()
            .filter(|t| self.get_blocked_by(&t.id).is_empty())
            .map(|t| t.id.clone())
            .collect();
        let mut frontier = roots;
        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                if let Some(edges) = self.outgoing.get(node) {
                    for e in edges.iter().filter(|e| e.dep_type == DependencyType::Blocks) {
                        next.push(e.dst.clone());
                    }
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            frontier = next;
        }
        frontier
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| !t.status.is_terminal())
            .collect()
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn all_dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.outgoing.values().flatten()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Insert a task verbatim (used by import); `blocked_by_count` is reset
    /// to zero and `blocked` status dropped back to `pending` here, so both
    /// are rebuilt purely from the edges the caller adds afterwards via
    /// [`Self::insert_raw_dependency`]. Collision-tolerant: returns `false`
    /// without mutating if the id already exists.
    pub fn insert_raw(&mut self, mut task: Task) -> bool {
        if self.tasks.contains_key(&task.id) {
            return false;
        }
        task.blocked_by_count = 0;
        if task.status == TaskStatus::Blocked {
            task.status = TaskStatus::Pending;
        }
        self.tasks.insert(task.id.clone(), task);
        self.invalidate_ready_cache();
        true
    }

    /// Append a comment with a caller-supplied timestamp, bypassing
    /// `add_comment`'s `Utc::now()` stamp. Used when restoring from
    /// durable storage, where the original timestamp must be preserved.
    pub fn restore_comment(&mut self, id: &str, comment: Comment) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.comments.push(comment);
        }
    }

    /// Insert a dependency edge verbatim without invariant checks (used by
    /// import, which trusts a previously exported, already-valid graph) and
    /// recompute the destination's `blocked_by_count`.
    pub fn insert_raw_dependency(&mut self, dep: Dependency) {
        self.outgoing.entry(dep.src.clone()).or_default().push(dep.clone());
        self.incoming.entry(dep.dst.clone()).or_default().push(dep.clone());
        if dep.dep_type == DependencyType::Blocks {
            let src_terminal = self.tasks.get(&dep.src).map(|t| t.status.is_terminal()).unwrap_or(true);
            if !src_terminal {
                if let Some(dst_task) = self.tasks.get_mut(&dep.dst) {
                    dst_task.blocked_by_count += 1;
                    if dst_task.status == TaskStatus::Pending {
                        dst_task.status = TaskStatus::Blocked;
                    }
                }
            }
        }
        self.invalidate_ready_cache();
    }
}

/// Aggregate counts for a molecule's children, used to decide whether an
/// epic is fully resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpicSummary {
    pub total: usize,
    pub completed: usize,
    pub blocked: usize,
    pub cancelled: usize,
    pub open: usize,
}

impl EpicSummary {
    pub fn is_fully_resolved(&self) -> bool {
        self.total > 0 && self.completed + self.cancelled == self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &mut TaskStore, title: &str) -> TaskId {
        store
            .create_task(CreateTaskParams {
                title: title.to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn linear_chain_unblocks_in_order() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");
        let c = create(&mut store, "C");
        store.add_dependency(&a, &b, DependencyType::Blocks).unwrap();
        store.add_dependency(&b, &c, DependencyType::Blocks).unwrap();

        let ready: Vec<TaskId> = store.get_ready_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec![a.clone()]);

        let outcome = store.complete_task(&a).unwrap();
        assert_eq!(outcome.unblocked, vec![b.clone()]);
        let ready: Vec<TaskId> = store.get_ready_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec![b.clone()]);

        store.complete_task(&b).unwrap();
        let ready: Vec<TaskId> = store.get_ready_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec![c]);
    }

    #[test]
    fn cycle_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");
        store.add_dependency(&a, &b, DependencyType::Blocks).unwrap();
        let err = store.add_dependency(&b, &a, DependencyType::Blocks).unwrap_err();
        assert!(matches!(err, StoreError::CircularDependency));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let err = store.add_dependency(&a, &a, DependencyType::Blocks).unwrap_err();
        assert!(matches!(err, StoreError::SelfDependency));
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");
        store.add_dependency(&a, &b, DependencyType::Blocks).unwrap();
        let err = store.add_dependency(&a, &b, DependencyType::Blocks).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEdge));
    }

    #[test]
    fn blocked_by_count_matches_non_terminal_sources() {
        let mut store = TaskStore::new();
        let a = create(&mut store, "A");
        let b = create(&mut store, "B");
        store.add_dependency(&a, &b, DependencyType::Blocks).unwrap();
        assert_eq!(store.get_task(&b).unwrap().blocked_by_count, 1);
        assert_eq!(store.get_task(&b).unwrap().status, TaskStatus::Blocked);
        store.complete_task(&a).unwrap();
        assert_eq!(store.get_task(&b).unwrap().blocked_by_count, 0);
        assert_eq!(store.get_task(&b).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn ready_tasks_sorted_by_priority_then_creation() {
        let mut store = TaskStore::new();
        let low = store
            .create_task(CreateTaskParams {
                title: "low".into(),
                priority: TaskPriority::Low,
                ..Default::default()
            })
            .unwrap();
        let crit = store
            .create_task(CreateTaskParams {
                title: "crit".into(),
                priority: TaskPriority::Critical,
                ..Default::default()
            })
            .unwrap();
        let ready: Vec<TaskId> = store.get_ready_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec![crit, low]);
    }

    #[test]
    fn molecule_never_appears_ready() {
        let mut store = TaskStore::new();
        store
            .create_task(CreateTaskParams {
                title: "epic".into(),
                task_type: TaskType::Molecule,
                ..Default::default()
            })
            .unwrap();
        assert!(store.get_ready_tasks().is_empty());
    }

    #[test]
    fn wisp_type_cannot_change() {
        let mut store = TaskStore::new();
        let id = store
            .create_task(CreateTaskParams {
                title: "ephemeral".into(),
                task_type: TaskType::Wisp,
                ..Default::default()
            })
            .unwrap();
        let err = store.update_task_type(&id, TaskType::Task).unwrap_err();
        assert!(matches!(err, StoreError::CannotChangeWispType));
    }
}
