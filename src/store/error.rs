use super::TaskId;

/// Errors raised by [`super::TaskStore`] operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task title cannot be empty")]
    EmptyTitle,

    #[error("dependency source task not found: {0}")]
    SourceMissing(TaskId),

    #[error("dependency destination task not found: {0}")]
    DestMissing(TaskId),

    #[error("a task cannot depend on itself")]
    SelfDependency,

    #[error("dependency edge already exists")]
    DuplicateEdge,

    #[error("dependency edge not found")]
    EdgeNotFound,

    #[error("adding this dependency would create a cycle")]
    CircularDependency,

    #[error("wisp tasks cannot change type")]
    CannotChangeWispType,

    #[error("generated task id {0} collides with an existing task")]
    TaskIdCollision(TaskId),
}
