/// Errors a tool call can fail with, surfaced to the model as a named
/// `error_kind` it can act on (retry with different arguments, give up,
/// report back to the user).
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<crate::store::StoreError> for ToolError {
    fn from(e: crate::store::StoreError) -> Self {
        use crate::store::StoreError as S;
        match e {
            S::TaskNotFound(id) => ToolError::NotFound(id),
            S::TaskIdCollision(_) => ToolError::Internal(e.to_string()),
            S::EmptyTitle
            | S::SourceMissing(_)
            | S::DestMissing(_)
            | S::SelfDependency
            | S::DuplicateEdge
            | S::EdgeNotFound
            | S::CircularDependency
            | S::CannotChangeWispType => ToolError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<crate::scheduler::SchedulerError> for ToolError {
    fn from(e: crate::scheduler::SchedulerError) -> Self {
        use crate::scheduler::SchedulerError as S;
        match e {
            S::Store(inner) => inner.into(),
            S::TaskNotFound(id) => ToolError::NotFound(id),
            S::CannotSetMoleculeAsCurrent | S::TaskNotStartable(_) | S::NoActiveSession => {
                ToolError::InvalidArgument(e.to_string())
            }
        }
    }
}
