//! Crate-level error type the CLI boundary reports to the user. Subsystem
//! errors compose in via `#[from]`, matching the teacher's per-module
//! `thiserror` enums feeding a single top-level error at the binary edge.

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Scheduler(#[from] crate::scheduler::SchedulerError),

    #[error(transparent)]
    Persist(#[from] crate::persistence::PersistError),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),

    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("agent '{0}' is not registered")]
    UnknownAgent(String),

    #[error("an agent is already running")]
    AgentThreadAlreadyRunning,
}

pub type AppResult<T> = Result<T, AppError>;
