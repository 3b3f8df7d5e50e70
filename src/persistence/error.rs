/// Errors raised by the persistence layer (relational store, JSONL, session
/// snapshot, git sync).
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("invalid session state format: {0}")]
    InvalidFormat(String),
}
