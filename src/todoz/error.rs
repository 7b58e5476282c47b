use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TodozError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Record has been destroyed")]
    Destroyed,

    #[error("Api Error: {0}")]
    Api(String),
}

impl TodozError {
    /// Whether this error came from the persistence layer (as opposed to
    /// validation or caller misuse).
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            TodozError::NotFound(_)
                | TodozError::Io(_)
                | TodozError::Serialization(_)
                | TodozError::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TodozError>;
