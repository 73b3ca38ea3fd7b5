use thiserror::Error;

pub type DripResult<T> = Result<T, DripError>;

#[derive(Error, Debug)]
pub enum DripError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sequence store error: {0}")]
    Store(String),

    #[error("Profile lookup error: {0}")]
    Profile(String),

    #[error("Template rendering error: {0}")]
    Template(String),

    #[error("Notifier error: {0}")]
    Notify(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
