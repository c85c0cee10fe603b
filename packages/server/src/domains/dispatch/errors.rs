use thiserror::Error;

/// Errors surfaced at the dispatch boundary (change-event intake)
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Unknown request collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid change event: {0}")]
    InvalidEvent(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
