use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("no structured log found for session {0}")]
    LogNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    pub fn code(&self) -> &'static str {
        match self {
            WatchError::LogNotFound(_) => "LOG_NOT_FOUND",
            WatchError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
