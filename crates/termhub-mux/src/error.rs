use thiserror::Error;

/// All errors that can originate from the Multiplexer Gateway.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The native multiplexer already has a session with this name.
    #[error("session already exists: {0}")]
    AlreadyExists(String),

    /// The requested session or pane does not exist in the multiplexer.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The multiplexer binary could not be spawned, or returned an
    /// unexpected failure. No retries are attempted by this crate.
    #[error("multiplexer backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Underlying I/O failure driving the subprocess.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MuxError {
    pub fn code(&self) -> &'static str {
        match self {
            MuxError::AlreadyExists(_) => "ALREADY_EXISTS",
            MuxError::NotFound(_) => "NOT_FOUND",
            MuxError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            MuxError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MuxError>;
