use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection refused, non-success status, or a drop mid-stream.
    #[error("Upstream error: {0}")]
    UpstreamError(String),

    /// Malformed record, invalid payload, missing text field, or buffer overflow.
    #[error("Framing error: {0}")]
    FramingError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RelayError {
    /// Convert into an I/O error so an HTTP body aborts instead of ending cleanly.
    pub fn into_io_error(self) -> std::io::Error {
        match self {
            RelayError::FramingError(msg) => {
                std::io::Error::new(std::io::ErrorKind::InvalidData, msg)
            }
            other => std::io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
