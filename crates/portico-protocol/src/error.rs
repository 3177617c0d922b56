use thiserror::Error;

/// Errors raised while framing bridge messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame exceeded the configured maximum size.
    #[error("Frame too large: {size} bytes (max {max_size})")]
    FrameTooLarge { size: usize, max_size: usize },

    /// A frame was not a valid message.
    #[error("Invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying transport failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
