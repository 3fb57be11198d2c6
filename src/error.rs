//! Error types for worker operations

use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Error types for queueing, session management, and request processing
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or pixel processing errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Session initialization errors (model or processor handle acquisition)
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// The inference session is no longer usable and must be recreated
    #[error("Session invalid: {0}")]
    SessionInvalid(String),

    /// Errors in the decode/composite/encode pipeline
    #[error("Processing error: {0}")]
    Processing(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dequeue was attempted on an empty queue
    #[error("request queue is empty")]
    EmptyQueue,
}

impl WorkerError {
    /// Create a new initialization error
    pub fn initialization<S: Into<String>>(msg: S) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new session-invalid error
    pub fn session_invalid<S: Into<String>>(msg: S) -> Self {
        Self::SessionInvalid(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this failure invalidates the shared inference session.
    ///
    /// The typed `SessionInvalid` variant is the primary classification.
    /// Runtimes that only surface message strings are covered by a marker
    /// check on inference errors, matching the `"Session"` prefix that
    /// ONNX-style runtimes put in session teardown messages.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::SessionInvalid(_) => true,
            Self::Inference(msg) => msg.contains("Session"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = WorkerError::invalid_config("bad target size");
        assert!(matches!(err, WorkerError::InvalidConfig(_)));

        let err = WorkerError::initialization("download interrupted");
        assert!(matches!(err, WorkerError::Initialization(_)));
    }

    #[test]
    fn test_error_display() {
        let err = WorkerError::initialization("download interrupted");
        assert_eq!(
            err.to_string(),
            "Model initialization failed: download interrupted"
        );

        let err = WorkerError::session_invalid("session handle released");
        assert_eq!(err.to_string(), "Session invalid: session handle released");
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(WorkerError::session_invalid("handle released").is_session_fatal());

        // String fallback: only inference errors carrying the session marker
        assert!(WorkerError::inference("Session mismatch: run after free").is_session_fatal());
        assert!(!WorkerError::inference("tensor shape mismatch").is_session_fatal());

        // Other failures never tear down the session
        assert!(!WorkerError::processing("decode failed").is_session_fatal());
        assert!(!WorkerError::initialization("Session download failed").is_session_fatal());
        assert!(!WorkerError::EmptyQueue.is_session_fatal());
    }
}
