//! Error types for the voice engine.

/// Top-level error type for the assistant interaction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Speech capture / recognition stream error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Intent classification error.
    #[error("classification error: {0}")]
    Classification(String),

    /// Action dispatch error.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Speech synthesis or playback error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Remote collaborator HTTP error.
    #[error("remote error: {0}")]
    Remote(#[from] reqwest::Error),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Session orchestration error.
    #[error("session error: {0}")]
    Session(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, EngineError>;
