// Error types for orchestration

use thiserror::Error;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Orchestration errors
///
/// Planning never surfaces these and step failures are recorded in the step
/// log, so an `AgentError` reaching the caller means the request as a whole
/// failed.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model error
    #[error("Model error: {0}")]
    Model(#[from] conduit_abstraction::ModelError),

    /// Content extraction failed
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Conversation history could not be read or written
    #[error("History error: {0}")]
    History(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised by content extraction collaborators.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be parsed.
    #[error("Failed to parse {kind}: {reason}")]
    Unreadable {
        /// What was being read ("PDF", "image", ...).
        kind: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The backing model call failed.
    #[error(transparent)]
    Model(#[from] conduit_abstraction::ModelError),

    /// Transient storage could not be prepared.
    #[error("Transient file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
