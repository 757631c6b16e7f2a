//! Application error types.

use sizer_domain::DomainError;
use sizer_engine::EngineError;
use sizer_store::StoreError;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unrecognised console input
    #[error("Invalid command: {0}")]
    Command(String),

    /// Output could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;
