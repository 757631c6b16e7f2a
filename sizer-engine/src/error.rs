//! Engine error types.

use thiserror::Error;

/// Errors raised while building the computation graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A derived node depends on itself, directly or transitively
    #[error("Dependency cycle through node: {node}")]
    Cycle {
        /// First node found on the cycle
        node: String,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
