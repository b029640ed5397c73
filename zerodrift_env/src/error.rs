//! Error types for the ZeroDrift environment abstraction.

use thiserror::Error;
use zerodrift_core::EngineError;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Digest task failed or was cancelled
    #[error("Digest error: {0}")]
    DigestError(String),

    /// Artifact could not be emitted
    #[error("Artifact error: {0}")]
    ArtifactError(String),

    /// Record serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),

    /// Error from the deterministic core
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl EnvError {
    /// Creates a digest error.
    pub fn digest(msg: impl Into<String>) -> Self {
        Self::DigestError(msg.into())
    }

    /// Creates an artifact error.
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::ArtifactError(msg.into())
    }
}

impl From<serde_json::Error> for EnvError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
