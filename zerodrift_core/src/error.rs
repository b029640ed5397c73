//! Error types for the ZeroDrift deterministic core.

use thiserror::Error;

/// Errors surfaced by the deterministic core.
///
/// A replay that reproduces a different hash tip is *not* an error; it is
/// reported as [`crate::ReplayVerdict::Mismatch`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Fixed-point result does not fit the 64-bit Q32.32 storage.
    #[error("Arithmetic overflow in fixed-point {op}")]
    ArithmeticOverflow { op: &'static str },

    /// Fixed-point division with a zero denominator.
    #[error("Division by zero in fixed-point {op}")]
    DivisionByZero { op: &'static str },

    /// Configuration rejected before any step runs.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Requested digest is not available on this build/host.
    #[error("Hashing unavailable: {0}")]
    HashingUnavailable(String),
}

impl EngineError {
    /// Creates an overflow error for the named operation.
    pub fn overflow(op: &'static str) -> Self {
        Self::ArithmeticOverflow { op }
    }

    /// Creates an invalid-parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a hashing-unavailable error.
    pub fn hashing_unavailable(msg: impl Into<String>) -> Self {
        Self::HashingUnavailable(msg.into())
    }
}

/// Result alias used throughout the core.
pub type EngineResult<T> = Result<T, EngineError>;
