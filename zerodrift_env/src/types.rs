//! Common types for the ZeroDrift environment abstraction.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};

/// A named blob handed to an [`crate::ArtifactSink`].
///
/// The name is a bare file name (no directories); sinks decide where it lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File-style name, e.g. `proof_receipt_20240101T000000Z.json`
    pub name: String,

    /// Raw content
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Creates an artifact from raw bytes.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Serializes `value` as pretty JSON.
    pub fn json<T: Serialize>(name: impl Into<String>, value: &T) -> Result<Self, EnvError> {
        Ok(Self::new(name, serde_json::to_vec_pretty(value)?))
    }

    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Rejects names that would escape the sink's root.
    pub fn validate_name(&self) -> Result<(), EnvError> {
        let bad = self.name.is_empty()
            || self.name == "."
            || self.name == ".."
            || self.name.contains(['/', '\\']);
        if bad {
            return Err(EnvError::artifact(format!("invalid artifact name '{}'", self.name)));
        }
        Ok(())
    }
}
