//! Artifact emission abstraction.

use crate::error::EnvError;
use crate::types::Artifact;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Destination for exported records.
///
/// # Implementations
///
/// - **CLI**: `DirectorySink` - one file per artifact
/// - **Tests**: [`MemorySink`] - keeps artifacts in memory
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Emits a named artifact.
    ///
    /// # Returns
    /// * `Ok(location)` - where the artifact ended up (path, key, ...)
    /// * `Err(EnvError::ArtifactError)` - the artifact was not stored
    async fn emit(&self, artifact: Artifact) -> Result<String, EnvError>;
}

/// In-memory sink.
#[derive(Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, in emission order.
    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.lock().await.clone()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn emit(&self, artifact: Artifact) -> Result<String, EnvError> {
        artifact.validate_name()?;
        let location = format!("memory:{}", artifact.name);
        self.artifacts.lock().await.push(artifact);
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(Artifact::new("a.json", b"1".to_vec())).await.unwrap();
        let location = sink.emit(Artifact::new("b.json", b"2".to_vec())).await.unwrap();
        assert_eq!(location, "memory:b.json");

        let names: Vec<String> = sink.artifacts().await.into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_memory_sink_rejects_paths() {
        let sink = MemorySink::new();
        assert!(sink.emit(Artifact::new("x/y.json", vec![])).await.is_err());
        assert!(sink.artifacts().await.is_empty());
    }
}
