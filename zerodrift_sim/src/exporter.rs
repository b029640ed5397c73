//! JSON export of proof receipts and replay manifests.
//!
//! Writes, per export, `proof_receipt_<stamp>.json` (the flat record) and
//! `replay_manifest_<stamp>.json` (what `--verify` consumes).

use crate::session::Session;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;
use zerodrift_env::{Artifact, ArtifactSink, EngineContext, EnvError};

/// Sink that writes each artifact as a file under one directory.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Creates the sink. The directory is created on first emit.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn emit(&self, artifact: Artifact) -> Result<String, EnvError> {
        artifact.validate_name()?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| EnvError::artifact(format!("{}: {}", self.root.display(), e)))?;
        let path = self.root.join(&artifact.name);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .map_err(|e| EnvError::artifact(format!("{}: {}", path.display(), e)))?;
        Ok(path.display().to_string())
    }
}

/// `2024-01-01T00:01:30Z` -> `20240101T000130Z`, safe in file names.
pub fn file_stamp(time: SystemTime) -> String {
    humantime::format_rfc3339_seconds(time)
        .to_string()
        .chars()
        .filter(|c| *c != '-' && *c != ':')
        .collect()
}

/// Locations of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub proof_receipt: String,
    pub replay_manifest: String,
}

/// Emits the proof record and replay manifest for the session's current step.
pub async fn export_session<C: EngineContext>(
    session: &mut Session<C>,
    sink: &dyn ArtifactSink,
) -> Result<ExportReceipt, EnvError> {
    let stamp = file_stamp(session.context().system_time());
    let record = session.proof_record().await?;
    let manifest = session.replay_manifest().await?;

    let proof_receipt = sink
        .emit(Artifact::json(format!("proof_receipt_{}.json", stamp), &record)?)
        .await?;
    let replay_manifest = sink
        .emit(Artifact::json(format!("replay_manifest_{}.json", stamp), &manifest)?)
        .await?;

    info!(
        "Exported step {} (tip {}) to {} and {}",
        record.step,
        record.hash_tip.short(),
        proof_receipt,
        replay_manifest
    );
    Ok(ExportReceipt {
        proof_receipt,
        replay_manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use std::time::{Duration, UNIX_EPOCH};
    use zerodrift_core::{EngineConfig, ReplayManifest};
    use zerodrift_env::MemorySink;

    #[test]
    fn test_file_stamp() {
        let time = UNIX_EPOCH + Duration::from_secs(1704067200 + 90);
        assert_eq!(file_stamp(time), "20240101T000130Z");
    }

    #[tokio::test]
    async fn test_export_to_memory() {
        let mut session = Session::new(EngineConfig::default(), SimContext::shared(1337)).unwrap();
        session.advance_by(100).unwrap();
        let sink = MemorySink::new();

        let receipt = export_session(&mut session, &sink).await.unwrap();
        assert_eq!(receipt.proof_receipt, "memory:proof_receipt_20240101T000000Z.json");

        let artifacts = sink.artifacts().await;
        assert_eq!(artifacts.len(), 2);
        let record: serde_json::Value = serde_json::from_slice(&artifacts[0].bytes).unwrap();
        assert_eq!(record["step"], 100);
        assert_eq!(record["N"], 64);
    }

    #[tokio::test]
    async fn test_export_to_directory_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("proofs"));
        let mut session = Session::new(EngineConfig::default().with_nodes(16), SimContext::shared(1)).unwrap();
        session.advance_by(10).unwrap();
        session.swap_topology().unwrap();
        session.advance_by(10).unwrap();

        let receipt = export_session(&mut session, &sink).await.unwrap();
        assert!(receipt.replay_manifest.ends_with("replay_manifest_20240101T000000Z.json"));

        let json = std::fs::read_to_string(&receipt.replay_manifest).unwrap();
        let manifest = ReplayManifest::from_json(&json).unwrap();
        assert_eq!(manifest.schedule.swaps().len(), 1);
        assert!(manifest.verify().unwrap().is_verified());
    }

    #[tokio::test]
    async fn test_directory_sink_rejects_escaping_names() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        let result = sink.emit(Artifact::new("../evil.json", vec![])).await;
        assert!(matches!(result, Err(EnvError::ArtifactError(_))));
    }
}
