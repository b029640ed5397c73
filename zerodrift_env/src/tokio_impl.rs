//! Production implementation of EngineContext using Tokio.

use crate::error::EnvError;
use crate::EngineContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use zerodrift_core::{digest, HashAlgorithm, HashTip, Snapshot};

/// Production context backed by Tokio and the system clock.
///
/// Digests run on the blocking pool so a long hash never stalls the
/// runtime's worker threads.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn digest(&self, algorithm: HashAlgorithm, snapshot: Snapshot) -> Result<HashTip, EnvError> {
        tokio::task::spawn_blocking(move || digest(algorithm, &snapshot))
            .await
            .map_err(|e| EnvError::digest(format!("digest task failed: {}", e)))
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerodrift_core::{Fx, SimulationState};

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_digest_matches_core() {
        let ctx = TokioContext::new();
        let state = SimulationState::init(64, 1337, 0.25, Fx::ONE).unwrap();
        let snap = Snapshot::capture(0, &state);

        let tip = ctx.digest(HashAlgorithm::Sha256, snap.clone()).await.unwrap();
        assert_eq!(tip, digest(HashAlgorithm::Sha256, &snap));
        assert_eq!(
            tip.as_str(),
            "e3f70b87a10ad55d3a06383a4730d46c0733928bd36e45866e6da5930f7b3712"
        );
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
