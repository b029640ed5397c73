//! Core environment context trait for ZeroDrift sessions.

use crate::error::EnvError;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use zerodrift_core::{HashAlgorithm, HashTip, Snapshot};

/// The central interface for environment interaction.
///
/// Abstracts everything a session needs from the outside world so the same
/// driver runs in production (tokio) and in deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - system clock, digest on the blocking pool
/// - **Simulation**: `SimContext` - virtual clock, inline digest
#[async_trait]
pub trait EngineContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp exported records.
    ///
    /// In simulation this is a fixed epoch plus the virtual clock.
    fn system_time(&self) -> SystemTime;

    /// Hashes a captured snapshot.
    ///
    /// This is the only suspension point of a session. The snapshot is
    /// owned, so the digest always covers the state at capture time.
    async fn digest(&self, algorithm: HashAlgorithm, snapshot: Snapshot) -> Result<HashTip, EnvError>;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
