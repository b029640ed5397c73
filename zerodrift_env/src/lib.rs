//! ZeroDrift Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" boundary of the engine. The core is a
//! pure function of its inputs; everything that touches the outside world
//! goes through here:
//! - Time (`now()`, `system_time()`) for stamping exported records
//! - Hashing (`digest()`), the single async suspension point of a session
//! - Artifacts (`ArtifactSink::emit()`) for proof and replay records
//!
//! # Example
//!
//! ```ignore
//! use zerodrift_env::{EngineContext, TokioContext};
//! use zerodrift_core::{HashAlgorithm, Snapshot};
//!
//! async fn tip<Ctx: EngineContext>(ctx: &Ctx, step: u64, state: &SimulationState) {
//!     let snapshot = Snapshot::capture(step, state);
//!     let tip = ctx.digest(HashAlgorithm::Sha256, snapshot).await?;
//! }
//! ```

mod context;
mod error;
mod sink;
mod tokio_impl;
mod types;

pub use context::EngineContext;
pub use error::EnvError;
pub use sink::{ArtifactSink, MemorySink};
pub use tokio_impl::TokioContext;
pub use types::Artifact;
