//! ZeroDrift Deterministic Session Driver
//!
//! This crate owns the live side of a run: a [`Session`] composes the pure
//! core (state, topology, integrator, drift monitor) with an
//! `EngineContext` for hashing and time, and exposes the read-only frame
//! view, exports and verification.
//!
//! # Core Principle: Replay Is the Proof
//!
//! Every live tip can be re-derived from `(config, topology history, step)`:
//! - **Time**: virtual clock in [`SimContext`], fixed epoch for timestamps
//! - **Topology**: every swap is recorded with the step it applies to
//! - **Randomness**: initial conditions from one 64-bit seed; sweeps derive
//!   further seeds through [`SeedSchedule`]
//!
//! # Usage
//!
//! ```ignore
//! use zerodrift_sim::{Session, SimContext};
//! use zerodrift_core::EngineConfig;
//!
//! let mut session = Session::new(EngineConfig::default(), SimContext::shared(1337))?;
//! session.advance_by(100)?;
//! let verdict = session.verify_live().await?;
//! assert!(verdict.is_verified());
//! ```

mod context;
mod exporter;
mod frame;
mod runner;
mod seeds;
mod session;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::{export_session, file_stamp, DirectorySink, ExportReceipt};
pub use frame::{tone_hz, BaselineReadout, FrameView, BASE_TONE_HZ, TONE_HZ_PER_DRIFT};
pub use runner::{segment_tolerance, ScenarioMetrics, ScenarioResult, ScenarioRunner, DEFAULT_STEPS};
pub use seeds::SeedSchedule;
pub use session::Session;
