//! ZeroDrift Core - Deterministic Symplectic Lattice Engine
//!
//! A 1-D mass-spring lattice integrated in Q32.32 fixed point so that a run
//! is a pure function of `(seed, N, topology history, step)`:
//! 1. **Bit-identical replay**: integer-only state, canonical edge order, no floats on the hot path
//! 2. **Bounded energy error**: velocity-Verlet keeps `H` oscillating instead of drifting
//! 3. **Verifiable commitments**: hash tips over a fixed snapshot layout, recomputable from the seed
//!
//! The core performs no I/O and reads no clock; hashing for live runs and
//! artifact emission are provided by `zerodrift_env`.

pub mod baseline;
pub mod config;
pub mod error;
pub mod fixed;
pub mod hamiltonian;
pub mod integrator;
pub mod proof;
pub mod replay;
pub mod rng;
pub mod state;
pub mod topology;

// Re-export key types for convenience
pub use baseline::{BaselineState, ExplicitEuler};
pub use config::{EngineConfig, DEFAULT_ENERGY_TOLERANCE};
pub use error::{EngineError, EngineResult};
pub use fixed::Fx;
pub use hamiltonian::{DriftMonitor, Energy};
pub use integrator::VelocityVerlet;
pub use proof::{ProofRecord, ReplayManifest};
pub use replay::{
    check_replay, digest, replay_to, snapshot, verify_replay, HashAlgorithm, HashTip, ReplayVerdict,
    Snapshot, SNAPSHOT_LEN,
};
pub use rng::Xorshift64;
pub use state::SimulationState;
pub use topology::{Edge, Topology, TopologyMode, TopologySchedule, TopologySwap};
