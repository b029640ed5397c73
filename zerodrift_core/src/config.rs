//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::fixed::Fx;
use crate::replay::HashAlgorithm;
use crate::state::DEFAULT_SPAN;
use crate::topology::TopologyMode;
use serde::{Deserialize, Serialize};

/// Default `|dH|` tolerance for dt = 1/60.
///
/// Velocity Verlet keeps energy in a band of width O(dt^2), roughly
/// `1e-4 * H` at this step size; fixed-point rounding sits far below it.
pub const DEFAULT_ENERGY_TOLERANCE: f64 = 1e-4;

/// Everything the core needs to start (and later replay) a run.
///
/// Fixed-point fields serialize as their raw Q32.32 integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of nodes (N)
    pub nodes: usize,

    /// Master seed for the initial conditions
    pub seed: u64,

    /// Time step, exact fixed point
    pub dt: Fx,

    /// Topology at step 0
    pub mode: TopologyMode,

    /// Width of the initial displacement/momentum band
    pub span: f64,

    /// Mass shared by all nodes
    pub mass: Fx,

    /// Spring constant shared by all edges
    pub stiffness: Fx,

    /// Digest used for hash tips
    pub hash: HashAlgorithm,

    /// Allowed `|dH|` within a topology segment
    pub energy_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nodes: 64,
            seed: 1337,
            dt: Fx::DT,
            mode: TopologyMode::Chain,
            span: DEFAULT_SPAN,
            mass: Fx::ONE,
            stiffness: Fx::ONE,
            hash: HashAlgorithm::Sha256,
            energy_tolerance: DEFAULT_ENERGY_TOLERANCE,
        }
    }
}

impl EngineConfig {
    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mode(mut self, mode: TopologyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dt(mut self, dt: Fx) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_span(mut self, span: f64) -> Self {
        self.span = span;
        self
    }

    pub fn with_mass(mut self, mass: Fx) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_stiffness(mut self, stiffness: Fx) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_energy_tolerance(mut self, tolerance: f64) -> Self {
        self.energy_tolerance = tolerance;
        self
    }

    /// Rejects every parameter that would otherwise fail (or divide by
    /// zero) at step time.
    pub fn validate(&self) -> EngineResult<()> {
        if self.nodes == 0 {
            return Err(EngineError::invalid("nodes must be positive"));
        }
        if !self.dt.is_positive() {
            return Err(EngineError::invalid(format!("dt must be positive, got {}", self.dt)));
        }
        if !self.span.is_finite() || self.span < 0.0 {
            return Err(EngineError::invalid(format!(
                "span must be finite and non-negative, got {}",
                self.span
            )));
        }
        Fx::from_f64(self.span / 2.0)
            .map_err(|_| EngineError::invalid(format!("span {} is not representable", self.span)))?;
        if !self.mass.is_positive() {
            return Err(EngineError::invalid(format!("mass must be positive, got {}", self.mass)));
        }
        if !self.stiffness.is_positive() {
            return Err(EngineError::invalid(format!(
                "stiffness must be positive, got {}",
                self.stiffness
            )));
        }
        if !self.energy_tolerance.is_finite() || self.energy_tolerance <= 0.0 {
            return Err(EngineError::invalid(format!(
                "energy tolerance must be positive, got {}",
                self.energy_tolerance
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::invalid(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
