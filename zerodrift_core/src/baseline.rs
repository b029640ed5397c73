//! Floating-point drift reference.
//!
//! A deliberately naive explicit-Euler stepper in `f64`. It shares only the
//! initial conditions (converted once via `to_f64`) and the edge list with
//! the fixed-point path, never storage or arithmetic, and exists to show
//! how a non-symplectic scheme gains energy over time.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::state::SimulationState;
use crate::topology::Topology;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Float mirror of a lattice. Not interchangeable with [`SimulationState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    xf: DVector<f64>,
    pf: DVector<f64>,
}

impl BaselineState {
    /// Copies the initial conditions out of a fixed-point state.
    pub fn from_initial(state: &SimulationState) -> Self {
        Self {
            xf: DVector::from_vec(state.positions_f64()),
            pf: DVector::from_vec(state.momenta_f64()),
        }
    }

    pub fn len(&self) -> usize {
        self.xf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xf.is_empty()
    }

    pub fn positions(&self) -> &DVector<f64> {
        &self.xf
    }

    pub fn momenta(&self) -> &DVector<f64> {
        &self.pf
    }
}

/// Forward Euler: `x += dt * p_old / m`, `p += dt * F(x_old)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplicitEuler {
    dt: f64,
    mass: f64,
    stiffness: f64,
}

impl ExplicitEuler {
    pub fn new(dt: f64, mass: f64, stiffness: f64) -> EngineResult<Self> {
        for (name, v) in [("dt", dt), ("mass", mass), ("stiffness", stiffness)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "baseline {} must be positive, got {}",
                    name, v
                )));
            }
        }
        Ok(Self { dt, mass, stiffness })
    }

    /// Same physical parameters as the fixed-point run, as floats.
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(config.dt.to_f64(), config.mass.to_f64(), config.stiffness.to_f64())
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    fn forces(&self, xf: &DVector<f64>, topology: &Topology) -> DVector<f64> {
        let mut f = DVector::zeros(xf.len());
        for edge in topology.edges() {
            let dx = xf[edge.a()] - xf[edge.b()];
            let f_ab = -self.stiffness * dx;
            f[edge.a()] += f_ab;
            f[edge.b()] -= f_ab;
        }
        f
    }

    /// Advances the baseline by one tick.
    ///
    /// Explicit Euler: the drift uses the pre-kick momentum. Drifting with the
    /// updated momentum is semi-implicit (symplectic) Euler and stays bounded.
    pub fn step(&self, state: &mut BaselineState, topology: &Topology) -> EngineResult<()> {
        if state.len() != topology.node_count() {
            return Err(EngineError::invalid(format!(
                "baseline has {} nodes but topology was built for {}",
                state.len(),
                topology.node_count()
            )));
        }
        let f = self.forces(&state.xf, topology);
        let drift = state.pf.map(|p| self.dt * (p / self.mass));
        state.pf.axpy(self.dt, &f, 1.0);
        state.xf += drift;
        Ok(())
    }

    /// `K + P` with `K = sum p^2 / 2m` and `P = sum k dx^2 / 2`.
    pub fn energy(&self, state: &BaselineState, topology: &Topology) -> f64 {
        let kinetic: f64 = state.pf.iter().map(|p| p * p / (2.0 * self.mass)).sum();
        let potential: f64 = topology
            .edges()
            .iter()
            .map(|e| {
                let dx = state.xf[e.a()] - state.xf[e.b()];
                self.stiffness * dx * dx / 2.0
            })
            .sum();
        kinetic + potential
    }
}
