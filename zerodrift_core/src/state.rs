//! Per-node position and momentum arrays.

use crate::error::{EngineError, EngineResult};
use crate::fixed::Fx;
use crate::rng::Xorshift64;
use serde::{Deserialize, Serialize};

/// Default width of the initial displacement and momentum band.
pub const DEFAULT_SPAN: f64 = 0.25;

/// Fixed-point simulation state.
///
/// Created only by [`SimulationState::init`] and mutated only by the
/// integrator. A rewind replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationState {
    pub(crate) x: Vec<Fx>,
    pub(crate) p: Vec<Fx>,
    /// Per-node mass. Uniform today, kept per node for heterogeneous lattices.
    pub(crate) mass: Vec<Fx>,
}

impl SimulationState {
    /// Allocates `nodes` nodes and fills them from the seeded stream.
    ///
    /// For each node in index order, one draw yields `x[i]` and the next
    /// yields `p[i]`, both uniform in `[-span/2, span/2)`.
    pub fn init(nodes: usize, seed: u64, span: f64, mass: Fx) -> EngineResult<Self> {
        if nodes == 0 {
            return Err(EngineError::invalid("node count must be positive"));
        }
        if !span.is_finite() || span < 0.0 {
            return Err(EngineError::invalid(format!(
                "span must be finite and non-negative, got {}",
                span
            )));
        }
        if !mass.is_positive() {
            return Err(EngineError::invalid(format!("mass must be positive, got {}", mass)));
        }

        let mut rng = Xorshift64::new(seed);
        let mut x = Vec::with_capacity(nodes);
        let mut p = Vec::with_capacity(nodes);
        for _ in 0..nodes {
            x.push(rng.centered_fx(span)?);
            p.push(rng.centered_fx(span)?);
        }

        Ok(Self {
            x,
            p,
            mass: vec![mass; nodes],
        })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn positions(&self) -> &[Fx] {
        &self.x
    }

    pub fn momenta(&self) -> &[Fx] {
        &self.p
    }

    pub fn masses(&self) -> &[Fx] {
        &self.mass
    }

    /// Positions converted for display.
    pub fn positions_f64(&self) -> Vec<f64> {
        self.x.iter().map(|v| v.to_f64()).collect()
    }

    /// Momenta converted for display.
    pub fn momenta_f64(&self) -> Vec<f64> {
        self.p.iter().map(|v| v.to_f64()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_known_values() {
        let state = SimulationState::init(64, 1337, DEFAULT_SPAN, Fx::ONE).unwrap();
        assert_eq!(state.len(), 64);
        assert_eq!(
            state.positions()[..3].iter().map(|v| v.raw()).collect::<Vec<_>>(),
            vec![361_765_596, -328_113_502, -84_860_458]
        );
        // x and p draws interleave per node
        assert_eq!(
            state.momenta()[..3].iter().map(|v| v.raw()).collect::<Vec<_>>(),
            vec![-15_428_135, -389_386_025, 178_091_541]
        );
    }

    #[test]
    fn test_init_is_deterministic() {
        let a = SimulationState::init(32, 42, DEFAULT_SPAN, Fx::ONE).unwrap();
        let b = SimulationState::init(32, 42, DEFAULT_SPAN, Fx::ONE).unwrap();
        assert_eq!(a, b);

        let c = SimulationState::init(32, 43, DEFAULT_SPAN, Fx::ONE).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_values_within_span() {
        let state = SimulationState::init(500, 7, 0.5, Fx::ONE).unwrap();
        for v in state.positions().iter().chain(state.momenta()) {
            let f = v.to_f64();
            assert!((-0.25..0.25).contains(&f));
        }
    }

    #[test]
    fn test_init_rejects_bad_parameters() {
        assert!(SimulationState::init(0, 1, DEFAULT_SPAN, Fx::ONE).is_err());
        assert!(SimulationState::init(4, 1, f64::NAN, Fx::ONE).is_err());
        assert!(SimulationState::init(4, 1, -1.0, Fx::ONE).is_err());
        assert!(matches!(
            SimulationState::init(4, 1, DEFAULT_SPAN, Fx::ZERO),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_span_starts_at_rest() {
        let state = SimulationState::init(8, 1, 0.0, Fx::ONE).unwrap();
        assert!(state.positions().iter().all(|v| *v == Fx::ZERO));
        assert!(state.momenta().iter().all(|v| *v == Fx::ZERO));
    }
}
