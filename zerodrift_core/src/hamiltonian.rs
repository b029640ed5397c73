//! The conserved energy functional.
//!
//! `H = sum_i p_i^2 / (2 m_i) + sum_(a,b) k_ab (x_a - x_b)^2 / 2`
//!
//! Evaluated entirely in Q32.32 and summed in canonical edge order, so the
//! raw value is bit-reproducible and `dH = H(t) - H(0)` is exact.

use crate::error::EngineResult;
use crate::fixed::Fx;
use crate::state::SimulationState;
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

/// Kinetic and potential parts of `H`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Energy {
    pub kinetic: Fx,
    pub potential: Fx,
}

impl Energy {
    /// `kinetic + potential`.
    pub fn total(&self) -> EngineResult<Fx> {
        self.kinetic.checked_add(self.potential)
    }
}

/// Evaluates both energy terms.
pub fn evaluate_parts(state: &SimulationState, topology: &Topology) -> EngineResult<Energy> {
    let mut kinetic = Fx::ZERO;
    for (&p, &m) in state.p.iter().zip(&state.mass) {
        let two_m = m.checked_add(m)?;
        kinetic = kinetic.checked_add(p.checked_mul(p)?.checked_div(two_m)?)?;
    }

    let mut potential = Fx::ZERO;
    for (edge, k) in topology.springs() {
        let dx = state.x[edge.a()].checked_sub(state.x[edge.b()])?;
        let dx2 = dx.checked_mul(dx)?;
        potential = potential.checked_add(k.checked_mul(dx2)?.checked_div(Fx::TWO)?)?;
    }

    Ok(Energy { kinetic, potential })
}

/// Evaluates `H` as a raw fixed-point value.
pub fn evaluate(state: &SimulationState, topology: &Topology) -> EngineResult<Fx> {
    evaluate_parts(state, topology)?.total()
}

/// Tracks exact energy drift over a run.
///
/// Keeps `H0` from step 0 and a segment baseline that is rebased whenever
/// the topology changes. The energy bound holds per segment: a swap changes
/// the potential term instantaneously, so drift across a swap is not
/// meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftMonitor {
    h0: Fx,
    segment_h0: Fx,
    current: Fx,
    max_abs_segment_delta: Fx,
    segments: u32,
}

impl DriftMonitor {
    /// Starts monitoring from the step-0 energy.
    pub fn new(h0: Fx) -> Self {
        Self {
            h0,
            segment_h0: h0,
            current: h0,
            max_abs_segment_delta: Fx::ZERO,
            segments: 1,
        }
    }

    /// Records the energy after a step and returns `dH` against the segment baseline.
    pub fn observe(&mut self, h: Fx) -> EngineResult<Fx> {
        self.current = h;
        let delta = h.checked_sub(self.segment_h0)?;
        let magnitude = delta.checked_abs()?;
        if magnitude > self.max_abs_segment_delta {
            self.max_abs_segment_delta = magnitude;
        }
        Ok(delta)
    }

    /// Starts a new segment at energy `h` (called after a topology swap).
    pub fn rebase(&mut self, h: Fx) {
        self.segment_h0 = h;
        self.current = h;
        self.segments += 1;
    }

    /// Energy at step 0.
    pub fn h0(&self) -> Fx {
        self.h0
    }

    /// Baseline of the current segment.
    pub fn segment_h0(&self) -> Fx {
        self.segment_h0
    }

    /// Last observed energy.
    pub fn current(&self) -> Fx {
        self.current
    }

    /// `H - H_segment`, exact.
    pub fn delta(&self) -> EngineResult<Fx> {
        self.current.checked_sub(self.segment_h0)
    }

    /// `H - H0`, exact, across any swaps.
    pub fn delta_since_start(&self) -> EngineResult<Fx> {
        self.current.checked_sub(self.h0)
    }

    /// Largest `|dH|` seen within any single segment.
    pub fn max_abs_delta(&self) -> Fx {
        self.max_abs_segment_delta
    }

    /// `|dH / H_segment|` for display; zero when the baseline is zero.
    pub fn relative_drift(&self) -> f64 {
        let base = self.segment_h0.to_f64();
        if base == 0.0 {
            return 0.0;
        }
        match self.delta() {
            Ok(d) => (d.to_f64() / base).abs(),
            Err(_) => f64::INFINITY,
        }
    }

    /// Number of segments (1 + number of rebases).
    pub fn segments(&self) -> u32 {
        self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::VelocityVerlet;
    use crate::state::DEFAULT_SPAN;
    use crate::topology::TopologyMode;
    use approx::assert_abs_diff_eq;

    /// Tolerance on |dH| for dt = 1/60 (velocity-Verlet energy oscillation is O(dt^2)).
    const TOLERANCE: f64 = 1e-4;

    fn canonical() -> (SimulationState, Topology) {
        (
            SimulationState::init(64, 1337, DEFAULT_SPAN, Fx::ONE).unwrap(),
            Topology::build(64, TopologyMode::Chain),
        )
    }

    #[test]
    fn test_hand_computed_energy() {
        let state = SimulationState {
            x: vec![Fx::from_f64(0.25).unwrap(), Fx::from_f64(-0.25).unwrap()],
            p: vec![Fx::HALF, Fx::ZERO],
            mass: vec![Fx::ONE, Fx::ONE],
        };
        let topology = Topology::build(2, TopologyMode::Chain);
        let parts = evaluate_parts(&state, &topology).unwrap();
        // K = 0.5^2 / 2, P = 0.5^2 / 2
        assert_eq!(parts.kinetic, Fx::from_f64(0.125).unwrap());
        assert_eq!(parts.potential, Fx::from_f64(0.125).unwrap());
        assert_eq!(evaluate(&state, &topology).unwrap(), Fx::from_f64(0.25).unwrap());
    }

    #[test]
    fn test_canonical_h0_golden() {
        let (state, topology) = canonical();
        let h0 = evaluate(&state, &topology).unwrap();
        assert_eq!(h0.raw(), 2_306_646_976);
        assert_abs_diff_eq!(h0.to_f64(), 0.537_058_100_104_332, epsilon = 1e-12);
    }

    #[test]
    fn test_energy_bound_300_steps() {
        let (mut state, topology) = canonical();
        let verlet = VelocityVerlet::new(Fx::DT).unwrap();
        let mut monitor = DriftMonitor::new(evaluate(&state, &topology).unwrap());

        for _ in 0..300 {
            verlet.step(&mut state, &topology).unwrap();
            let delta = monitor.observe(evaluate(&state, &topology).unwrap()).unwrap();
            assert!(delta.to_f64().abs() < TOLERANCE);
        }
        assert!(monitor.max_abs_delta().to_f64() < TOLERANCE);
        assert!(monitor.max_abs_delta() > Fx::ZERO);
    }

    #[test]
    fn test_monitor_rebase() {
        let mut monitor = DriftMonitor::new(Fx::ONE);
        let d = monitor.observe(Fx::from_raw(Fx::ONE.raw() + 10)).unwrap();
        assert_eq!(d.raw(), 10);

        monitor.rebase(Fx::TWO);
        assert_eq!(monitor.segments(), 2);
        assert_eq!(monitor.delta().unwrap(), Fx::ZERO);
        assert_eq!(monitor.delta_since_start().unwrap(), Fx::ONE);

        monitor.observe(Fx::from_raw(Fx::TWO.raw() - 4)).unwrap();
        // max tracks the larger of the per-segment deltas
        assert_eq!(monitor.max_abs_delta().raw(), 10);
        assert_abs_diff_eq!(monitor.relative_drift(), 4.0 / Fx::TWO.raw() as f64, epsilon = 1e-18);
    }

    #[test]
    fn test_relative_drift_with_zero_baseline() {
        let monitor = DriftMonitor::new(Fx::ZERO);
        assert_eq!(monitor.relative_drift(), 0.0);
    }
}
