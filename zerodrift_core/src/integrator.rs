//! The symplectic stepper - velocity Verlet in Q32.32.
//!
//! One step is half-kick, drift, half-kick:
//!
//! ```text
//! p(t + dt/2) = p(t)        + dt/2 * F(x(t))
//! x(t + dt)   = x(t)        + dt   * p(t + dt/2) / m
//! p(t + dt)   = p(t + dt/2) + dt/2 * F(x(t + dt))
//! ```
//!
//! The order is what bounds the energy error; do not reorder.

use crate::error::{EngineError, EngineResult};
use crate::fixed::Fx;
use crate::state::SimulationState;
use crate::topology::Topology;

/// Velocity-Verlet integrator bound to a fixed time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityVerlet {
    dt: Fx,
    /// `dt` shifted right once, computed a single time.
    half_dt: Fx,
}

impl VelocityVerlet {
    /// Creates the integrator. `dt` must be positive.
    pub fn new(dt: Fx) -> EngineResult<Self> {
        if !dt.is_positive() {
            return Err(EngineError::invalid(format!("dt must be positive, got {}", dt)));
        }
        Ok(Self {
            dt,
            half_dt: dt.halved(),
        })
    }

    pub fn dt(&self) -> Fx {
        self.dt
    }

    pub fn half_dt(&self) -> Fx {
        self.half_dt
    }

    /// Advances `state` by exactly one tick under `topology`.
    ///
    /// The step is atomic: all arithmetic runs on scratch vectors and the
    /// state is only overwritten once every operation has succeeded, so an
    /// `ArithmeticOverflow` leaves the previous state intact.
    pub fn step(&self, state: &mut SimulationState, topology: &Topology) -> EngineResult<()> {
        ensure_compatible(state, topology)?;

        let f0 = spring_forces(&state.x, topology)?;
        let p_half = kick(&state.p, &f0, self.half_dt)?;
        let x_next = drift(&state.x, &p_half, &state.mass, self.dt)?;
        let f1 = spring_forces(&x_next, topology)?;
        let p_next = kick(&p_half, &f1, self.half_dt)?;

        state.x = x_next;
        state.p = p_next;
        Ok(())
    }
}

/// One velocity-Verlet step with an ad-hoc `dt`.
pub fn step(state: &mut SimulationState, dt: Fx, topology: &Topology) -> EngineResult<()> {
    VelocityVerlet::new(dt)?.step(state, topology)
}

/// Net spring force per node, accumulated in canonical edge order.
///
/// For edge `(a, b)`: `f_ab = -k * (x[a] - x[b])`, added to `a` and
/// subtracted from `b`.
pub fn spring_forces(x: &[Fx], topology: &Topology) -> EngineResult<Vec<Fx>> {
    let mut f = vec![Fx::ZERO; x.len()];
    for (edge, k) in topology.springs() {
        let (a, b) = (edge.a(), edge.b());
        let dx = x[a].checked_sub(x[b])?;
        let f_ab = k.checked_mul(dx)?.checked_neg()?;
        f[a] = f[a].checked_add(f_ab)?;
        f[b] = f[b].checked_sub(f_ab)?;
    }
    Ok(f)
}

fn kick(p: &[Fx], f: &[Fx], half_dt: Fx) -> EngineResult<Vec<Fx>> {
    p.iter()
        .zip(f)
        .map(|(&pi, &fi)| pi.checked_add(half_dt.checked_mul(fi)?))
        .collect()
}

fn drift(x: &[Fx], p: &[Fx], mass: &[Fx], dt: Fx) -> EngineResult<Vec<Fx>> {
    x.iter()
        .zip(p)
        .zip(mass)
        .map(|((&xi, &pi), &mi)| xi.checked_add(dt.checked_mul(pi.checked_div(mi)?)?))
        .collect()
}

fn ensure_compatible(state: &SimulationState, topology: &Topology) -> EngineResult<()> {
    if state.len() != topology.node_count() {
        return Err(EngineError::invalid(format!(
            "state has {} nodes but topology was built for {}",
            state.len(),
            topology.node_count()
        )));
    }
    Ok(())
}
