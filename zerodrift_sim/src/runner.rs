//! Scenario runner - executes deterministic check scenarios.

use crate::context::SimContext;
use crate::scenarios::ScenarioId;
use crate::session::Session;

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use zerodrift_core::{check_replay, EngineConfig, Fx, HashTip, Topology, TopologyMode};
use zerodrift_env::EnvError;

/// Default number of steps per scenario (5 s at 60 Hz).
pub const DEFAULT_STEPS: u64 = 300;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Node count actually simulated
    pub nodes: usize,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total steps executed
    pub total_steps: u64,

    /// Tip at the final step
    pub final_tip: Option<HashTip>,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Energy at step 0
    pub h0: f64,

    /// Energy at the last step
    pub final_energy: f64,

    /// Largest `|dH|` within any topology segment
    pub max_abs_delta_h: f64,

    /// Largest `|dH / H0|` of the fixed-point run
    pub max_relative_drift: f64,

    /// Topology segments (swaps + 1)
    pub segments: u32,

    /// Topology swaps recorded
    pub topology_swaps: usize,

    /// Independent replays that reproduced the live tip
    pub replays_verified: u64,

    /// Independent replays that did not
    pub replays_mismatched: u64,

    /// Largest relative drift of the float baseline, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_max_drift: Option<f64>,
}

/// `None` when every assertion held, otherwise the first failure.
type Verdict = Option<String>;

/// Energy bound for a topology.
///
/// Velocity-Verlet's energy band grows with the squared stiffest mode, which
/// scales with the highest node degree. Chains and rings (degree 2) get the
/// base tolerance; grids (degree 4) four times it.
pub fn segment_tolerance(topology: &Topology, base: f64) -> f64 {
    let max_degree = topology.degrees().into_iter().max().unwrap_or(0) as f64;
    base * (max_degree / 2.0).powi(2).max(1.0)
}

/// Runs check scenarios against one engine configuration.
pub struct ScenarioRunner {
    /// Engine configuration (seed, N, topology, ...)
    config: EngineConfig,

    /// Steps per scenario
    steps: u64,

    /// Steps between progress log lines
    progress_interval: u64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            steps: DEFAULT_STEPS,
            progress_interval: 60,
        }
    }

    /// Sets the number of steps per scenario.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the progress log interval.
    pub fn with_progress_interval(mut self, steps: u64) -> Self {
        self.progress_interval = steps.max(1);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    ///
    /// Engine errors do not escape: they fail the scenario with the error as
    /// the reason.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);

        let config = match scenario {
            ScenarioId::GridRemainder => self.grid_remainder_config(),
            _ => self.config.clone(),
        };
        let mut metrics = ScenarioMetrics::default();
        let mut final_tip = None;

        let outcome = match Session::new(config.clone(), SimContext::shared(config.seed)) {
            Ok(mut session) => {
                metrics.h0 = session.monitor().h0().to_f64();
                let verdict = match scenario {
                    ScenarioId::Canonical => self.run_canonical(&mut session, &mut metrics).await,
                    ScenarioId::Replay => self.run_replay(&mut session, &mut metrics).await,
                    ScenarioId::TopologySwap => self.run_topology_swap(&mut session, &mut metrics).await,
                    ScenarioId::BaselineDrift => self.run_baseline_drift(&mut session, &mut metrics).await,
                    ScenarioId::GridRemainder => self.run_grid_remainder(&mut session, &mut metrics).await,
                    ScenarioId::Rewind => self.run_rewind(&mut session, &mut metrics).await,
                };
                let tip = session.current_tip().await;
                self.collect(&session, &mut metrics);
                match (verdict, tip) {
                    (Ok(verdict), Ok(tip)) => {
                        final_tip = Some(tip);
                        Ok(verdict)
                    }
                    (Err(e), _) | (_, Err(e)) => Err(e),
                }
            }
            Err(e) => Err(EnvError::from(e)),
        };

        let failure_reason = match outcome {
            Ok(verdict) => verdict,
            Err(e) => Some(format!("engine error: {}", e)),
        };

        ScenarioResult {
            scenario,
            seed: config.seed,
            nodes: config.nodes,
            passed: failure_reason.is_none(),
            total_steps: self.steps,
            final_tip,
            failure_reason,
            metrics,
        }
    }

    /// ZD-001: Canonical - energy bound at every step.
    async fn run_canonical(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        info!("ZD-001: Canonical - {} steps, tolerance {:e}", self.steps, self.config.energy_tolerance);
        let verdict = self.run_bounded(session, self.steps, metrics)?;
        if verdict.is_none() {
            info!("✓ Canonical complete: max |dH| = {:e}", metrics.max_abs_delta_h);
        }
        Ok(verdict)
    }

    /// ZD-002: Replay - tips at start, midpoint and end re-derived from the seed.
    async fn run_replay(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        info!("ZD-002: Replay - live tips vs independent replay");
        let mid = self.steps / 2;
        let mut recorded = vec![(0, session.hash_tip().await?)];

        if let Some(reason) = self.run_bounded(session, mid, metrics)? {
            return Ok(Some(reason));
        }
        recorded.push((mid, session.hash_tip().await?));
        if let Some(reason) = self.run_bounded(session, self.steps - mid, metrics)? {
            return Ok(Some(reason));
        }
        recorded.push((self.steps, session.hash_tip().await?));

        for (step, tip) in &recorded {
            let verdict = check_replay(session.config(), session.schedule(), *step, tip)?;
            self.count(verdict.is_verified(), metrics);
            if !verdict.is_verified() {
                warn!("Replay mismatch at step {}", step);
                return Ok(Some(format!("replay mismatch at step {}", step)));
            }
        }

        let live = session.verify_live().await?;
        self.count(live.is_verified(), metrics);
        if !live.is_verified() {
            return Ok(Some(format!("live verification failed at step {}", live.step())));
        }

        info!("✓ Replay complete: {} tips reproduced", metrics.replays_verified);
        Ok(None)
    }

    /// ZD-003: TopologySwap - chain -> ring -> grid in equal thirds.
    async fn run_topology_swap(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        info!("ZD-003: TopologySwap - cycling topologies");
        let interval = (self.steps / 3).max(1);

        let mut done = 0;
        while done < self.steps {
            if done > 0 && done % interval == 0 {
                let mode = session.swap_topology()?;
                debug!("  step={} | swapped to {}", done, mode);
            }
            let chunk = (interval - done % interval).min(self.steps - done);
            if let Some(reason) = self.run_bounded(session, chunk, metrics)? {
                return Ok(Some(reason));
            }
            done += chunk;
        }

        let live = session.verify_live().await?;
        self.count(live.is_verified(), metrics);
        if !live.is_verified() {
            return Ok(Some(format!(
                "replay with {} swaps did not reproduce step {}",
                session.schedule().swaps().len(),
                live.step()
            )));
        }

        info!(
            "✓ TopologySwap complete: {} segments, max |dH| = {:e}",
            session.monitor().segments(),
            metrics.max_abs_delta_h
        );
        Ok(None)
    }

    /// ZD-004: BaselineDrift - float explicit Euler against fixed point.
    async fn run_baseline_drift(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        info!("ZD-004: BaselineDrift - explicit Euler reference");
        session.set_baseline(true)?;

        let mut baseline_max: f64 = 0.0;
        for _ in 0..self.steps {
            if let Some(reason) = self.run_bounded(session, 1, metrics)? {
                return Ok(Some(reason));
            }
            if let Some(readout) = session.baseline_readout() {
                baseline_max = baseline_max.max(readout.relative_drift);
            }
        }
        metrics.baseline_max_drift = Some(baseline_max);

        let fixed_max = metrics.max_relative_drift;
        if baseline_max <= 100.0 * fixed_max {
            return Ok(Some(format!(
                "baseline drift {:e} is not two orders above fixed-point drift {:e}",
                baseline_max, fixed_max
            )));
        }

        info!(
            "✓ BaselineDrift complete: baseline {:e} vs fixed {:e} ({:.0}x)",
            baseline_max,
            fixed_max,
            baseline_max / fixed_max.max(f64::MIN_POSITIVE)
        );
        Ok(None)
    }

    /// ZD-005: GridRemainder - nodes past the largest square are free particles.
    async fn run_grid_remainder(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        let nodes = session.config().nodes;
        let side = zerodrift_core::topology::integer_sqrt(nodes);
        let first_free = side * side;
        info!("ZD-005: GridRemainder - N={}, {} free nodes", nodes, nodes - first_free);

        let degrees = session.topology().degrees();
        if let Some(i) = (first_free..nodes).find(|&i| degrees[i] != 0) {
            return Ok(Some(format!("node {} beyond the {}x{} grid has edges", i, side, side)));
        }

        let x0: Vec<Fx> = session.state().positions()[first_free..].to_vec();
        let p0: Vec<Fx> = session.state().momenta()[first_free..].to_vec();
        let mass = session.config().mass;
        let dt = session.config().dt;

        if let Some(reason) = self.run_bounded(session, self.steps, metrics)? {
            return Ok(Some(reason));
        }

        for (k, (&x_start, &p)) in x0.iter().zip(&p0).enumerate() {
            let i = first_free + k;
            if session.state().momenta()[i] != p {
                return Ok(Some(format!("free node {} changed momentum", i)));
            }
            let increment = dt.checked_mul(p.checked_div(mass)?)?;
            let mut expected = x_start;
            for _ in 0..self.steps {
                expected = expected.checked_add(increment)?;
            }
            if session.state().positions()[i] != expected {
                return Ok(Some(format!("free node {} did not move linearly", i)));
            }
        }

        info!("✓ GridRemainder complete: {} free nodes moved linearly", p0.len());
        Ok(None)
    }

    /// ZD-006: Rewind - back to the midpoint, then forward again.
    async fn run_rewind(
        &self,
        session: &mut Session<SimContext>,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        info!("ZD-006: Rewind - deterministic scrub");
        let mid = self.steps / 2;

        if let Some(reason) = self.run_bounded(session, mid, metrics)? {
            return Ok(Some(reason));
        }
        let tip_mid = session.hash_tip().await?;
        let mode = session.swap_topology()?;
        if let Some(reason) = self.run_bounded(session, self.steps - mid, metrics)? {
            return Ok(Some(reason));
        }
        let tip_end = session.hash_tip().await?;

        session.rewind(mid)?;
        if session.hash_tip().await? != tip_mid {
            return Ok(Some(format!("rewind to step {} produced a different tip", mid)));
        }
        if session.schedule().swaps().iter().any(|s| s.at_step >= mid) {
            return Ok(Some("rewind kept swaps from the discarded future".to_string()));
        }

        session.set_topology(mode)?;
        session.advance_by(self.steps - mid)?;
        if session.hash_tip().await? != tip_end {
            return Ok(Some("re-running after rewind diverged".to_string()));
        }

        info!("✓ Rewind complete: step {} and step {} reproduced", mid, self.steps);
        Ok(None)
    }

    /// Advances `steps` ticks, checking the energy bound after each one.
    fn run_bounded(
        &self,
        session: &mut Session<SimContext>,
        steps: u64,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Verdict, EnvError> {
        let dt = Duration::from_secs_f64(session.config().dt.to_f64());
        for _ in 0..steps {
            session.advance()?;
            session.context().advance_time(dt);

            let tolerance = segment_tolerance(session.topology(), session.config().energy_tolerance);
            let delta = session.monitor().delta()?.to_f64().abs();
            metrics.max_abs_delta_h = metrics.max_abs_delta_h.max(delta);
            let h0 = session.monitor().h0().to_f64();
            if h0 != 0.0 {
                let since_start = session.monitor().delta_since_start()?.to_f64();
                metrics.max_relative_drift = metrics.max_relative_drift.max((since_start / h0).abs());
            }

            let step = session.step();
            if step % self.progress_interval == 0 {
                debug!(
                    "  step={} | mode={} | H={:.9} | dH={:+.3e}",
                    step,
                    session.topology().mode(),
                    session.monitor().current().to_f64(),
                    delta
                );
            }

            if delta > tolerance {
                return Ok(Some(format!(
                    "|dH| = {:e} exceeds {:e} at step {} ({})",
                    delta,
                    tolerance,
                    step,
                    session.topology().mode()
                )));
            }
        }
        Ok(None)
    }

    /// Grid run on a node count that is never a perfect square.
    fn grid_remainder_config(&self) -> EngineConfig {
        let nodes = self.config.nodes;
        let side = zerodrift_core::topology::integer_sqrt(nodes);
        let nodes = if side * side == nodes { nodes + 2 } else { nodes };
        self.config.clone().with_nodes(nodes).with_mode(TopologyMode::Grid)
    }

    fn count(&self, verified: bool, metrics: &mut ScenarioMetrics) {
        if verified {
            metrics.replays_verified += 1;
        } else {
            metrics.replays_mismatched += 1;
        }
    }

    fn collect(&self, session: &Session<SimContext>, metrics: &mut ScenarioMetrics) {
        metrics.final_energy = session.monitor().current().to_f64();
        metrics.segments = session.monitor().segments();
        metrics.topology_swaps = session.schedule().swaps().len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ScenarioRunner {
        ScenarioRunner::new(EngineConfig::default())
    }

    #[tokio::test]
    async fn test_canonical_scenario() {
        let result = runner().run(ScenarioId::Canonical).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.max_abs_delta_h > 0.0);
        assert!(result.metrics.max_abs_delta_h < 1e-4);
        assert_eq!(
            result.final_tip.unwrap().as_str(),
            "0203f3aece38ccf57e19d2967c223fd0df8a3421997068b13292ee195979f1a5"
        );
    }

    #[tokio::test]
    async fn test_replay_scenario() {
        let result = runner().run(ScenarioId::Replay).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.replays_verified, 4);
        assert_eq!(result.metrics.replays_mismatched, 0);
    }

    #[tokio::test]
    async fn test_topology_swap_scenario() {
        let result = runner().run(ScenarioId::TopologySwap).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.topology_swaps, 2);
        assert_eq!(result.metrics.segments, 3);
        assert_eq!(
            result.final_tip.unwrap().as_str(),
            "9d682c7c699c1e547e0e8b1b53ba7b2eaa6df26f02b15c3e560efec7790fd946"
        );
    }

    #[tokio::test]
    async fn test_baseline_drift_scenario() {
        let result = runner().run(ScenarioId::BaselineDrift).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        let baseline = result.metrics.baseline_max_drift.unwrap();
        assert!(baseline > 1000.0 * result.metrics.max_relative_drift);
    }

    #[tokio::test]
    async fn test_grid_remainder_scenario() {
        let result = runner().run(ScenarioId::GridRemainder).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        // 64 is square, so the scenario runs 66 nodes
        assert_eq!(result.nodes, 66);
    }

    #[tokio::test]
    async fn test_rewind_scenario() {
        let result = runner().with_steps(120).run(ScenarioId::Rewind).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.topology_swaps, 1);
    }

    #[tokio::test]
    async fn test_scenarios_are_deterministic() {
        let config = EngineConfig::default().with_seed(7).with_nodes(20);
        let a = ScenarioRunner::new(config.clone()).with_steps(90).run(ScenarioId::TopologySwap).await;
        let b = ScenarioRunner::new(config).with_steps(90).run(ScenarioId::TopologySwap).await;

        assert_eq!(a.final_tip, b.final_tip);
        assert_eq!(a.metrics.max_abs_delta_h, b.metrics.max_abs_delta_h);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_scenario() {
        let config = EngineConfig::default().with_mass(Fx::ZERO);
        let result = ScenarioRunner::new(config).run(ScenarioId::Canonical).await;

        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("mass"));
        assert!(result.final_tip.is_none());
    }

    #[test]
    fn test_segment_tolerance() {
        let chain = Topology::build(64, TopologyMode::Chain);
        let grid = Topology::build(64, TopologyMode::Grid);
        let lone = Topology::build(1, TopologyMode::Chain);
        assert_eq!(segment_tolerance(&chain, 1e-4), 1e-4);
        assert_eq!(segment_tolerance(&grid, 1e-4), 4e-4);
        assert_eq!(segment_tolerance(&lone, 1e-4), 1e-4);
    }
}
