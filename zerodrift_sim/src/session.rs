//! Session - the engine object that owns one run.

use crate::frame::{tone_hz, BaselineReadout, FrameView};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zerodrift_core::hamiltonian::evaluate;
use zerodrift_core::{
    check_replay, BaselineState, DriftMonitor, EngineConfig, EngineResult, ExplicitEuler, HashTip,
    ProofRecord, ReplayManifest, ReplayVerdict, SimulationState, Snapshot, Topology, TopologyMode,
    TopologySchedule, VelocityVerlet,
};
use zerodrift_env::{EngineContext, EnvError};

/// Float reference stepped alongside the fixed-point run.
struct BaselineRun {
    state: BaselineState,
    stepper: ExplicitEuler,
    /// Baseline energy when it was switched on
    h_enable: f64,
}

impl BaselineRun {
    fn readout(&self, topology: &Topology) -> BaselineReadout {
        let energy = self.stepper.energy(&self.state, topology);
        let relative_drift = if self.h_enable == 0.0 {
            0.0
        } else {
            ((energy - self.h_enable) / self.h_enable).abs()
        };
        BaselineReadout {
            energy,
            relative_drift,
        }
    }
}

/// A live run: one state, its topology history, drift monitor and tips.
///
/// Everything here is a pure function of `(config, schedule, step)` except
/// the optional float baseline, which is display-only and dropped on rewind.
pub struct Session<C: EngineContext> {
    config: EngineConfig,
    ctx: Arc<C>,
    verlet: VelocityVerlet,
    state: SimulationState,
    topology: Topology,
    schedule: TopologySchedule,
    monitor: DriftMonitor,
    baseline: Option<BaselineRun>,
    step: u64,
    /// Last computed tip and the step it was taken at
    tip: Option<(u64, HashTip)>,
    /// Last replay verdict, for the step it was computed at
    verdict: Option<ReplayVerdict>,
}

impl<C: EngineContext> Session<C> {
    /// Validates `config` and initializes the state at step 0.
    pub fn new(config: EngineConfig, ctx: Arc<C>) -> EngineResult<Self> {
        config.validate()?;
        let verlet = VelocityVerlet::new(config.dt)?;
        let state = SimulationState::init(config.nodes, config.seed, config.span, config.mass)?;
        let topology = Topology::build_with_stiffness(config.nodes, config.mode, config.stiffness)?;
        let monitor = DriftMonitor::new(evaluate(&state, &topology)?);

        debug!(
            "Session seed={} N={} mode={} H0={}",
            config.seed,
            config.nodes,
            config.mode,
            monitor.h0()
        );

        Ok(Self {
            schedule: TopologySchedule::new(config.mode),
            config,
            ctx,
            verlet,
            state,
            topology,
            monitor,
            baseline: None,
            step: 0,
            tip: None,
            verdict: None,
        })
    }

    /// One integrator step. The float baseline, when on, steps with it.
    ///
    /// Nothing is committed unless the step, the baseline step and the
    /// energy evaluation all succeed; on error the session is unchanged.
    pub fn advance(&mut self) -> EngineResult<()> {
        let mut state = self.state.clone();
        self.verlet.step(&mut state, &self.topology)?;
        let baseline = match self.baseline.as_ref() {
            Some(run) => {
                let mut next = run.state.clone();
                run.stepper.step(&mut next, &self.topology)?;
                Some(next)
            }
            None => None,
        };
        let mut monitor = self.monitor.clone();
        monitor.observe(evaluate(&state, &self.topology)?)?;

        self.state = state;
        self.monitor = monitor;
        if let (Some(run), Some(next)) = (self.baseline.as_mut(), baseline) {
            run.state = next;
        }
        self.step += 1;
        Ok(())
    }

    /// `k` integrator steps.
    pub fn advance_by(&mut self, k: u64) -> EngineResult<()> {
        for _ in 0..k {
            self.advance()?;
        }
        Ok(())
    }

    /// Cycles chain -> ring -> grid -> chain. Returns the new mode.
    pub fn swap_topology(&mut self) -> EngineResult<TopologyMode> {
        let next = self.topology.mode().next();
        self.set_topology(next)?;
        Ok(next)
    }

    /// Switches to `mode` for every step from the current one on.
    ///
    /// The swap is recorded at the current step and starts a new energy
    /// segment.
    pub fn set_topology(&mut self, mode: TopologyMode) -> EngineResult<()> {
        let topology = Topology::build_with_stiffness(self.config.nodes, mode, self.config.stiffness)?;
        let h = evaluate(&self.state, &topology)?;
        self.schedule.record(self.step, mode)?;
        self.topology = topology;
        self.monitor.rebase(h);
        debug!("Topology -> {} at step {}", mode, self.step);
        Ok(())
    }

    /// Turns the float baseline on or off.
    ///
    /// Switching it on copies the current fixed-point state once; the two
    /// runs share nothing after that.
    pub fn set_baseline(&mut self, enabled: bool) -> EngineResult<()> {
        match (enabled, self.baseline.is_some()) {
            (true, false) => {
                let stepper = ExplicitEuler::from_config(&self.config)?;
                let state = BaselineState::from_initial(&self.state);
                let h_enable = stepper.energy(&state, &self.topology);
                self.baseline = Some(BaselineRun {
                    state,
                    stepper,
                    h_enable,
                });
            }
            (false, true) => self.baseline = None,
            _ => {}
        }
        Ok(())
    }

    /// Snapshots the current state and digests it through the context.
    ///
    /// The snapshot is taken before the suspension point, so the tip always
    /// belongs to `self.step()` as it was when this was called.
    pub async fn hash_tip(&mut self) -> Result<HashTip, EnvError> {
        let step = self.step;
        let snapshot = Snapshot::capture(step, &self.state);
        let tip = self.ctx.digest(self.config.hash, snapshot).await?;
        debug!("Tip at step {}: {}", step, tip.short());
        self.tip = Some((step, tip.clone()));
        Ok(tip)
    }

    /// Tip for the current step, computing it if the last one is stale.
    pub async fn current_tip(&mut self) -> Result<HashTip, EnvError> {
        match &self.tip {
            Some((step, tip)) if *step == self.step => Ok(tip.clone()),
            _ => self.hash_tip().await,
        }
    }

    /// Re-initializes from the seed and re-simulates to `target`.
    ///
    /// Swaps recorded before `target` are replayed; later ones are discarded
    /// because the history diverges from here. The float baseline is turned
    /// off. Nothing changes if re-simulation fails.
    pub fn rewind(&mut self, target: u64) -> EngineResult<()> {
        let mut schedule = self.schedule.clone();
        schedule.truncate_from(target);

        let mut fresh = Self::new(self.config.clone(), Arc::clone(&self.ctx))?;
        let mut pending = schedule.swaps().iter().peekable();
        for step in 0..target {
            while let Some(swap) = pending.next_if(|s| s.at_step == step) {
                fresh.set_topology(swap.mode)?;
            }
            fresh.advance()?;
        }

        debug!(
            "Rewound from step {} to {} ({} swaps kept)",
            self.step,
            target,
            fresh.schedule.swaps().len()
        );
        *self = fresh;
        Ok(())
    }

    /// Independently replays the run to the current step and compares the
    /// result with the live tip.
    ///
    /// This is the only way a session reports a run as verified.
    pub async fn verify_live(&mut self) -> Result<ReplayVerdict, EnvError> {
        let recorded = self.current_tip().await?;
        let verdict = check_replay(&self.config, &self.schedule, self.step, &recorded)?;
        match &verdict {
            ReplayVerdict::Verified { step, tip } => {
                info!("Replay verified at step {} ({})", step, tip.short())
            }
            ReplayVerdict::Mismatch {
                step,
                expected,
                actual,
            } => warn!(
                "Replay mismatch at step {}: live {} vs replay {}",
                step,
                expected.short(),
                actual.short()
            ),
        }
        self.verdict = Some(verdict.clone());
        Ok(verdict)
    }

    /// Read-only view of the current step.
    pub fn frame(&self) -> FrameView {
        let baseline = self.baseline.as_ref().map(|run| run.readout(&self.topology));
        let hash_tip = match &self.tip {
            Some((step, tip)) if *step == self.step => Some(tip.clone()),
            _ => None,
        };
        let verified = match &self.verdict {
            Some(v) if v.step() == self.step => Some(v.is_verified()),
            _ => None,
        };

        FrameView {
            step: self.step,
            topology_mode: self.topology.mode(),
            positions: self.state.positions_f64(),
            edges: self.topology.edges().iter().map(|e| (e.a(), e.b())).collect(),
            energy: self.monitor.current().to_f64(),
            delta_h: self.monitor.delta().map(|d| d.to_f64()).unwrap_or(f64::NAN),
            relative_drift: self.monitor.relative_drift(),
            baseline,
            tone_hz: tone_hz(baseline.map(|b| b.relative_drift)),
            hash_tip,
            verified,
        }
    }

    /// Flat proof record for the current step, stamped with the context clock.
    pub async fn proof_record(&mut self) -> Result<ProofRecord, EnvError> {
        let tip = self.current_tip().await?;
        let timestamp = humantime::format_rfc3339_seconds(self.ctx.system_time()).to_string();
        Ok(ProofRecord::new(
            &self.config,
            self.step,
            self.topology.mode(),
            tip,
            timestamp,
        ))
    }

    /// Everything needed to re-derive the current tip from scratch.
    pub async fn replay_manifest(&mut self) -> Result<ReplayManifest, EnvError> {
        let tip = self.current_tip().await?;
        Ok(ReplayManifest::new(
            &self.config,
            self.schedule.clone(),
            self.step,
            tip,
        ))
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<C> {
        &self.ctx
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn schedule(&self) -> &TopologySchedule {
        &self.schedule
    }

    pub fn monitor(&self) -> &DriftMonitor {
        &self.monitor
    }

    pub fn baseline_enabled(&self) -> bool {
        self.baseline.is_some()
    }

    /// Current baseline readout, if the baseline is on.
    pub fn baseline_readout(&self) -> Option<BaselineReadout> {
        self.baseline.as_ref().map(|run| run.readout(&self.topology))
    }
}
