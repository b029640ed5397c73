//! Exported records of a run.
//!
//! [`ProofRecord`] is the flat summary meant for people and tools to read.
//! It cannot drive a replay on its own because it carries neither the swap
//! history nor the physical parameters; [`ReplayManifest`] carries both.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fixed::Fx;
use crate::replay::{check_replay, HashAlgorithm, HashTip, ReplayVerdict};
use crate::topology::{TopologyMode, TopologySchedule};
use serde::{Deserialize, Serialize};

/// Flat proof record: `{ seed, N, dt, step, topology_mode, hash_tip, timestamp }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub seed: u64,
    #[serde(rename = "N")]
    pub nodes: usize,
    pub dt: f64,
    pub step: u64,
    pub topology_mode: TopologyMode,
    pub hash_tip: HashTip,
    /// Supplied by the caller's clock; the core has none.
    pub timestamp: String,
}

impl ProofRecord {
    pub fn new(
        config: &EngineConfig,
        step: u64,
        topology_mode: TopologyMode,
        hash_tip: HashTip,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            seed: config.seed,
            nodes: config.nodes,
            dt: config.dt.to_f64(),
            step,
            topology_mode,
            hash_tip,
            timestamp: timestamp.into(),
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::invalid(format!("proof record: {}", e)))
    }
}

/// Everything needed to re-derive a recorded hash tip from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayManifest {
    pub seed: u64,
    pub nodes: usize,
    pub dt_raw: i64,
    pub span: f64,
    pub mass_raw: i64,
    pub stiffness_raw: i64,
    pub hash: HashAlgorithm,
    pub schedule: TopologySchedule,
    pub step: u64,
    pub hash_tip: HashTip,
}

impl ReplayManifest {
    pub fn new(
        config: &EngineConfig,
        schedule: TopologySchedule,
        step: u64,
        hash_tip: HashTip,
    ) -> Self {
        Self {
            seed: config.seed,
            nodes: config.nodes,
            dt_raw: config.dt.raw(),
            span: config.span,
            mass_raw: config.mass.raw(),
            stiffness_raw: config.stiffness.raw(),
            hash: config.hash,
            schedule,
            step,
            hash_tip,
        }
    }

    /// Rebuilds the engine configuration the manifest was taken from.
    ///
    /// The energy tolerance is not part of the replay and takes its default.
    pub fn config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_seed(self.seed)
            .with_nodes(self.nodes)
            .with_dt(Fx::from_raw(self.dt_raw))
            .with_span(self.span)
            .with_mass(Fx::from_raw(self.mass_raw))
            .with_stiffness(Fx::from_raw(self.stiffness_raw))
            .with_mode(self.schedule.initial())
            .with_hash(self.hash)
    }

    /// Replays from the seed and compares against the recorded tip.
    pub fn verify(&self) -> EngineResult<ReplayVerdict> {
        check_replay(&self.config(), &self.schedule, self.step, &self.hash_tip)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::invalid(format!("replay manifest: {}", e)))
    }

    pub fn from_json(json: &str) -> EngineResult<Self> {
        let manifest: ReplayManifest = serde_json::from_str(json)
            .map_err(|e| EngineError::invalid(format!("replay manifest: {}", e)))?;
        manifest.schedule.validate()?;
        Ok(manifest)
    }
}
