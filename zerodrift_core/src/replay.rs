//! Snapshot commitments and deterministic replay.
//!
//! A hash tip commits to `(step, x[0..8], p[0..8])`. Nothing chains the
//! tips explicitly: because the run is a pure function of
//! `(config, topology schedule, step)`, any party can re-simulate from the
//! seed and recompute the tip for a given step.
//!
//! # Snapshot layout (little endian, 132 bytes)
//!
//! ```text
//! offset  size        field
//! 0       4           step (low 32 bits)
//! 4       8 * n       x[0..n]   i64 two's complement, n = min(8, N)
//! 4+8n    8 * n       p[0..n]
//! ...                 zero padding up to 132 bytes
//! ```

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::integrator::VelocityVerlet;
use crate::state::SimulationState;
use crate::topology::{Topology, TopologySchedule};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512_256};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Nodes committed per snapshot.
pub const SNAPSHOT_NODES: usize = 8;

/// Fixed snapshot size: step counter plus 8 positions and 8 momenta.
pub const SNAPSHOT_LEN: usize = 4 + 2 * SNAPSHOT_NODES * 8;

/// Hex length of every supported digest (256-bit output).
pub const HASH_TIP_HEX_LEN: usize = 64;

/// Canonical byte encoding of a state at a step.
///
/// Built synchronously from a borrowed state and owned afterwards, so a
/// digest computed later (possibly after a suspension point) always covers
/// the state as it was when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    step: u64,
    bytes: [u8; SNAPSHOT_LEN],
}

impl Snapshot {
    /// Serializes `state` at `step`.
    pub fn capture(step: u64, state: &SimulationState) -> Self {
        let mut bytes = [0u8; SNAPSHOT_LEN];
        bytes[0..4].copy_from_slice(&(step as u32).to_le_bytes());

        let take = state.len().min(SNAPSHOT_NODES);
        let mut offset = 4;
        for value in state.x[..take].iter().chain(&state.p[..take]) {
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
            offset += 8;
        }

        Self { step, bytes }
    }

    /// Step this snapshot was taken at.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Serializes `state` at `step` to the canonical byte layout.
pub fn snapshot(step: u64, state: &SimulationState) -> Vec<u8> {
    Snapshot::capture(step, state).as_bytes().to_vec()
}

/// Supported digests. Both produce 256-bit tips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512_256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512_256 => "sha512_256",
        }
    }

    /// Hashes `bytes` into a tip.
    pub fn digest(&self, bytes: &[u8]) -> HashTip {
        let raw = match self {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha512_256 => hex::encode(Sha512_256::digest(bytes)),
        };
        HashTip(raw)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = EngineError;

    /// Unknown names fail with `HashingUnavailable`; there is no fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha512_256" | "sha512/256" | "sha-512/256" => Ok(HashAlgorithm::Sha512_256),
            other => Err(EngineError::hashing_unavailable(format!(
                "digest '{}' is not available (supported: sha256, sha512_256)",
                other
            ))),
        }
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashAlgorithm> for String {
    fn from(value: HashAlgorithm) -> Self {
        value.name().to_string()
    }
}

/// Lowercase hex digest of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashTip(String);

impl HashTip {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for status lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for HashTip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HashTip {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower.len() != HASH_TIP_HEX_LEN || hex::decode(&lower).is_err() {
            return Err(EngineError::invalid(format!("not a 256-bit hex hash tip: {}", s)));
        }
        Ok(HashTip(lower))
    }
}

impl TryFrom<String> for HashTip {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HashTip> for String {
    fn from(value: HashTip) -> Self {
        value.0
    }
}

/// Digests a captured snapshot.
pub fn digest(algorithm: HashAlgorithm, snapshot: &Snapshot) -> HashTip {
    algorithm.digest(snapshot.as_bytes())
}

/// Re-simulates from the seed to `target_step`.
///
/// Swaps recorded at step `s` are applied before the step that leaves `s`.
/// Returns the state at `target_step` together with the topology in force
/// for the last executed step (the initial topology when `target_step == 0`).
pub fn replay_to(
    config: &EngineConfig,
    schedule: &TopologySchedule,
    target_step: u64,
) -> EngineResult<(SimulationState, Topology)> {
    config.validate()?;
    schedule.validate()?;
    if schedule.initial() != config.mode {
        return Err(EngineError::invalid(format!(
            "schedule starts with {} but config starts with {}",
            schedule.initial(),
            config.mode
        )));
    }

    let verlet = VelocityVerlet::new(config.dt)?;
    let mut state = SimulationState::init(config.nodes, config.seed, config.span, config.mass)?;
    let mut topology = Topology::build_with_stiffness(config.nodes, config.mode, config.stiffness)?;
    let mut pending = schedule.swaps().iter().peekable();

    for step in 0..target_step {
        let mut mode = topology.mode();
        while let Some(swap) = pending.next_if(|s| s.at_step <= step) {
            mode = swap.mode;
        }
        if mode != topology.mode() {
            topology = Topology::build_with_stiffness(config.nodes, mode, config.stiffness)?;
        }
        verlet.step(&mut state, &topology)?;
    }

    Ok((state, topology))
}

/// Recomputes the hash tip at `target_step` from scratch.
pub fn verify_replay(
    config: &EngineConfig,
    schedule: &TopologySchedule,
    target_step: u64,
) -> EngineResult<HashTip> {
    debug!(
        "Replaying seed={} N={} to step {} ({} swaps)",
        config.seed,
        config.nodes,
        target_step,
        schedule.swaps().len()
    );
    let (state, _) = replay_to(config, schedule, target_step)?;
    let tip = digest(config.hash, &Snapshot::capture(target_step, &state));
    debug!("Replay tip at step {}: {}", target_step, tip.short());
    Ok(tip)
}

/// Outcome of comparing a replayed tip with a recorded one.
///
/// A mismatch is a result, not a fault; the caller decides how to present it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ReplayVerdict {
    Verified { step: u64, tip: HashTip },
    Mismatch { step: u64, expected: HashTip, actual: HashTip },
}

impl ReplayVerdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, ReplayVerdict::Verified { .. })
    }

    pub fn step(&self) -> u64 {
        match self {
            ReplayVerdict::Verified { step, .. } | ReplayVerdict::Mismatch { step, .. } => *step,
        }
    }
}

/// Replays to `step` and compares against the tip recorded live.
pub fn check_replay(
    config: &EngineConfig,
    schedule: &TopologySchedule,
    step: u64,
    recorded: &HashTip,
) -> EngineResult<ReplayVerdict> {
    let actual = verify_replay(config, schedule, step)?;
    if &actual == recorded {
        Ok(ReplayVerdict::Verified { step, tip: actual })
    } else {
        Ok(ReplayVerdict::Mismatch {
            step,
            expected: recorded.clone(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::Fx;
    use crate::state::DEFAULT_SPAN;
    use crate::topology::TopologyMode;
    use std::collections::BTreeMap;

    const GOLDEN_TIP_STEP_0: &str = "e3f70b87a10ad55d3a06383a4730d46c0733928bd36e45866e6da5930f7b3712";
    const GOLDEN_TIP_STEP_100: &str = "822e973f7eec08e4130095c4c64e60a4792887c1a68054f80e4b82c033fe0505";

    /// Runs the canonical config live and records tips at the given steps.
    fn live_tips(config: &EngineConfig, checkpoints: &[u64]) -> BTreeMap<u64, HashTip> {
        let mut state = SimulationState::init(config.nodes, config.seed, config.span, config.mass).unwrap();
        let topology = Topology::build(config.nodes, config.mode);
        let verlet = VelocityVerlet::new(config.dt).unwrap();
        let last = *checkpoints.iter().max().unwrap();

        let mut tips = BTreeMap::new();
        for step in 0..=last {
            if checkpoints.contains(&step) {
                tips.insert(step, digest(config.hash, &Snapshot::capture(step, &state)));
            }
            if step < last {
                verlet.step(&mut state, &topology).unwrap();
            }
        }
        tips
    }

    #[test]
    fn test_snapshot_layout() {
        let state = SimulationState::init(64, 1337, DEFAULT_SPAN, Fx::ONE).unwrap();
        let bytes = snapshot(0x1_0000_0007, &state);
        assert_eq!(bytes.len(), SNAPSHOT_LEN);
        // step is truncated to its low 32 bits
        assert_eq!(bytes[0..4], 7u32.to_le_bytes());
        assert_eq!(bytes[4..12], state.positions()[0].raw().to_le_bytes());
        assert_eq!(bytes[68..76], state.momenta()[0].raw().to_le_bytes());
        assert_eq!(bytes[124..132], state.momenta()[7].raw().to_le_bytes());
    }

    #[test]
    fn test_snapshot_pads_small_states() {
        let state = SimulationState::init(3, 5, DEFAULT_SPAN, Fx::ONE).unwrap();
        let bytes = snapshot(1, &state);
        assert_eq!(bytes.len(), SNAPSHOT_LEN);
        // momenta follow the 3 positions directly
        assert_eq!(bytes[28..36], state.momenta()[0].raw().to_le_bytes());
        assert!(bytes[52..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_golden_tips() {
        let config = EngineConfig::default();
        let tips = live_tips(&config, &[0, 100]);
        assert_eq!(tips[&0].as_str(), GOLDEN_TIP_STEP_0);
        assert_eq!(tips[&100].as_str(), GOLDEN_TIP_STEP_100);
    }

    #[test]
    fn test_replay_matches_live_tips() {
        let config = EngineConfig::default();
        let schedule = TopologySchedule::new(config.mode);
        let live = live_tips(&config, &[0, 1, 50, 300]);
        for (step, tip) in &live {
            let verdict = check_replay(&config, &schedule, *step, tip).unwrap();
            assert!(verdict.is_verified(), "step {}", step);
        }
    }

    #[test]
    fn test_mismatch_is_a_verdict() {
        let config = EngineConfig::default();
        let schedule = TopologySchedule::new(config.mode);
        let wrong: HashTip = GOLDEN_TIP_STEP_0.parse().unwrap();
        let verdict = check_replay(&config, &schedule, 100, &wrong).unwrap();
        match verdict {
            ReplayVerdict::Mismatch { step, expected, actual } => {
                assert_eq!(step, 100);
                assert_eq!(expected, wrong);
                assert_eq!(actual.as_str(), GOLDEN_TIP_STEP_100);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_independent_runs_are_bit_identical() {
        let mut histories: Vec<(EngineConfig, TopologySchedule)> = TopologyMode::all()
            .into_iter()
            .map(|mode| {
                let config = EngineConfig::default().with_mode(mode);
                (config, TopologySchedule::new(mode))
            })
            .collect();
        let mut swapped = TopologySchedule::new(TopologyMode::Chain);
        swapped.record(100, TopologyMode::Ring).unwrap();
        swapped.record(200, TopologyMode::Grid).unwrap();
        histories.push((EngineConfig::default(), swapped));

        for (config, schedule) in &histories {
            let (first, _) = replay_to(config, schedule, 300).unwrap();
            let (second, _) = replay_to(config, schedule, 300).unwrap();
            assert_eq!(first.len(), config.nodes);
            // every node, not only the ones the snapshot covers
            assert_eq!(first.positions(), second.positions(), "{}", config.mode);
            assert_eq!(first.momenta(), second.momenta(), "{}", config.mode);
            assert_eq!(
                verify_replay(config, schedule, 300).unwrap(),
                verify_replay(config, schedule, 300).unwrap()
            );
        }
    }

    #[test]
    fn test_replay_reproduces_swaps() {
        let config = EngineConfig::default().with_nodes(16);
        let mut schedule = TopologySchedule::new(TopologyMode::Chain);
        schedule.record(10, TopologyMode::Ring).unwrap();
        schedule.record(25, TopologyMode::Grid).unwrap();

        // live run applying the swaps by hand
        let mut state = SimulationState::init(16, config.seed, config.span, config.mass).unwrap();
        let verlet = VelocityVerlet::new(config.dt).unwrap();
        for step in 0..40u64 {
            let topology = Topology::build(16, schedule.mode_at(step));
            verlet.step(&mut state, &topology).unwrap();
        }
        let live = digest(config.hash, &Snapshot::capture(40, &state));

        assert_eq!(verify_replay(&config, &schedule, 40).unwrap(), live);

        // dropping the history changes the tip
        let plain = TopologySchedule::new(TopologyMode::Chain);
        assert_ne!(verify_replay(&config, &plain, 40).unwrap(), live);
    }

    #[test]
    fn test_replay_rejects_inconsistent_schedule() {
        let config = EngineConfig::default();
        let schedule = TopologySchedule::new(TopologyMode::Ring);
        assert!(matches!(
            verify_replay(&config, &schedule, 1),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_algorithms() {
        let state = SimulationState::init(8, 1, DEFAULT_SPAN, Fx::ONE).unwrap();
        let snap = Snapshot::capture(0, &state);
        let a = digest(HashAlgorithm::Sha256, &snap);
        let b = digest(HashAlgorithm::Sha512_256, &snap);
        assert_eq!(a.as_str().len(), HASH_TIP_HEX_LEN);
        assert_eq!(b.as_str().len(), HASH_TIP_HEX_LEN);
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_unknown_algorithm_is_unavailable() {
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(EngineError::HashingUnavailable(_))
        ));
        assert_eq!("SHA-256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_hash_tip_parsing() {
        let tip: HashTip = GOLDEN_TIP_STEP_0.to_uppercase().parse().unwrap();
        assert_eq!(tip.as_str(), GOLDEN_TIP_STEP_0);
        assert!("abc".parse::<HashTip>().is_err());
        assert!("zz".repeat(32).parse::<HashTip>().is_err());

        let json = serde_json::to_string(&tip).unwrap();
        assert_eq!(json, format!("\"{}\"", GOLDEN_TIP_STEP_0));
    }
}
