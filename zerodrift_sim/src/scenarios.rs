//! Deterministic check scenarios.

use serde::{Deserialize, Serialize};

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// ZD-001: Canonical run, energy bound every step
    Canonical,

    /// ZD-002: Live tips reproduced by independent replay
    Replay,

    /// ZD-003: Chain -> ring -> grid swaps, per-segment bound and replay
    TopologySwap,

    /// ZD-004: Float baseline drifts far beyond the fixed-point run
    BaselineDrift,

    /// ZD-005: Non-square grid leaves the remainder nodes free
    GridRemainder,

    /// ZD-006: Rewind reproduces the recorded tip and drops later swaps
    Rewind,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Canonical,
            ScenarioId::Replay,
            ScenarioId::TopologySwap,
            ScenarioId::BaselineDrift,
            ScenarioId::GridRemainder,
            ScenarioId::Rewind,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Canonical => "canonical",
            ScenarioId::Replay => "replay",
            ScenarioId::TopologySwap => "topology_swap",
            ScenarioId::BaselineDrift => "baseline_drift",
            ScenarioId::GridRemainder => "grid_remainder",
            ScenarioId::Rewind => "rewind",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Canonical => "Velocity-Verlet run, |dH| within tolerance at every step",
            ScenarioId::Replay => "Tips at start, midpoint and end reproduced from the seed",
            ScenarioId::TopologySwap => "Cycle chain/ring/grid, bound per segment, replay with history",
            ScenarioId::BaselineDrift => "Explicit-Euler float run drifts 100x more than fixed point",
            ScenarioId::GridRemainder => "Nodes beyond floor(sqrt N)^2 stay edge-free and move freely",
            ScenarioId::Rewind => "Rewind to midpoint reproduces the tip and truncates later swaps",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" | "zd-001" => Ok(ScenarioId::Canonical),
            "replay" | "zd-002" => Ok(ScenarioId::Replay),
            "topology_swap" | "swap" | "zd-003" => Ok(ScenarioId::TopologySwap),
            "baseline_drift" | "baseline" | "zd-004" => Ok(ScenarioId::BaselineDrift),
            "grid_remainder" | "zd-005" => Ok(ScenarioId::GridRemainder),
            "rewind" | "zd-006" => Ok(ScenarioId::Rewind),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
