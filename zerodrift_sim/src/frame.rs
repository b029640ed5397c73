//! Read-only per-frame view for rendering and sonification consumers.
//!
//! A frame is derived from a session and never written back. Renderers
//! place nodes from `positions`, draw `edges` and print the energy readout;
//! the sonification consumer only reads `tone_hz`.

use serde::{Deserialize, Serialize};
use zerodrift_core::{HashTip, TopologyMode};

/// Base tone with the drift reference off.
pub const BASE_TONE_HZ: f64 = 440.0;

/// Hz added per unit of relative baseline drift.
pub const TONE_HZ_PER_DRIFT: f64 = 480.0;

/// Tone for the current frame.
///
/// Stays at the base tone while the float baseline is off: the fixed-point
/// run has nothing audible to show.
pub fn tone_hz(baseline_drift: Option<f64>) -> f64 {
    match baseline_drift {
        Some(drift) => BASE_TONE_HZ + drift.abs() * TONE_HZ_PER_DRIFT,
        None => BASE_TONE_HZ,
    }
}

/// Energy readout of the float baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineReadout {
    /// Baseline `H`
    pub energy: f64,

    /// `|H - H_enable| / H_enable`, where `H_enable` is the energy when the
    /// baseline was switched on
    pub relative_drift: f64,
}

/// One frame of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameView {
    pub step: u64,

    pub topology_mode: TopologyMode,

    /// Node positions as floats, for placement only
    pub positions: Vec<f64>,

    /// Canonical edge list
    pub edges: Vec<(usize, usize)>,

    /// Fixed-point `H` as a float
    pub energy: f64,

    /// Exact `H - H_segment`, as a float
    pub delta_h: f64,

    /// `|dH / H_segment|`
    pub relative_drift: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<BaselineReadout>,

    pub tone_hz: f64,

    /// Tip for this exact step, if one has been computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_tip: Option<HashTip>,

    /// `Some(true)` only after an independent replay reproduced `hash_tip`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_flat_without_baseline() {
        assert_eq!(tone_hz(None), 440.0);
    }

    #[test]
    fn test_tone_rises_with_baseline_drift() {
        assert_eq!(tone_hz(Some(0.0)), 440.0);
        assert_eq!(tone_hz(Some(0.5)), 680.0);
        assert_eq!(tone_hz(Some(-0.5)), 680.0);
    }
}
