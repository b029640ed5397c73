//! Coupling graphs and their canonical form.
//!
//! Force and energy sums visit edges in list order. Fixed-point rounding
//! after `mul`/`div` makes the exact result depend on that order, so every
//! topology is canonicalized once at build time: each edge is stored as
//! `(min, max)` and the list is sorted ascending by `(a, b)`. Parallel edges
//! (the two springs of a 2-node ring) are kept; self-loops are dropped.

use crate::error::{EngineError, EngineResult};
use crate::fixed::Fx;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Topology variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyMode {
    /// Path graph `0 - 1 - ... - N-1`.
    #[default]
    Chain,

    /// Cycle, the chain closed by `(N-1, 0)`.
    Ring,

    /// Nearest-neighbour mesh on the largest `S x S` square with `S*S <= N`.
    /// Nodes `>= S*S` stay isolated.
    Grid,
}

impl TopologyMode {
    /// Returns all modes in swap order.
    pub fn all() -> [TopologyMode; 3] {
        [TopologyMode::Chain, TopologyMode::Ring, TopologyMode::Grid]
    }

    /// Returns the mode name.
    pub fn name(&self) -> &'static str {
        match self {
            TopologyMode::Chain => "chain",
            TopologyMode::Ring => "ring",
            TopologyMode::Grid => "grid",
        }
    }

    /// Next mode in the chain -> ring -> grid -> chain cycle.
    pub fn next(&self) -> TopologyMode {
        match self {
            TopologyMode::Chain => TopologyMode::Ring,
            TopologyMode::Ring => TopologyMode::Grid,
            TopologyMode::Grid => TopologyMode::Chain,
        }
    }
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TopologyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chain" | "path" => Ok(TopologyMode::Chain),
            "ring" | "cycle" => Ok(TopologyMode::Ring),
            "grid" | "mesh" => Ok(TopologyMode::Grid),
            _ => Err(EngineError::invalid(format!("unknown topology mode: {}", s))),
        }
    }
}

/// Unordered pair of distinct nodes, stored as `a < b`.
///
/// Field order makes the derived `Ord` compare `(a, b)` lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    a: usize,
    b: usize,
}

impl Edge {
    /// Canonical edge between `i` and `j`; `None` for a self-loop.
    pub fn new(i: usize, j: usize) -> Option<Self> {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => Some(Self { a: i, b: j }),
            std::cmp::Ordering::Greater => Some(Self { a: j, b: i }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn a(&self) -> usize {
        self.a
    }

    pub fn b(&self) -> usize {
        self.b
    }
}

/// Canonical coupling graph with per-edge spring constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    mode: TopologyMode,
    nodes: usize,
    edges: Vec<Edge>,
    /// Spring constant per edge, parallel to `edges`.
    stiffness: Vec<Fx>,
}

impl Topology {
    /// Builds the canonical topology with unit spring constants.
    pub fn build(nodes: usize, mode: TopologyMode) -> Self {
        let edges = canonicalize(raw_edges(nodes, mode));
        let stiffness = vec![Fx::ONE; edges.len()];
        Self { mode, nodes, edges, stiffness }
    }

    /// Builds the canonical topology with a uniform spring constant `k`.
    ///
    /// `k` must be positive; it is rejected here rather than at step time.
    pub fn build_with_stiffness(nodes: usize, mode: TopologyMode, k: Fx) -> EngineResult<Self> {
        if !k.is_positive() {
            return Err(EngineError::invalid(format!(
                "spring constant must be positive, got {}",
                k
            )));
        }
        let mut topology = Self::build(nodes, mode);
        topology.stiffness.iter_mut().for_each(|s| *s = k);
        Ok(topology)
    }

    pub fn mode(&self) -> TopologyMode {
        self.mode
    }

    /// Number of nodes the topology was built for.
    pub fn node_count(&self) -> usize {
        self.nodes
    }

    /// Canonical edge list (read-only; rendering consumers draw from this).
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edges with their spring constants, in canonical order.
    pub fn springs(&self) -> impl Iterator<Item = (Edge, Fx)> + '_ {
        self.edges.iter().copied().zip(self.stiffness.iter().copied())
    }

    /// True if every edge has `a < b` and the list is sorted ascending.
    pub fn is_canonical(&self) -> bool {
        self.edges.iter().all(|e| e.a < e.b) && self.edges.windows(2).all(|w| w[0] <= w[1])
    }

    /// Node degrees.
    pub fn degrees(&self) -> Vec<usize> {
        let mut degree = vec![0; self.nodes];
        for edge in &self.edges {
            degree[edge.a] += 1;
            degree[edge.b] += 1;
        }
        degree
    }

    /// Nodes that participate in no edge (the grid remainder, or N = 1).
    pub fn isolated_nodes(&self) -> Vec<usize> {
        self.degrees()
            .into_iter()
            .enumerate()
            .filter(|(_, d)| *d == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Edges in construction order, before canonicalization.
fn raw_edges(nodes: usize, mode: TopologyMode) -> Vec<(usize, usize)> {
    match mode {
        TopologyMode::Chain => (1..nodes).map(|i| (i - 1, i)).collect(),
        TopologyMode::Ring => (0..nodes).map(|i| (i, (i + 1) % nodes)).collect(),
        TopologyMode::Grid => {
            let side = integer_sqrt(nodes);
            let mut edges = Vec::with_capacity(2 * side * side);
            for y in 0..side {
                for x in 0..side {
                    let i = y * side + x;
                    if x + 1 < side {
                        edges.push((i, i + 1));
                    }
                    if y + 1 < side {
                        edges.push((i, i + side));
                    }
                }
            }
            edges
        }
    }
}

/// Orders each pair, drops self-loops, sorts by `(a, b)`. Duplicates stay.
pub fn canonicalize(raw: impl IntoIterator<Item = (usize, usize)>) -> Vec<Edge> {
    let mut edges: Vec<Edge> = raw.into_iter().filter_map(|(i, j)| Edge::new(i, j)).collect();
    edges.sort_unstable();
    edges
}

/// `floor(sqrt(n))`: seeded from the float root, then corrected in integers.
pub fn integer_sqrt(n: usize) -> usize {
    let mut s = (n as f64).sqrt() as usize;
    while s * s > n {
        s -= 1;
    }
    while (s + 1) * (s + 1) <= n {
        s += 1;
    }
    s
}

/// A topology change applied before the step that leaves `at_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySwap {
    pub at_step: u64,
    pub mode: TopologyMode,
}

/// Full topology history of a run: the initial mode plus every swap.
///
/// This is what a replay needs in addition to `(seed, N)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySchedule {
    initial: TopologyMode,
    swaps: Vec<TopologySwap>,
}

impl TopologySchedule {
    /// Schedule with no swaps.
    pub fn new(initial: TopologyMode) -> Self {
        Self {
            initial,
            swaps: Vec::new(),
        }
    }

    /// Builds a schedule from recorded swaps, rejecting out-of-order entries.
    pub fn from_swaps(initial: TopologyMode, swaps: Vec<TopologySwap>) -> EngineResult<Self> {
        let schedule = Self { initial, swaps };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn initial(&self) -> TopologyMode {
        self.initial
    }

    pub fn swaps(&self) -> &[TopologySwap] {
        &self.swaps
    }

    /// Appends a swap. `at_step` may not precede the last recorded swap.
    pub fn record(&mut self, at_step: u64, mode: TopologyMode) -> EngineResult<()> {
        if let Some(last) = self.swaps.last() {
            if at_step < last.at_step {
                return Err(EngineError::invalid(format!(
                    "swap at step {} recorded after swap at step {}",
                    at_step, last.at_step
                )));
            }
        }
        self.swaps.push(TopologySwap { at_step, mode });
        Ok(())
    }

    /// Swaps to apply before stepping from `step`, in recorded order.
    pub fn swaps_at(&self, step: u64) -> impl Iterator<Item = &TopologySwap> + '_ {
        self.swaps.iter().filter(move |s| s.at_step == step)
    }

    /// Mode used by the step that leaves `step`.
    pub fn mode_at(&self, step: u64) -> TopologyMode {
        self.swaps
            .iter()
            .take_while(|s| s.at_step <= step)
            .last()
            .map(|s| s.mode)
            .unwrap_or(self.initial)
    }

    /// Drops every swap at or after `step` (history diverges on rewind).
    pub fn truncate_from(&mut self, step: u64) {
        self.swaps.retain(|s| s.at_step < step);
    }

    /// Checks that swaps are in non-decreasing step order.
    pub fn validate(&self) -> EngineResult<()> {
        if self.swaps.windows(2).any(|w| w[1].at_step < w[0].at_step) {
            return Err(EngineError::invalid("topology swaps are not in step order"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pairs(t: &Topology) -> Vec<(usize, usize)> {
        t.edges().iter().map(|e| (e.a(), e.b())).collect()
    }

    #[test]
    fn test_chain() {
        let t = Topology::build(4, TopologyMode::Chain);
        assert_eq!(pairs(&t), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_ring_closing_edge_is_canonical() {
        let t = Topology::build(4, TopologyMode::Ring);
        assert_eq!(pairs(&t), vec![(0, 1), (0, 3), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_small_ring_degenerates() {
        // N = 1: the only edge is a self-loop
        assert!(Topology::build(1, TopologyMode::Ring).is_empty());
        // N = 2: (0,1) and (1,0) are two parallel springs
        let t = Topology::build(2, TopologyMode::Ring);
        assert_eq!(pairs(&t), vec![(0, 1), (0, 1)]);
        assert!(t.is_canonical());
        assert_eq!(t.degrees(), vec![2, 2]);
    }

    #[test]
    fn test_grid_3x3() {
        let t = Topology::build(9, TopologyMode::Grid);
        assert_eq!(
            pairs(&t),
            vec![
                (0, 1), (0, 3), (1, 2), (1, 4), (2, 5), (3, 4),
                (3, 6), (4, 5), (4, 7), (5, 8), (6, 7), (7, 8),
            ]
        );
    }

    #[test]
    fn test_grid_remainder_is_isolated() {
        // S = 3, nodes 9 and 10 take no part
        let t = Topology::build(11, TopologyMode::Grid);
        assert_eq!(t.len(), 12);
        assert_eq!(t.isolated_nodes(), vec![9, 10]);
        assert_eq!(t.node_count(), 11);
    }

    #[test]
    fn test_integer_sqrt() {
        for n in 0..2000usize {
            let s = integer_sqrt(n);
            assert!(s * s <= n && (s + 1) * (s + 1) > n);
        }
    }

    #[test]
    fn test_canonical_for_listed_sizes() {
        for mode in TopologyMode::all() {
            for n in [1usize, 2, 8, 64, 100] {
                let t = Topology::build(n, mode);
                assert!(t.is_canonical(), "{} N={}", mode, n);
                assert!(t.edges().iter().all(|e| e.b() < n));
            }
        }
    }

    #[test]
    fn test_stiffness_validation() {
        assert!(Topology::build_with_stiffness(8, TopologyMode::Chain, Fx::ZERO).is_err());
        let t = Topology::build_with_stiffness(8, TopologyMode::Chain, Fx::TWO).unwrap();
        assert!(t.springs().all(|(_, k)| k == Fx::TWO));
    }

    #[test]
    fn test_mode_cycle_and_parse() {
        assert_eq!(TopologyMode::Chain.next(), TopologyMode::Ring);
        assert_eq!(TopologyMode::Ring.next(), TopologyMode::Grid);
        assert_eq!(TopologyMode::Grid.next(), TopologyMode::Chain);
        assert_eq!("RING".parse::<TopologyMode>().unwrap(), TopologyMode::Ring);
        assert!("torus".parse::<TopologyMode>().is_err());
    }

    #[test]
    fn test_schedule_mode_at() {
        let mut s = TopologySchedule::new(TopologyMode::Chain);
        s.record(10, TopologyMode::Ring).unwrap();
        s.record(20, TopologyMode::Grid).unwrap();
        s.record(20, TopologyMode::Chain).unwrap();

        assert_eq!(s.mode_at(0), TopologyMode::Chain);
        assert_eq!(s.mode_at(9), TopologyMode::Chain);
        assert_eq!(s.mode_at(10), TopologyMode::Ring);
        assert_eq!(s.mode_at(19), TopologyMode::Ring);
        assert_eq!(s.mode_at(20), TopologyMode::Chain);
        assert_eq!(s.swaps_at(20).count(), 2);

        assert!(s.record(5, TopologyMode::Grid).is_err());

        s.truncate_from(20);
        assert_eq!(s.swaps().len(), 1);
        assert_eq!(s.mode_at(100), TopologyMode::Ring);
    }

    #[test]
    fn test_schedule_rejects_unordered_swaps() {
        let swaps = vec![
            TopologySwap { at_step: 5, mode: TopologyMode::Ring },
            TopologySwap { at_step: 3, mode: TopologyMode::Grid },
        ];
        assert!(TopologySchedule::from_swaps(TopologyMode::Chain, swaps).is_err());
    }

    proptest! {
        #[test]
        fn prop_canonicalize_any_order(raw in proptest::collection::vec((0usize..50, 0usize..50), 0..200)) {
            let edges = canonicalize(raw.clone());
            prop_assert!(edges.iter().all(|e| e.a() < e.b()));
            prop_assert!(edges.windows(2).all(|w| w[0] <= w[1]));
            let self_loops = raw.iter().filter(|(i, j)| i == j).count();
            prop_assert_eq!(edges.len(), raw.len() - self_loops);

            // construction order does not matter
            let mut reversed = raw;
            reversed.reverse();
            prop_assert_eq!(canonicalize(reversed), edges);
        }

        #[test]
        fn prop_build_is_canonical(n in 1usize..300, mode_idx in 0usize..3) {
            let t = Topology::build(n, TopologyMode::all()[mode_idx]);
            prop_assert!(t.is_canonical());
        }
    }
}
