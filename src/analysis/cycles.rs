//! Cycle detection over the Reader→Writer graph.
//!
//! A Reader depends on its Writers; a cycle means some Parameter transitively
//! depends on itself. A Parameter reading itself is the one-vertex cycle.

use crate::graph::DependencyGraph;
use crate::store::Gid;
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitmask describing the analyzed graph. Flags may co-occur; test with `contains`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphState(u32);

impl GraphState {
    pub const UNDEFINED: Self = Self(0x1);
    pub const OK: Self = Self(0x2);
    pub const HAS_LOOPS: Self = Self(0x4);
    pub const NO_GRAPH: Self = Self(0x8);

    pub const fn empty() -> Self { Self(0) }
    pub const fn bits(&self) -> u32 { self.0 }

    pub fn contains(&self, flags: Self) -> bool { self.0 & flags.0 == flags.0 && flags.0 != 0 }
    pub fn is_ok(&self) -> bool { self.contains(Self::OK) }
    pub fn has_loops(&self) -> bool { self.contains(Self::HAS_LOOPS) }
}

impl Default for GraphState {
    fn default() -> Self { Self::UNDEFINED }
}

impl BitOr for GraphState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

impl BitOrAssign for GraphState {
    fn bitor_assign(&mut self, rhs: Self) { self.0 |= rhs.0; }
}

impl BitAnd for GraphState {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self { Self(self.0 & rhs.0) }
}

impl fmt::Debug for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::UNDEFINED, "UNDEFINED"),
            (Self::OK, "OK"),
            (Self::HAS_LOOPS, "HAS_LOOPS"),
            (Self::NO_GRAPH, "NO_GRAPH"),
        ];
        let set: Vec<&str> = names.iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, n)| *n).collect();
        write!(f, "GraphState({})", set.join(" | "))
    }
}

/// Result of a full analysis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub state: GraphState,
    /// Parameters on a cycle, optionally followed by everything reading from them.
    pub cyclic: Vec<Gid>,
}

/// Never fails: an empty graph reports `OK | NO_GRAPH`.
pub fn check_dependency_graph(graph: &DependencyGraph) -> GraphState {
    if graph.is_empty() {
        return GraphState::OK | GraphState::NO_GRAPH;
    }
    if cyclic_indices(graph).is_empty() {
        GraphState::OK
    } else {
        GraphState::HAS_LOOPS
    }
}

/// Parameters lying on a cycle, in vertex order. With `enrich`, every
/// Parameter that transitively reads from one of them is included as well.
pub fn cyclic_parameters(graph: &DependencyGraph, enrich: bool) -> Vec<Gid> {
    let mut on_cycle = cyclic_indices(graph);
    if enrich && !on_cycle.is_empty() {
        let seeds: Vec<Gid> = on_cycle.iter().map(|&i| graph.vertices()[i]).collect();
        on_cycle.extend(
            graph
                .downstream_from(&seeds)
                .into_iter()
                .filter_map(|g| graph.vertex_index(g)),
        );
        on_cycle.sort_unstable();
        on_cycle.dedup();
    }
    on_cycle.into_iter().map(|i| graph.vertices()[i]).collect()
}

pub fn analyze(graph: &DependencyGraph, enrich: bool) -> DependencyReport {
    DependencyReport {
        state: check_dependency_graph(graph),
        cyclic: cyclic_parameters(graph, enrich),
    }
}

/// Vertex indices belonging to a strongly connected component with more than
/// one member, or carrying a self-loop. Sorted ascending.
fn cyclic_indices(graph: &DependencyGraph) -> Vec<usize> {
    let pg = graph.to_petgraph();
    let mut out: Vec<usize> = tarjan_scc(&pg)
        .into_iter()
        .filter(|scc| scc.len() > 1 || has_self_loop(&pg, scc[0]))
        .flatten()
        .map(|n| n.index())
        .collect();
    out.sort_unstable();
    out
}

fn has_self_loop<N, E>(pg: &petgraph::graph::DiGraph<N, E>, n: NodeIndex) -> bool {
    pg.find_edge(n, n).is_some()
}
