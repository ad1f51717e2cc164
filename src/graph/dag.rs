//! dag.rs
//! Reader→Writer dependency graph over Parameters.
//! Vertices and edges are kept in emission order so that observer queries are
//! reproducible for a given document state.

use super::edge::{Edge, EdgeKind};
use crate::store::{Gid, NodeId};
use petgraph::graph::{DiGraph, NodeIndex};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;

type EdgeList = SmallVec<[u32; 4]>;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    vertices: Vec<Gid>,
    index: HashMap<Gid, u32>,
    edges: Vec<Edge>,

    // Adjacency as edge indices, ascending (= emission order)
    reads: Vec<EdgeList>,
    read_by: Vec<EdgeList>,
    pairs: HashSet<(u32, u32)>,

    live_evaluators: HashSet<Gid>,
    dead_expressions: Vec<Gid>,
}

impl DependencyGraph {
    pub fn new() -> Self { Self::default() }

    pub fn vertex_count(&self) -> usize { self.vertices.len() }
    pub fn edge_count(&self) -> usize { self.edges.len() }
    pub fn is_empty(&self) -> bool { self.vertices.is_empty() }

    pub fn vertices(&self) -> &[Gid] { &self.vertices }
    pub fn edges(&self) -> &[Edge] { &self.edges }

    pub fn contains(&self, gid: Gid) -> bool { self.index.contains_key(&gid) }

    pub fn vertex_index(&self, gid: Gid) -> Option<usize> {
        self.index.get(&gid).map(|&i| i as usize)
    }

    // --- Construction ---

    fn intern(&mut self, gid: Gid) -> u32 {
        if let Some(&idx) = self.index.get(&gid) {
            return idx;
        }
        let idx = self.vertices.len() as u32;
        self.vertices.push(gid);
        self.index.insert(gid, idx);
        self.reads.push(EdgeList::new());
        self.read_by.push(EdgeList::new());
        idx
    }

    /// Adds `reader -> writer` unless that pair is already present.
    pub(crate) fn add_edge(&mut self, reader: Gid, writer: Gid, kind: EdgeKind) -> bool {
        let r = self.intern(reader);
        let w = self.intern(writer);
        if !self.pairs.insert((r, w)) {
            return false;
        }
        let e = self.edges.len() as u32;
        self.edges.push(Edge { reader, writer, kind });
        self.reads[r as usize].push(e);
        self.read_by[w as usize].push(e);
        true
    }

    pub(crate) fn mark_evaluator(&mut self, owner: Gid, live: bool) {
        if live {
            self.live_evaluators.insert(owner);
        } else {
            self.dead_expressions.push(owner);
        }
    }

    // --- Observer Queries ---

    /// Parameters that read from `gid`, in edge order.
    pub fn input_readers(&self, gid: Gid) -> Vec<Gid> {
        self.vertex_index(gid)
            .map(|v| self.read_by[v].iter().map(|&e| self.edges[e as usize].reader).collect())
            .unwrap_or_default()
    }

    /// Parameters `gid` reads from, in edge order.
    pub fn output_writers(&self, gid: Gid) -> Vec<Gid> {
        self.vertex_index(gid)
            .map(|v| self.reads[v].iter().map(|&e| self.edges[e as usize].writer).collect())
            .unwrap_or_default()
    }

    pub fn output_writers_of_kind(&self, gid: Gid, kind: EdgeKind) -> Vec<Gid> {
        let Some(v) = self.vertex_index(gid) else { return Vec::new() };
        self.reads[v]
            .iter()
            .map(|&e| &self.edges[e as usize])
            .filter(|edge| edge.kind == kind)
            .map(|edge| edge.writer)
            .collect()
    }

    /// Reference and Reference List holders targeting `gid`.
    pub fn referrers(&self, gid: Gid) -> Vec<Gid> {
        let Some(v) = self.vertex_index(gid) else { return Vec::new() };
        self.read_by[v]
            .iter()
            .map(|&e| &self.edges[e as usize])
            .filter(|edge| matches!(edge.kind, EdgeKind::Reference | EdgeKind::ReferenceList))
            .map(|edge| edge.reader)
            .collect()
    }

    /// Readers living on other Nodes of any Parameter in `params`.
    pub fn node_input_readers(&self, node: NodeId, params: impl IntoIterator<Item = Gid>) -> Vec<Gid> {
        let edges = self.collect_edges(params, &self.read_by);
        self.distinct(edges.iter().map(|&e| self.edges[e].reader).filter(|g| g.node != node))
    }

    /// Tree Functions on other Nodes writing OUTPUT into any Parameter in `params`.
    pub fn node_output_writers(&self, node: NodeId, params: impl IntoIterator<Item = Gid>) -> Vec<Gid> {
        let edges = self.collect_edges(params, &self.reads);
        self.distinct(
            edges
                .iter()
                .map(|&e| &self.edges[e])
                .filter(|edge| edge.kind == EdgeKind::FunctionOutput && edge.writer.node != node)
                .map(|edge| edge.writer),
        )
    }

    fn collect_edges(&self, params: impl IntoIterator<Item = Gid>, adjacency: &[EdgeList]) -> Vec<usize> {
        let mut edges: Vec<usize> = params
            .into_iter()
            .filter_map(|g| self.vertex_index(g))
            .flat_map(|v| adjacency[v].iter().map(|&e| e as usize))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    fn distinct(&self, gids: impl Iterator<Item = Gid>) -> Vec<Gid> {
        let mut seen = HashSet::new();
        gids.filter(|g| seen.insert(*g)).collect()
    }

    /// True when the last rebuild found a fully resolved evaluator on `gid`.
    pub fn has_live_evaluator(&self, gid: Gid) -> bool { self.live_evaluators.contains(&gid) }

    /// Scalars whose expression or evaluator binding failed to resolve.
    pub fn dead_expressions(&self) -> &[Gid] { &self.dead_expressions }

    // --- Graph Algorithms ---

    /// Vertex indices `v` reads from.
    pub(crate) fn writer_indices(&self, v: usize) -> impl Iterator<Item = usize> + '_ {
        self.reads[v].iter().map(move |&e| self.index[&self.edges[e as usize].writer] as usize)
    }

    /// Everything that transitively reads from one of `start` (inclusive).
    pub fn downstream_from(&self, start: &[Gid]) -> HashSet<Gid> {
        self.walk(start, |g| self.input_readers(g))
    }

    /// Everything one of `start` transitively reads from (inclusive).
    pub fn upstream_from(&self, start: &[Gid]) -> HashSet<Gid> {
        self.walk(start, |g| self.output_writers(g))
    }

    fn walk(&self, start: &[Gid], next: impl Fn(Gid) -> Vec<Gid>) -> HashSet<Gid> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(start.to_vec());
        while let Some(gid) = queue.pop_front() {
            if visited.insert(gid) {
                queue.extend(next(gid));
            }
        }
        visited
    }

    /// Copy into a petgraph graph; node indices match `vertices()`.
    pub fn to_petgraph(&self) -> DiGraph<Gid, EdgeKind> {
        let mut g = DiGraph::with_capacity(self.vertices.len(), self.edges.len());
        for &gid in &self.vertices {
            g.add_node(gid);
        }
        for edge in &self.edges {
            let r = self.index[&edge.reader];
            let w = self.index[&edge.writer];
            g.add_edge(NodeIndex::new(r as usize), NodeIndex::new(w as usize), edge.kind);
        }
        g
    }

    /// Graphviz rendering, one line per edge.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        for edge in &self.edges {
            let _ = writeln!(out, "  \"{}\" -> \"{}\" [label=\"{:?}\"];", edge.reader, edge.writer, edge.kind);
        }
        out.push_str("}\n");
        out
    }
}
