//! context.rs
//! The Execution Context owns the cached dependency graph and answers
//! observer queries against it.
//!
//! The graph is replaced as a whole on every rebuild. A snapshot taken when a
//! transaction opens lets an abort discard rebuilds made inside it.

use super::engine::ExecutionEngine;
use super::functions::FunctionRegistry;
use super::ledger::{ComputationError, Ledger};
use crate::analysis::{self, DependencyReport, GraphState};
use crate::config::Settings;
use crate::graph::{builder, DependencyGraph};
use crate::store::{Document, Gid, NodeId};
use log::info;

#[derive(Debug)]
pub struct ExecutionContext {
    graph: DependencyGraph,
    frozen: bool,
    settings: Settings,
    registry: FunctionRegistry,
    saved: Option<DependencyGraph>,
}

impl Default for ExecutionContext {
    fn default() -> Self { Self::new(Settings::default()) }
}

impl ExecutionContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            graph: DependencyGraph::new(),
            frozen: settings.freeze_graph,
            settings,
            registry: FunctionRegistry::with_builtins(),
            saved: None,
        }
    }

    pub fn settings(&self) -> &Settings { &self.settings }
    pub fn graph(&self) -> &DependencyGraph { &self.graph }
    pub fn registry(&self) -> &FunctionRegistry { &self.registry }
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry { &mut self.registry }

    // --- Rebuild ---

    /// Rescans `doc` and swaps in the new graph. Returns false while frozen.
    pub fn update_dependencies(&mut self, doc: &Document) -> bool {
        if self.frozen {
            return false;
        }
        self.graph = builder::build_with_depth(doc, self.settings.max_expression_depth);
        info!(
            "Dependencies updated: {} parameters, {} connections",
            self.graph.vertex_count(),
            self.graph.edge_count()
        );
        true
    }

    pub fn freeze(&mut self) { self.frozen = true; }
    pub fn unfreeze(&mut self) { self.frozen = false; }
    pub fn is_frozen(&self) -> bool { self.frozen }

    pub(crate) fn begin_transaction(&mut self) {
        self.saved = Some(self.graph.clone());
    }

    pub(crate) fn end_transaction(&mut self) {
        self.saved = None;
    }

    pub(crate) fn rollback(&mut self) {
        if let Some(graph) = self.saved.take() {
            self.graph = graph;
        }
    }

    // --- Analysis ---

    pub fn check_dependency_graph(&self) -> GraphState {
        analysis::check_dependency_graph(&self.graph)
    }

    pub fn cyclic_parameters(&self) -> Vec<Gid> {
        analysis::cyclic_parameters(&self.graph, self.settings.enrich_cycles)
    }

    pub fn analyze(&self) -> DependencyReport {
        analysis::analyze(&self.graph, self.settings.enrich_cycles)
    }

    // --- Observer queries ---

    pub fn input_readers(&self, gid: Gid) -> Vec<Gid> { self.graph.input_readers(gid) }
    pub fn output_writers(&self, gid: Gid) -> Vec<Gid> { self.graph.output_writers(gid) }
    pub fn referrers(&self, gid: Gid) -> Vec<Gid> { self.graph.referrers(gid) }

    /// Readers on other Nodes of any Parameter of `node`.
    pub fn node_input_readers(&self, doc: &Document, node: NodeId) -> Vec<Gid> {
        match doc.node(node) {
            Some(n) => self.graph.node_input_readers(node, n.gids()),
            None => Vec::new(),
        }
    }

    /// Functions on other Nodes writing into any Parameter of `node`.
    pub fn node_output_writers(&self, doc: &Document, node: NodeId) -> Vec<Gid> {
        match doc.node(node) {
            Some(n) => self.graph.node_output_writers(node, n.gids()),
            None => Vec::new(),
        }
    }

    pub fn has_connected_evaluator(&self, gid: Gid) -> bool { self.graph.has_live_evaluator(gid) }

    // --- Execution ---

    /// Runs every connected function once. `doc` must have an open transaction.
    pub fn execute(&self, doc: &mut Document) -> Result<Ledger, ComputationError> {
        let mut ledger = Ledger::new();
        ExecutionEngine::new(&self.graph, &self.registry, self.settings.max_expression_depth)
            .run(doc, &mut ledger)?;
        Ok(ledger)
    }
}
