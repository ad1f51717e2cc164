//! A synchronous, single-threaded execution engine.
//!
//! Runs every connected Tree Function and live Evaluator once, Writers before
//! Readers, and writes the results back into the open transaction.
use super::functions::{Argument, FunctionCall, FunctionRegistry, REAL_EVALUATOR_GUID};
use super::ledger::{ComputationError, Ledger};
use crate::analysis::topology;
use crate::graph::{DependencyGraph, EdgeKind};
use crate::store::{Document, Gid};
use log::{debug, info, warn};
use std::collections::HashSet;
use uuid::Uuid;

enum Task {
    Function { guid: Uuid, inputs: Vec<Gid>, outputs: Vec<Gid> },
    Evaluator,
}

pub struct ExecutionEngine<'a> {
    graph: &'a DependencyGraph,
    registry: &'a FunctionRegistry,
    max_depth: usize,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(graph: &'a DependencyGraph, registry: &'a FunctionRegistry, max_depth: usize) -> Self {
        Self { graph, registry, max_depth }
    }

    /// Executes all owners in dependency order, recording one result per owner.
    ///
    /// Individual failures do not stop the pass: anything reading from a failed
    /// owner is skipped with `UpstreamError`. Only a missing transaction or a
    /// cyclic graph aborts the whole run.
    pub fn run(&self, doc: &mut Document, ledger: &mut Ledger) -> Result<(), ComputationError> {
        doc.ensure_open()?;
        let order = topology::sort(self.graph).map_err(|msg| {
            warn!("Refusing to execute: {}", msg);
            ComputationError::CycleDetected
        })?;

        let mut failed: HashSet<Gid> = HashSet::new();
        for gid in order {
            let upstream = self.graph.output_writers(gid).into_iter().find(|w| failed.contains(w));
            let Some(task) = self.task_for(doc, gid) else {
                // Plain Parameters only forward failures.
                if upstream.is_some() {
                    failed.insert(gid);
                }
                continue;
            };

            let result = match upstream {
                Some(upstream) => Err(ComputationError::UpstreamError { owner: gid, upstream }),
                None => self.run_task(doc, gid, &task),
            };
            if let Err(e) = &result {
                debug!("Execution of {} failed: {}", gid, e);
                failed.insert(gid);
            }
            ledger.insert(gid, result);
        }

        info!("Executed {} owners, {} failed", ledger.len(), ledger.failures().count());
        Ok(())
    }

    fn task_for(&self, doc: &Document, owner: Gid) -> Option<Task> {
        let param = doc.resolve(owner)?;
        match param.as_tree_function() {
            Some(binding) if doc.has_connected_function(owner) => Some(Task::Function {
                guid: binding.guid,
                inputs: binding.inputs.clone(),
                outputs: binding.outputs.clone(),
            }),
            _ if self.graph.has_live_evaluator(owner) => Some(Task::Evaluator),
            _ => None,
        }
    }

    fn run_task(&self, doc: &mut Document, owner: Gid, task: &Task) -> Result<(), ComputationError> {
        let (guid, inputs, outputs) = match task {
            Task::Function { guid, inputs, outputs } => (*guid, inputs.clone(), outputs.clone()),
            Task::Evaluator => (
                REAL_EVALUATOR_GUID,
                self.graph.output_writers_of_kind(owner, EdgeKind::Evaluator),
                vec![owner],
            ),
        };
        let driver = self
            .registry
            .get(guid)
            .ok_or(ComputationError::UnknownFunction { owner, guid })?;

        let results = {
            let doc: &Document = doc;
            let mut call = FunctionCall {
                owner,
                inputs: inputs
                    .iter()
                    .filter_map(|g| {
                        let param = doc.resolve(*g)?;
                        let name = doc.node(g.node).filter(|n| n.is_variable()).map(|n| n.name.as_str());
                        Some(Argument { gid: *g, name, value: param.value() })
                    })
                    .collect(),
                expression: doc.eval_string(owner),
                outputs: outputs
                    .iter()
                    .filter_map(|g| doc.resolve(*g).map(|p| (*g, p.value().clone())))
                    .collect(),
                max_depth: self.max_depth,
            };
            driver.execute(&mut call)?;
            call.outputs
        };

        for (gid, value) in results {
            doc.set_value(gid, value)?;
        }
        Ok(())
    }
}
