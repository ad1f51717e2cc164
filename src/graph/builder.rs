//! builder.rs
//! Full rescan of a `Document` into a `DependencyGraph`.
//!
//! Emission order: Nodes in document order, Parameters in schema order, then
//! per Parameter its Reference, Reference List, Tree Function and Evaluator
//! links in stored order. Links to Parameters that do not resolve are skipped.

use super::dag::DependencyGraph;
use super::edge::EdgeKind;
use crate::expression::{Expression, DEFAULT_MAX_DEPTH};
use crate::store::{Document, Gid, Parameter, ParamValue};
use log::{debug, warn};

pub fn build(doc: &Document) -> DependencyGraph {
    build_with_depth(doc, DEFAULT_MAX_DEPTH)
}

/// Same as `build`, with an explicit expression nesting limit.
pub fn build_with_depth(doc: &Document, max_depth: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new();

    for node in doc.nodes() {
        for param in node.params() {
            let holder = node.gid(param.tag);
            emit_links(doc, &mut graph, holder, param);
            if param.kind().is_scalar() {
                emit_evaluator(doc, &mut graph, holder, param, max_depth);
            }
        }
    }

    debug!(
        "Dependency graph rebuilt: {} vertices, {} edges",
        graph.vertex_count(),
        graph.edge_count()
    );
    graph
}

fn emit_links(doc: &Document, graph: &mut DependencyGraph, holder: Gid, param: &Parameter) {
    let live = |g: &&Gid| doc.resolve(**g).is_some();
    match param.value() {
        ParamValue::Reference(Some(target)) if doc.resolve(*target).is_some() => {
            graph.add_edge(holder, *target, EdgeKind::Reference);
        }
        ParamValue::ReferenceList(targets) => {
            for target in targets.iter().filter(live) {
                graph.add_edge(holder, *target, EdgeKind::ReferenceList);
            }
        }
        ParamValue::TreeFunction(Some(binding)) => {
            for input in binding.inputs.iter().filter(live) {
                graph.add_edge(holder, *input, EdgeKind::FunctionInput);
            }
            for output in binding.outputs.iter().filter(live) {
                graph.add_edge(*output, holder, EdgeKind::FunctionOutput);
            }
        }
        _ => {}
    }
}

/// Emits one edge per resolved dependency and records whether the evaluator is live.
///
/// Live means every declared dependency and every identifier in the expression
/// resolves, and there is at least one of them.
fn emit_evaluator(doc: &Document, graph: &mut DependencyGraph, holder: Gid, param: &Parameter, max_depth: usize) {
    if param.evaluator().is_none() && param.eval_string().is_none() {
        return;
    }
    let mut live = true;
    let mut resolved = 0usize;

    if let Some(binding) = param.evaluator() {
        for dep in &binding.inputs {
            if doc.resolve(*dep).is_some() {
                graph.add_edge(holder, *dep, EdgeKind::Evaluator);
                resolved += 1;
            } else {
                live = false;
            }
        }
    }

    if let Some(src) = param.eval_string() {
        match Expression::parse_with_depth(src, max_depth) {
            Ok(expr) => {
                for name in expr.variables() {
                    match doc.variable_gid(name).filter(|g| doc.resolve(*g).is_some()) {
                        Some(var) => {
                            graph.add_edge(holder, var, EdgeKind::Evaluator);
                            resolved += 1;
                        }
                        None => live = false,
                    }
                }
            }
            Err(e) => {
                warn!("Expression '{}' on {} does not parse: {}", src, holder, e);
                live = false;
            }
        }
    }

    let live = live && resolved > 0;
    if !live {
        debug!("Evaluator on {} is dead", holder);
    }
    graph.mark_evaluator(holder, live);
}
