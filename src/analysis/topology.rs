use crate::graph::DependencyGraph;
use crate::store::Gid;

/// Performs a Topological Sort using Depth-First Search (DFS).
///
/// Returns the graph's Parameters ordered so that every Writer appears before
/// the Readers consuming it. This is the order in which functions run.
pub fn sort(graph: &DependencyGraph) -> Result<Vec<Gid>, String> {
    let count = graph.vertex_count();
    let mut order = Vec::with_capacity(count);
    let mut state = vec![VisitState::None; count];

    // Iterate 0..count so isolated vertices are emitted too. Edges point
    // Reader -> Writer, so DFS post-order yields [Writer, ..., Reader].
    for i in 0..count {
        if state[i] == VisitState::None {
            visit(i, graph, &mut state, &mut order)?;
        }
    }

    Ok(order.into_iter().map(|i| graph.vertices()[i]).collect())
}

#[derive(Clone, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // Used for cycle detection
    Visited,
}

fn visit(
    idx: usize,
    graph: &DependencyGraph,
    state: &mut Vec<VisitState>,
    order: &mut Vec<usize>,
) -> Result<(), String> {
    match state[idx] {
        VisitState::Visited => return Ok(()),
        VisitState::Visiting => {
            return Err(format!("Cycle detected involving parameter {}", graph.vertices()[idx]))
        }
        VisitState::None => state[idx] = VisitState::Visiting,
    }

    for writer in graph.writer_indices(idx) {
        visit(writer, graph, state, order)?;
    }

    state[idx] = VisitState::Visited;
    order.push(idx);
    Ok(())
}
