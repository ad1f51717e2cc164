//! Structural analysis of the dependency graph.
pub mod cycles;
pub mod topology;

pub use cycles::{analyze, check_dependency_graph, cyclic_parameters, DependencyReport, GraphState};
