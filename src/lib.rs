// Crate root: the Active Data dependency graph.
// A transactional tree of Nodes and typed Parameters, the connections layered
// on it, and the Execution Context that keeps a Reader→Writer graph in sync.

pub mod analysis;
pub mod computation;
pub mod config;
pub mod connection;
pub mod conversion;
pub mod expression;
pub mod graph;
pub mod model;
pub mod store;

pub use analysis::GraphState;
pub use computation::{ComputationError, ExecutionContext, FunctionRegistry, Ledger, TreeFunction};
pub use config::Settings;
pub use conversion::ConversionBatch;
pub use expression::{Expression, ExpressionError};
pub use graph::DependencyGraph;
pub use model::{Model, Transaction};
pub use store::{Document, Gid, NodeId, ParamTag, ParamValue, Parameter, StoreError};

#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
