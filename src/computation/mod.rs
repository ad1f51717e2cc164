//! Execution Context and Tree Function execution.
pub mod context;
pub mod engine;
pub mod functions;
pub mod ledger;

pub use context::ExecutionContext;
pub use engine::ExecutionEngine;
pub use functions::{
    Argument, ClosureFunction, FunctionCall, FunctionRegistry, RealEvaluatorFunc, TreeFunction, REAL_EVALUATOR_GUID,
};
pub use ledger::{ComputationError, Ledger};
