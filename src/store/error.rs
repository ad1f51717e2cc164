//! Defines the error types for the store module.
use super::types::{Gid, NodeId, ParamKind, ParamTag, PartitionId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("No open transaction")]
    NoOpenTransaction,
    #[error("A transaction is already open")]
    TransactionAlreadyOpen,
    #[error("Unknown node {0}")]
    UnknownNode(NodeId),
    #[error("Unknown partition {0:?}")]
    UnknownPartition(PartitionId),
    #[error("Unknown parameter {0}")]
    UnknownParameter(Gid),
    #[error("Node {node} already has a parameter tagged {tag}")]
    DuplicateTag { node: NodeId, tag: ParamTag },
    #[error("Parameter {gid} is {actual}, expected {expected}")]
    KindMismatch { gid: Gid, expected: ParamKind, actual: ParamKind },
    #[error("Parameter {0} cannot carry an expression")]
    NotExpressible(Gid),
    #[error("Tree function at {0} needs at least one input")]
    EmptyFunctionInputs(Gid),
    #[error("Node {0} is not a variable")]
    NotAVariable(NodeId),
    #[error("Variable {0} must keep its value parameter")]
    VariableValueRequired(NodeId),
    #[error("Variables hold Real, Int or Bool values, got {0}")]
    NonScalarVariable(ParamKind),
    #[error("Variable '{0}' already exists")]
    DuplicateVariable(String),
    #[error("'{0}' is not a valid variable name")]
    InvalidVariableName(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("I/O failed: {0}")]
    Io(String),
}
