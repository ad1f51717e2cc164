//! Persisted connection attributes carried by Parameters.

use crate::store::Gid;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

/// The kind of link a structural edit released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    /// A single Reference holder reading its target.
    Reference,
    /// One entry of a Reference List.
    ReferenceList,
    /// A Tree Function reading an INPUT, or an OUTPUT written by its function.
    TreeFunction,
    /// A scalar reading a Variable named in its expression or evaluator binding.
    Evaluator,
}

/// A named computation bound to declared INPUT and OUTPUT Parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionBinding {
    pub guid: Uuid,
    pub inputs: Vec<Gid>,
    pub outputs: Vec<Gid>,
}

impl FunctionBinding {
    pub fn endpoints(&self) -> impl Iterator<Item = &Gid> + '_ {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Explicit dependency list of an expression-driven scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorBinding {
    pub inputs: Vec<Gid>,
}
