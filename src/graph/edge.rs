//! Defines the `Edge` type, a Reader→Writer dependency between two Parameters.

use crate::store::Gid;

/// Describes which attribute produced a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// A single Reference holder reading its target.
    Reference,
    /// One entry of a Reference List reading its target.
    ReferenceList,
    /// A Tree Function reading one of its INPUT Parameters.
    /// Example: `K.Func -> D.Real` for a function on K taking `D.Real` as input.
    FunctionInput,
    /// An OUTPUT Parameter written by its Tree Function.
    /// Example: `K.Real -> K.Func`.
    FunctionOutput,
    /// A scalar reading a Variable named in its expression or evaluator binding.
    Evaluator,
}

/// The reader depends on the writer: it consumes the value the writer supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub reader: Gid,
    pub writer: Gid,
    pub kind: EdgeKind,
}
