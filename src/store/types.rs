use serde::{Serialize, Deserialize};
use std::fmt;

use crate::connection::FunctionBinding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Position of a Parameter inside its owner's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ParamTag(pub u32);

impl fmt::Display for ParamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl PartitionId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Global identifier of a Parameter.
///
/// A GID stays valid as a value after its Node is deleted; resolving it
/// through the `Document` then simply misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gid {
    pub node: NodeId,
    pub tag: ParamTag,
}

impl Gid {
    pub fn new(node: NodeId, tag: ParamTag) -> Self { Self { node, tag } }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.tag)
    }
}

/// Tag of the single value Parameter every Variable Node carries.
pub const VARIABLE_VALUE: ParamTag = ParamTag(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Real,
    Int,
    Bool,
    Text,
    Reference,
    ReferenceList,
    TreeFunction,
}

impl ParamKind {
    /// Scalar kinds are the only ones that may carry an expression.
    pub fn is_scalar(&self) -> bool {
        matches!(self, ParamKind::Real | ParamKind::Int | ParamKind::Bool)
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Real => "Real",
            ParamKind::Int => "Int",
            ParamKind::Bool => "Bool",
            ParamKind::Text => "Text",
            ParamKind::Reference => "Reference",
            ParamKind::ReferenceList => "ReferenceList",
            ParamKind::TreeFunction => "TreeFunction",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Real(f64),
    Int(i32),
    Bool(bool),
    /// Opaque payload (names, serialized shapes, ...).
    Text(String),
    Reference(Option<Gid>),
    ReferenceList(Vec<Gid>),
    TreeFunction(Option<FunctionBinding>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Real(_) => ParamKind::Real,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Text(_) => ParamKind::Text,
            ParamValue::Reference(_) => ParamKind::Reference,
            ParamValue::ReferenceList(_) => ParamKind::ReferenceList,
            ParamValue::TreeFunction(_) => ParamKind::TreeFunction,
        }
    }

    /// Numeric view of a scalar value. Booleans map to 0 and 1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Real(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Converts a computed number into a value of the given scalar kind.
    /// Integers are truncated toward zero.
    pub fn from_number(kind: ParamKind, value: f64) -> Option<ParamValue> {
        match kind {
            ParamKind::Real => Some(ParamValue::Real(value)),
            ParamKind::Int => Some(ParamValue::Int(value.trunc() as i32)),
            ParamKind::Bool => Some(ParamValue::Bool(value != 0.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// A business object with a caller-defined schema.
    Generic,
    /// A named scalar referenced from expressions.
    Variable,
}
