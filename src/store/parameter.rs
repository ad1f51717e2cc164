//! Typed value slots owned by Nodes.

use super::types::*;
use crate::connection::{EvaluatorBinding, FunctionBinding};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub tag: ParamTag,
    pub name: String,
    value: ParamValue,
    /// Expression driving a scalar value. Never set on non-scalar kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    eval_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evaluator: Option<EvaluatorBinding>,
}

impl Parameter {
    pub fn new(tag: u32, name: &str, value: ParamValue) -> Self {
        Self {
            tag: ParamTag(tag),
            name: name.to_string(),
            value,
            eval_string: None,
            evaluator: None,
        }
    }

    pub fn real(tag: u32, name: &str, value: f64) -> Self { Self::new(tag, name, ParamValue::Real(value)) }
    pub fn int(tag: u32, name: &str, value: i32) -> Self { Self::new(tag, name, ParamValue::Int(value)) }
    pub fn boolean(tag: u32, name: &str, value: bool) -> Self { Self::new(tag, name, ParamValue::Bool(value)) }
    pub fn text(tag: u32, name: &str, value: &str) -> Self { Self::new(tag, name, ParamValue::Text(value.to_string())) }
    pub fn reference(tag: u32, name: &str) -> Self { Self::new(tag, name, ParamValue::Reference(None)) }
    pub fn reference_list(tag: u32, name: &str) -> Self { Self::new(tag, name, ParamValue::ReferenceList(Vec::new())) }
    pub fn tree_function(tag: u32, name: &str) -> Self { Self::new(tag, name, ParamValue::TreeFunction(None)) }

    pub fn kind(&self) -> ParamKind { self.value.kind() }
    pub fn value(&self) -> &ParamValue { &self.value }

    // --- Capability Queries ---

    pub fn as_real(&self) -> Option<f64> {
        match self.value { ParamValue::Real(v) => Some(v), _ => None }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.value { ParamValue::Int(v) => Some(v), _ => None }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value { ParamValue::Bool(v) => Some(v), _ => None }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value { ParamValue::Text(v) => Some(v), _ => None }
    }

    /// Stored target of a single Reference, dead or alive.
    pub fn as_reference(&self) -> Option<Gid> {
        match self.value { ParamValue::Reference(target) => target, _ => None }
    }

    pub fn as_reference_list(&self) -> Option<&[Gid]> {
        match &self.value { ParamValue::ReferenceList(targets) => Some(targets), _ => None }
    }

    pub fn as_tree_function(&self) -> Option<&FunctionBinding> {
        match &self.value { ParamValue::TreeFunction(binding) => binding.as_ref(), _ => None }
    }

    pub fn eval_string(&self) -> Option<&str> { self.eval_string.as_deref() }
    pub fn evaluator(&self) -> Option<&EvaluatorBinding> { self.evaluator.as_ref() }

    // --- Crate-internal mutation (transaction checks live in `Document`) ---

    pub(crate) fn value_mut(&mut self) -> &mut ParamValue { &mut self.value }

    pub(crate) fn set_value(&mut self, value: ParamValue) { self.value = value; }

    pub(crate) fn set_eval_string(&mut self, expr: Option<String>) {
        self.eval_string = expr.filter(|s| !s.trim().is_empty());
    }

    pub(crate) fn set_evaluator(&mut self, binding: Option<EvaluatorBinding>) {
        self.evaluator = binding;
    }
}
