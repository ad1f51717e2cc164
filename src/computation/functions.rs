//! functions.rs
//! Tree Function drivers and the registry that maps a GUID to its driver.

use super::ledger::ComputationError;
use crate::expression::Expression;
use crate::store::{Gid, ParamValue};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// GUID of the built-in driver behind every Evaluator.
pub const REAL_EVALUATOR_GUID: Uuid = Uuid::from_u128(0x04F1DABC_B8A6_4283_990E_0F69BF86A844);

/// One INPUT as seen by a driver.
#[derive(Debug, Clone)]
pub struct Argument<'a> {
    pub gid: Gid,
    /// Set when the input is the value of a Variable Node.
    pub name: Option<&'a str>,
    pub value: &'a ParamValue,
}

/// Everything a driver needs for a single run. Drivers overwrite the values
/// in `outputs`; the engine writes them back into the document.
#[derive(Debug)]
pub struct FunctionCall<'a> {
    pub owner: Gid,
    pub inputs: Vec<Argument<'a>>,
    pub expression: Option<&'a str>,
    pub outputs: Vec<(Gid, ParamValue)>,
    pub max_depth: usize,
}

impl FunctionCall<'_> {
    pub fn input_number(&self, index: usize) -> Option<f64> {
        self.inputs.get(index).and_then(|a| a.value.as_number())
    }

    /// Stores `value` into every scalar output, converted to the output's kind.
    pub fn set_all_outputs(&mut self, value: f64) {
        for (_, out) in self.outputs.iter_mut() {
            if let Some(v) = ParamValue::from_number(out.kind(), value) {
                *out = v;
            }
        }
    }
}

pub trait TreeFunction {
    fn guid(&self) -> Uuid;
    fn name(&self) -> &str;
    fn execute(&self, call: &mut FunctionCall<'_>) -> Result<(), ComputationError>;
}

/// Evaluates the owner's expression over the values of its Variable inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealEvaluatorFunc;

impl TreeFunction for RealEvaluatorFunc {
    fn guid(&self) -> Uuid { REAL_EVALUATOR_GUID }
    fn name(&self) -> &str { "RealEvaluator" }

    fn execute(&self, call: &mut FunctionCall<'_>) -> Result<(), ComputationError> {
        let owner = call.owner;
        if call.inputs.iter().any(|a| a.gid == owner) {
            return Err(ComputationError::SelfDependency { owner });
        }
        let src = call.expression.ok_or(ComputationError::MissingExpression { owner })?;
        let expr = Expression::parse_with_depth(src, call.max_depth)
            .map_err(|source| ComputationError::Expression { owner, source })?;

        let inputs = &call.inputs;
        let lookup = |name: &str| {
            inputs
                .iter()
                .find(|a| a.name == Some(name))
                .and_then(|a| a.value.as_number())
        };
        let value = expr
            .evaluate(&lookup)
            .map_err(|source| ComputationError::Expression { owner, source })?;

        call.set_all_outputs(value);
        Ok(())
    }
}

type Body = Box<dyn Fn(&mut FunctionCall<'_>) -> Result<(), String>>;

/// Adapts a closure into a `TreeFunction`. Errors become `FunctionFailed`.
pub struct ClosureFunction {
    guid: Uuid,
    name: String,
    body: Body,
}

impl ClosureFunction {
    pub fn new<F>(guid: Uuid, name: &str, body: F) -> Self
    where
        F: Fn(&mut FunctionCall<'_>) -> Result<(), String> + 'static,
    {
        Self { guid, name: name.to_string(), body: Box::new(body) }
    }
}

impl TreeFunction for ClosureFunction {
    fn guid(&self) -> Uuid { self.guid }
    fn name(&self) -> &str { &self.name }

    fn execute(&self, call: &mut FunctionCall<'_>) -> Result<(), ComputationError> {
        (self.body)(call).map_err(|reason| ComputationError::FunctionFailed { owner: call.owner, reason })
    }
}

pub struct FunctionRegistry {
    functions: HashMap<Uuid, Box<dyn TreeFunction>>,
}

impl FunctionRegistry {
    /// A registry with no drivers at all, not even the evaluator.
    pub fn empty() -> Self {
        Self { functions: HashMap::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(RealEvaluatorFunc);
        registry
    }

    /// Returns the driver previously registered under the same GUID.
    pub fn register(&mut self, function: impl TreeFunction + 'static) -> Option<Box<dyn TreeFunction>> {
        self.functions.insert(function.guid(), Box::new(function))
    }

    pub fn register_fn<F>(&mut self, guid: Uuid, name: &str, body: F) -> Option<Box<dyn TreeFunction>>
    where
        F: Fn(&mut FunctionCall<'_>) -> Result<(), String> + 'static,
    {
        self.register(ClosureFunction::new(guid, name, body))
    }

    pub fn get(&self, guid: Uuid) -> Option<&dyn TreeFunction> {
        self.functions.get(&guid).map(|f| f.as_ref())
    }

    pub fn contains(&self, guid: Uuid) -> bool { self.functions.contains_key(&guid) }
    pub fn len(&self) -> usize { self.functions.len() }
    pub fn is_empty(&self) -> bool { self.functions.is_empty() }
}

impl Default for FunctionRegistry {
    fn default() -> Self { Self::with_builtins() }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.values().map(|d| (d.name().to_string(), d.guid())).collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}
