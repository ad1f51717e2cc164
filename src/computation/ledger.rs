//! ledger.rs
//! Per-owner outcome of an execution pass.

use crate::store::Gid;
use std::collections::HashMap;

pub use self::error::ComputationError;
mod error {
    use crate::expression::ExpressionError;
    use crate::store::{Gid, StoreError};
    use thiserror::Error;
    use uuid::Uuid;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ComputationError {
        #[error("No tree function registered as {guid} (bound at {owner})")]
        UnknownFunction { owner: Gid, guid: Uuid },
        #[error("Expression on {owner} depends on itself")]
        SelfDependency { owner: Gid },
        #[error("Evaluator on {owner} has no expression")]
        MissingExpression { owner: Gid },
        #[error("Expression on {owner} failed: {source}")]
        Expression { owner: Gid, source: ExpressionError },
        #[error("Upstream dependency {upstream} of {owner} failed")]
        UpstreamError { owner: Gid, upstream: Gid },
        #[error("Function at {owner} failed: {reason}")]
        FunctionFailed { owner: Gid, reason: String },
        #[error("Cycle detected")]
        CycleDetected,
        #[error(transparent)]
        Store(#[from] StoreError),
    }
}

/// Outcome of every owner that ran (or was skipped because of an upstream
/// failure), in execution order.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    order: Vec<Gid>,
    results: HashMap<Gid, Result<(), ComputationError>>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, owner: Gid) -> Option<&Result<(), ComputationError>> {
        self.results.get(&owner)
    }

    pub fn insert(&mut self, owner: Gid, result: Result<(), ComputationError>) {
        if self.results.insert(owner, result).is_none() {
            self.order.push(owner);
        }
    }

    pub fn invalidate(&mut self, owners: impl IntoIterator<Item = Gid>) {
        for owner in owners {
            if self.results.remove(&owner).is_some() {
                self.order.retain(|g| *g != owner);
            }
        }
    }

    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }

    /// Owners in the order they were executed.
    pub fn executed(&self) -> &[Gid] { &self.order }

    pub fn failures(&self) -> impl Iterator<Item = (Gid, &ComputationError)> + '_ {
        self.order
            .iter()
            .filter_map(|g| match self.results.get(g) {
                Some(Err(e)) => Some((*g, e)),
                _ => None,
            })
    }

    pub fn is_success(&self) -> bool { self.failures().next().is_none() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NodeId, ParamTag};

    fn gid(node: u32) -> Gid { Gid::new(NodeId(node), ParamTag(0)) }

    #[test]
    fn test_insert_keeps_first_position() {
        let mut ledger = Ledger::new();
        ledger.insert(gid(2), Ok(()));
        ledger.insert(gid(1), Err(ComputationError::CycleDetected));
        ledger.insert(gid(2), Err(ComputationError::SelfDependency { owner: gid(2) }));

        assert_eq!(ledger.executed(), &[gid(2), gid(1)]);
        assert_eq!(ledger.failures().count(), 2);
        assert!(!ledger.is_success());
    }

    #[test]
    fn test_invalidate_removes_entries() {
        let mut ledger = Ledger::new();
        ledger.insert(gid(0), Ok(()));
        ledger.insert(gid(1), Ok(()));
        ledger.invalidate([gid(0)]);

        assert_eq!(ledger.executed(), &[gid(1)]);
        assert!(ledger.get(gid(0)).is_none());
        assert!(ledger.is_success());
    }
}
