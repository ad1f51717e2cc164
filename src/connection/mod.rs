//! Connection Model: References, Reference Lists, Tree Functions and Evaluators
//! layered on Parameters.
//!
//! Connecting never checks that the target resolves. A link to a missing
//! Parameter is stored as-is ("dead") and only shows up as an unconnected
//! Parameter once the dependency graph is rebuilt.

pub mod binding;

pub use binding::{ConnectionKind, EvaluatorBinding, FunctionBinding};

use crate::store::{Document, Gid, ParamKind, ParamValue, StoreError};
use log::debug;
use uuid::Uuid;

fn kind_mismatch(gid: Gid, expected: ParamKind, actual: ParamKind) -> StoreError {
    StoreError::KindMismatch { gid, expected, actual }
}

impl Document {
    pub fn connect_reference(&mut self, holder: Gid, target: Gid) -> Result<(), StoreError> {
        match self.resolve_open(holder)?.value_mut() {
            ParamValue::Reference(slot) => {
                *slot = Some(target);
                Ok(())
            }
            other => Err(kind_mismatch(holder, ParamKind::Reference, other.kind())),
        }
    }

    /// Appends `target` to a Reference List. Repeated targets are stored once.
    pub fn connect_reference_to_list(&mut self, holder: Gid, target: Gid) -> Result<(), StoreError> {
        match self.resolve_open(holder)?.value_mut() {
            ParamValue::ReferenceList(targets) => {
                if !targets.contains(&target) {
                    targets.push(target);
                }
                Ok(())
            }
            other => Err(kind_mismatch(holder, ParamKind::ReferenceList, other.kind())),
        }
    }

    pub fn disconnect_reference(&mut self, holder: Gid) -> Result<bool, StoreError> {
        match self.resolve_open(holder)?.value_mut() {
            ParamValue::Reference(slot) => Ok(slot.take().is_some()),
            other => Err(kind_mismatch(holder, ParamKind::Reference, other.kind())),
        }
    }

    pub fn disconnect_reference_from_list(&mut self, holder: Gid, target: Gid) -> Result<bool, StoreError> {
        match self.resolve_open(holder)?.value_mut() {
            ParamValue::ReferenceList(targets) => {
                let before = targets.len();
                targets.retain(|t| *t != target);
                Ok(targets.len() != before)
            }
            other => Err(kind_mismatch(holder, ParamKind::ReferenceList, other.kind())),
        }
    }

    /// Binds the function `guid` to `owner`, replacing any previous binding.
    pub fn connect_tree_function(
        &mut self,
        owner: Gid,
        guid: Uuid,
        inputs: &[Gid],
        outputs: &[Gid],
    ) -> Result<(), StoreError> {
        if inputs.is_empty() {
            return Err(StoreError::EmptyFunctionInputs(owner));
        }
        match self.resolve_open(owner)?.value_mut() {
            ParamValue::TreeFunction(slot) => {
                *slot = Some(FunctionBinding {
                    guid,
                    inputs: inputs.to_vec(),
                    outputs: outputs.to_vec(),
                });
                Ok(())
            }
            other => Err(kind_mismatch(owner, ParamKind::TreeFunction, other.kind())),
        }
    }

    pub fn disconnect_tree_function(&mut self, owner: Gid) -> Result<bool, StoreError> {
        match self.resolve_open(owner)?.value_mut() {
            ParamValue::TreeFunction(slot) => Ok(slot.take().is_some()),
            other => Err(kind_mismatch(owner, ParamKind::TreeFunction, other.kind())),
        }
    }

    /// Declares the Variables a scalar's expression depends on.
    pub fn connect_evaluator(&mut self, owner: Gid, dependencies: &[Gid]) -> Result<(), StoreError> {
        let param = self.resolve_open(owner)?;
        if !param.kind().is_scalar() {
            return Err(StoreError::NotExpressible(owner));
        }
        param.set_evaluator(Some(EvaluatorBinding { inputs: dependencies.to_vec() }));
        Ok(())
    }

    pub fn disconnect_evaluator(&mut self, owner: Gid) -> Result<bool, StoreError> {
        let param = self.resolve_open(owner)?;
        let had = param.evaluator().is_some();
        param.set_evaluator(None);
        Ok(had)
    }

    // --- Structural predicates ---

    /// True when a single Reference points at a live Parameter, or a
    /// Reference List holds at least one live target.
    pub fn has_connected_reference(&self, holder: Gid) -> bool {
        let Some(param) = self.resolve(holder) else { return false };
        match param.value() {
            ParamValue::Reference(Some(target)) => self.resolve(*target).is_some(),
            ParamValue::ReferenceList(targets) => targets.iter().any(|t| self.resolve(*t).is_some()),
            _ => false,
        }
    }

    /// True when a Tree Function is bound at `owner` and all its endpoints resolve.
    pub fn has_connected_function(&self, owner: Gid) -> bool {
        self.resolve(owner)
            .and_then(|p| p.as_tree_function())
            .map_or(false, |f| f.endpoints().all(|g| self.resolve(*g).is_some()))
    }

    /// Drops every link that points at a Parameter for which `gone` holds.
    ///
    /// Tree Function and Evaluator bindings are disconnected as a whole when any
    /// endpoint is affected; Reference Lists only lose the matching entries.
    /// Returns the holders that changed, in document order.
    pub(crate) fn release_links(&mut self, gone: impl Fn(Gid) -> bool) -> Vec<(Gid, ConnectionKind)> {
        let mut released = Vec::new();
        let nodes: Vec<_> = self.nodes().map(|n| n.id).collect();

        for id in nodes {
            let Some(node) = self.node_mut(id) else { continue };
            for param in node.params.iter_mut() {
                let holder = Gid::new(id, param.tag);
                match param.value_mut() {
                    ParamValue::Reference(slot) => {
                        if slot.map_or(false, &gone) {
                            *slot = None;
                            released.push((holder, ConnectionKind::Reference));
                        }
                    }
                    ParamValue::ReferenceList(targets) => {
                        let before = targets.len();
                        targets.retain(|t| !gone(*t));
                        if targets.len() != before {
                            released.push((holder, ConnectionKind::ReferenceList));
                        }
                    }
                    ParamValue::TreeFunction(slot) => {
                        if slot.as_ref().map_or(false, |f| f.endpoints().any(|g| gone(*g))) {
                            *slot = None;
                            released.push((holder, ConnectionKind::TreeFunction));
                        }
                    }
                    _ => {}
                }
                if param.evaluator().map_or(false, |e| e.inputs.iter().any(|g| gone(*g))) {
                    param.set_evaluator(None);
                    released.push((holder, ConnectionKind::Evaluator));
                }
            }
        }

        for (holder, kind) in &released {
            debug!("Released {:?} link held by {}", kind, holder);
        }
        released
    }
}
