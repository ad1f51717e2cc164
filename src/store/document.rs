//! document.rs
//! Arena-backed tree of Nodes with an Idle/Open transaction state machine.
//!
//! Nodes are addressed by their arena slot. A deleted Node leaves a `None`
//! hole behind so that stale `NodeId`/`Gid` values resolve to a miss instead
//! of aliasing a newer Node.

use super::error::StoreError;
use super::node::Node;
use super::parameter::Parameter;
use super::types::*;
use crate::expression;
use log::{debug, info};
use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub(crate) nodes: Vec<NodeId>,
}

impl Partition {
    /// Live members in insertion order.
    pub fn nodes(&self) -> &[NodeId] { &self.nodes }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Contents {
    nodes: Vec<Option<Node>>,
    partitions: Vec<Partition>,
}

#[derive(Debug, Clone, Default)]
enum TransactionState {
    #[default]
    Idle,
    Open { snapshot: Box<Contents> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    contents: Contents,

    #[serde(skip)]
    state: TransactionState,

    // Ephemeral name index (Not serialized, rebuilt on load and abort)
    #[serde(skip)]
    variables: HashMap<String, NodeId>,
}

impl Document {
    pub fn new() -> Self { Self::default() }

    // --- Partitions ---

    /// Registers a partition. Partition order is the document iteration order.
    pub fn add_partition(&mut self, name: &str) -> PartitionId {
        let id = PartitionId::new(self.contents.partitions.len());
        self.contents.partitions.push(Partition { name: name.to_string(), nodes: Vec::new() });
        id
    }

    pub fn partitions(&self) -> &[Partition] { &self.contents.partitions }

    pub fn find_partition(&self, name: &str) -> Option<PartitionId> {
        self.contents.partitions.iter().position(|p| p.name == name).map(PartitionId::new)
    }

    // --- Transactions ---
    //
    // Driven through `Model`, which pairs each step with the graph snapshot.

    pub fn has_open_command(&self) -> bool {
        matches!(self.state, TransactionState::Open { .. })
    }

    pub(crate) fn open_command(&mut self) -> Result<(), StoreError> {
        if self.has_open_command() {
            return Err(StoreError::TransactionAlreadyOpen);
        }
        let snapshot = Box::new(self.contents.clone());
        self.state = TransactionState::Open { snapshot };
        Ok(())
    }

    pub(crate) fn commit_command(&mut self) -> Result<(), StoreError> {
        match std::mem::take(&mut self.state) {
            TransactionState::Open { .. } => {
                info!("Transaction committed ({} live nodes)", self.node_count());
                Ok(())
            }
            TransactionState::Idle => Err(StoreError::NoOpenTransaction),
        }
    }

    /// Restores the contents captured by `open_command`.
    pub(crate) fn abort_command(&mut self) -> Result<(), StoreError> {
        match std::mem::take(&mut self.state) {
            TransactionState::Open { snapshot } => {
                self.contents = *snapshot;
                self.rebuild_variable_index();
                info!("Transaction aborted");
                Ok(())
            }
            TransactionState::Idle => Err(StoreError::NoOpenTransaction),
        }
    }

    pub(crate) fn ensure_open(&self) -> Result<(), StoreError> {
        if self.has_open_command() { Ok(()) } else { Err(StoreError::NoOpenTransaction) }
    }

    // --- Nodes ---

    /// Attaches a new Node to `partition`, optionally under `parent`.
    pub fn add_node(
        &mut self,
        partition: PartitionId,
        parent: Option<NodeId>,
        name: &str,
        params: Vec<Parameter>,
    ) -> Result<NodeId, StoreError> {
        self.push_node(partition, parent, name, NodeKind::Generic, params)
    }

    /// Creates a Variable Node holding a single scalar under `VARIABLE_VALUE`.
    pub fn add_variable(
        &mut self,
        partition: PartitionId,
        name: &str,
        value: ParamValue,
    ) -> Result<NodeId, StoreError> {
        self.ensure_open()?;
        self.check_variable_name(name)?;
        if !value.kind().is_scalar() {
            return Err(StoreError::NonScalarVariable(value.kind()));
        }
        let param = Parameter::new(VARIABLE_VALUE.0, "Value", value);
        let id = self.push_node(partition, None, name, NodeKind::Variable, vec![param])?;
        self.variables.insert(name.to_string(), id);
        Ok(id)
    }

    fn push_node(
        &mut self,
        partition: PartitionId,
        parent: Option<NodeId>,
        name: &str,
        kind: NodeKind,
        params: Vec<Parameter>,
    ) -> Result<NodeId, StoreError> {
        self.ensure_open()?;
        if partition.index() >= self.contents.partitions.len() {
            return Err(StoreError::UnknownPartition(partition));
        }
        if let Some(p) = parent {
            if !self.contains(p) {
                return Err(StoreError::UnknownNode(p));
            }
        }

        let id = NodeId::new(self.contents.nodes.len());
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|other| other.tag == param.tag) {
                return Err(StoreError::DuplicateTag { node: id, tag: param.tag });
            }
        }

        self.contents.nodes.push(Some(Node {
            id,
            name: name.to_string(),
            kind,
            partition,
            parent,
            children: Vec::new(),
            params,
        }));
        self.contents.partitions[partition.index()].nodes.push(id);
        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.push(id);
        }
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool { self.node(id).is_some() }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.contents.nodes.get(id.index())?.as_ref()
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.contents.nodes.get_mut(id.index())?.as_mut()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> + '_ {
        self.contents.nodes.iter_mut().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.contents.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Live Nodes in document order: partition by partition, insertion order within each.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.contents
            .partitions
            .iter()
            .flat_map(|p| p.nodes.iter())
            .filter_map(move |&id| self.node(id))
    }

    /// Pre-order walk of `id` and all its descendants.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.node(current) {
                out.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Drops `id` and its descendants from the arena. Dangling links held by
    /// other Nodes are left for the caller to clean up.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, StoreError> {
        self.ensure_open()?;
        let parent = self.node(id).ok_or(StoreError::UnknownNode(id))?.parent;
        let removed = self.subtree(id);

        if let Some(p) = parent.and_then(|p| self.node_mut(p)) {
            p.children.retain(|&c| c != id);
        }
        for &victim in &removed {
            if let Some(node) = self.contents.nodes[victim.index()].take() {
                if node.is_variable() {
                    self.variables.remove(&node.name);
                }
                self.contents.partitions[node.partition.index()].nodes.retain(|&n| n != victim);
                debug!("Removed node {} '{}'", victim, node.name);
            }
        }
        Ok(removed)
    }

    // --- Parameters ---

    pub fn resolve(&self, gid: Gid) -> Option<&Parameter> {
        self.node(gid.node)?.param(gid.tag)
    }

    pub(crate) fn resolve_mut(&mut self, gid: Gid) -> Option<&mut Parameter> {
        self.node_mut(gid.node)?.param_mut(gid.tag)
    }

    pub(crate) fn resolve_open(&mut self, gid: Gid) -> Result<&mut Parameter, StoreError> {
        self.ensure_open()?;
        self.resolve_mut(gid).ok_or(StoreError::UnknownParameter(gid))
    }

    /// Overwrites a value; the new value must have the Parameter's kind.
    pub fn set_value(&mut self, gid: Gid, value: ParamValue) -> Result<(), StoreError> {
        let param = self.resolve_open(gid)?;
        if param.kind() != value.kind() {
            return Err(StoreError::KindMismatch { gid, expected: param.kind(), actual: value.kind() });
        }
        param.set_value(value);
        Ok(())
    }

    /// Stores an expression on a scalar Parameter. A blank string clears it.
    pub fn set_eval_string(&mut self, gid: Gid, expr: &str) -> Result<(), StoreError> {
        let param = self.resolve_open(gid)?;
        if !param.kind().is_scalar() {
            return Err(StoreError::NotExpressible(gid));
        }
        param.set_eval_string(Some(expr.to_string()));
        Ok(())
    }

    pub fn eval_string(&self, gid: Gid) -> Option<&str> {
        self.resolve(gid)?.eval_string()
    }

    /// Inserts a Parameter into a Node's schema, before `before` or at the end.
    pub fn insert_parameter(
        &mut self,
        node: NodeId,
        param: Parameter,
        before: Option<ParamTag>,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let owner = self.node_mut(node).ok_or(StoreError::UnknownNode(node))?;
        if owner.param(param.tag).is_some() {
            return Err(StoreError::DuplicateTag { node, tag: param.tag });
        }
        let pos = match before {
            Some(tag) => owner
                .params
                .iter()
                .position(|p| p.tag == tag)
                .ok_or(StoreError::UnknownParameter(Gid::new(node, tag)))?,
            None => owner.params.len(),
        };
        owner.params.insert(pos, param);
        Ok(())
    }

    /// Replaces a Parameter in place, keeping its tag.
    pub fn replace_parameter(&mut self, gid: Gid, mut param: Parameter) -> Result<(), StoreError> {
        if self.is_variable_value(gid) && !param.kind().is_scalar() {
            return Err(StoreError::NonScalarVariable(param.kind()));
        }
        let slot = self.resolve_open(gid)?;
        param.tag = gid.tag;
        *slot = param;
        Ok(())
    }

    /// Removes a Parameter from its Node. A Variable's value slot cannot be removed.
    pub(crate) fn remove_parameter(&mut self, gid: Gid) -> Result<Parameter, StoreError> {
        self.ensure_open()?;
        if self.is_variable_value(gid) {
            return Err(StoreError::VariableValueRequired(gid.node));
        }
        let owner = self.node_mut(gid.node).ok_or(StoreError::UnknownNode(gid.node))?;
        let pos = owner
            .params
            .iter()
            .position(|p| p.tag == gid.tag)
            .ok_or(StoreError::UnknownParameter(gid))?;
        Ok(owner.params.remove(pos))
    }

    // --- Variables ---

    pub fn find_variable(&self, name: &str) -> Option<NodeId> {
        self.variables.get(name).copied()
    }

    fn is_variable_value(&self, gid: Gid) -> bool {
        gid.tag == VARIABLE_VALUE && self.node(gid.node).map_or(false, |n| n.is_variable())
    }

    /// GID of the value Parameter of the Variable called `name`.
    pub fn variable_gid(&self, name: &str) -> Option<Gid> {
        self.find_variable(name).map(|id| Gid::new(id, VARIABLE_VALUE))
    }

    pub(crate) fn rename_variable(&mut self, id: NodeId, new_name: &str) -> Result<String, StoreError> {
        self.ensure_open()?;
        let node = self.node(id).ok_or(StoreError::UnknownNode(id))?;
        if !node.is_variable() {
            return Err(StoreError::NotAVariable(id));
        }
        if node.name == new_name {
            return Ok(new_name.to_string());
        }
        self.check_variable_name(new_name)?;

        let node = self.node_mut(id).ok_or(StoreError::UnknownNode(id))?;
        let old = std::mem::replace(&mut node.name, new_name.to_string());
        self.variables.remove(&old);
        self.variables.insert(new_name.to_string(), id);
        Ok(old)
    }

    fn check_variable_name(&self, name: &str) -> Result<(), StoreError> {
        if !expression::is_identifier(name) || expression::is_builtin_function(name) {
            return Err(StoreError::InvalidVariableName(name.to_string()));
        }
        if self.variables.contains_key(name) {
            return Err(StoreError::DuplicateVariable(name.to_string()));
        }
        Ok(())
    }

    /// Rebuilds the name index after deserialization or rollback.
    fn rebuild_variable_index(&mut self) {
        self.variables = self
            .contents
            .nodes
            .iter()
            .flatten()
            .filter(|n| n.is_variable())
            .map(|n| (n.name.clone(), n.id))
            .collect();
    }

    // --- Persistence ---

    pub fn to_json_string(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let mut doc: Document =
            serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))?;
        doc.rebuild_variable_index();
        Ok(doc)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|e| StoreError::Io(e.to_string()))
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let json = std::fs::read_to_string(path).map_err(|e| StoreError::Io(e.to_string()))?;
        Self::from_json_str(&json)
    }
}
