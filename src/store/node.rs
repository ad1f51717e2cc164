use super::parameter::Parameter;
use super::types::*;
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub partition: PartitionId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub(crate) params: Vec<Parameter>,
}

impl Node {
    pub fn is_variable(&self) -> bool { self.kind == NodeKind::Variable }

    /// Parameters in schema order.
    pub fn params(&self) -> &[Parameter] { &self.params }

    pub fn param(&self, tag: ParamTag) -> Option<&Parameter> {
        self.params.iter().find(|p| p.tag == tag)
    }

    pub(crate) fn param_mut(&mut self, tag: ParamTag) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.tag == tag)
    }

    pub fn gid(&self, tag: ParamTag) -> Gid { Gid::new(self.id, tag) }

    pub fn gids(&self) -> impl Iterator<Item = Gid> + '_ {
        self.params.iter().map(move |p| Gid::new(self.id, p.tag))
    }
}
