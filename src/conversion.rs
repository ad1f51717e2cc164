//! conversion.rs
//! Batched Parameter-level edits, applied in one transaction.
//!
//! Requests are checked for conflicts when they are registered: a GID may be
//! updated or deleted once per batch. Inserts never conflict.

use crate::model::Model;
use crate::store::{Gid, NodeId, ParamTag, Parameter, StoreError};
use log::{info, warn};
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct InsertRequest {
    node: NodeId,
    param: Parameter,
    before: Option<ParamTag>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversionBatch {
    inserts: Vec<InsertRequest>,
    deletes: Vec<Gid>,
    updates: Vec<(Gid, Parameter)>,
}

impl ConversionBatch {
    pub fn new() -> Self { Self::default() }

    /// Queues `param` for insertion into `node`, before `before` or at the end.
    pub fn insert(&mut self, node: NodeId, param: Parameter, before: Option<ParamTag>) -> bool {
        self.inserts.push(InsertRequest { node, param, before });
        true
    }

    pub fn update(&mut self, gid: Gid, param: Parameter) -> bool {
        if self.is_claimed(gid) {
            warn!("Update of {} rejected: already scheduled", gid);
            return false;
        }
        self.updates.push((gid, param));
        true
    }

    pub fn delete(&mut self, gid: Gid) -> bool {
        if self.is_claimed(gid) {
            warn!("Deletion of {} rejected: already scheduled", gid);
            return false;
        }
        self.deletes.push(gid);
        true
    }

    fn is_claimed(&self, gid: Gid) -> bool {
        self.deletes.contains(&gid) || self.updates.iter().any(|(g, _)| *g == gid)
    }

    pub fn len(&self) -> usize { self.inserts.len() + self.deletes.len() + self.updates.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn clear(&mut self) {
        self.inserts.clear();
        self.deletes.clear();
        self.updates.clear();
    }

    /// Applies inserts, then deletes, then updates, and rebuilds the graph.
    ///
    /// Opens its own transaction, so `model` must be idle. On the first
    /// failing request everything is rolled back.
    pub fn apply(self, model: &mut Model) -> Result<(), StoreError> {
        let total = self.len();
        let mut tx = model.transaction()?;

        for req in self.inserts {
            tx.document_mut().insert_parameter(req.node, req.param, req.before)?;
        }

        if !self.deletes.is_empty() {
            for gid in &self.deletes {
                tx.document_mut().remove_parameter(*gid)?;
            }
            let gone: HashSet<Gid> = self.deletes.into_iter().collect();
            tx.document_mut().release_links(|g| gone.contains(&g));
        }

        for (gid, param) in self.updates {
            tx.document_mut().replace_parameter(gid, param)?;
        }

        tx.update_dependencies();
        tx.commit()?;
        info!("Conversion batch applied: {} requests", total);
        Ok(())
    }
}
