//! model.rs
//! The Data Model: a `Document` paired with the `ExecutionContext` that keeps
//! its dependency graph.
//!
//! Structural edits that can strand connections (`delete_node`,
//! `rename_connected`, `add_variable`) clean up the document and rebuild the
//! graph inside the caller's transaction, so one abort undoes both.

use crate::analysis::GraphState;
use crate::computation::{ComputationError, ExecutionContext, FunctionRegistry, Ledger};
use crate::config::Settings;
use crate::expression;
use crate::store::{Document, Gid, NodeId, ParamValue, PartitionId, StoreError};
use log::{debug, info, log_enabled, warn, Level};
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
pub struct Model {
    doc: Document,
    ctx: ExecutionContext,
}

impl Model {
    pub fn new() -> Self { Self::default() }

    pub fn with_settings(settings: Settings) -> Self {
        Self { doc: Document::new(), ctx: ExecutionContext::new(settings) }
    }

    /// Wraps a loaded document and builds its graph right away.
    pub fn from_document(doc: Document, settings: Settings) -> Self {
        let mut model = Self { doc, ctx: ExecutionContext::new(settings) };
        model.update_dependencies();
        model
    }

    pub fn document(&self) -> &Document { &self.doc }
    pub fn document_mut(&mut self) -> &mut Document { &mut self.doc }
    pub fn context(&self) -> &ExecutionContext { &self.ctx }
    pub fn context_mut(&mut self) -> &mut ExecutionContext { &mut self.ctx }
    pub fn registry_mut(&mut self) -> &mut FunctionRegistry { self.ctx.registry_mut() }

    // --- Transactions ---

    pub fn has_open_command(&self) -> bool { self.doc.has_open_command() }

    pub fn open_command(&mut self) -> Result<(), StoreError> {
        self.doc.open_command()?;
        self.ctx.begin_transaction();
        Ok(())
    }

    pub fn commit_command(&mut self) -> Result<(), StoreError> {
        self.doc.commit_command()?;
        self.ctx.end_transaction();
        Ok(())
    }

    /// Discards the document edits and any graph rebuilt since `open_command`.
    pub fn abort_command(&mut self) -> Result<(), StoreError> {
        self.doc.abort_command()?;
        self.ctx.rollback();
        Ok(())
    }

    /// Opens a transaction that aborts on drop unless committed.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        self.open_command()?;
        Ok(Transaction { model: self, finished: false })
    }

    // --- Graph ---

    pub fn update_dependencies(&mut self) -> bool {
        self.ctx.update_dependencies(&self.doc)
    }

    pub fn check_dependency_graph(&self) -> GraphState { self.ctx.check_dependency_graph() }
    pub fn cyclic_parameters(&self) -> Vec<Gid> { self.ctx.cyclic_parameters() }

    pub fn input_readers(&self, gid: Gid) -> Vec<Gid> { self.ctx.input_readers(gid) }
    pub fn output_writers(&self, gid: Gid) -> Vec<Gid> { self.ctx.output_writers(gid) }
    pub fn referrers(&self, gid: Gid) -> Vec<Gid> { self.ctx.referrers(gid) }
    pub fn node_input_readers(&self, node: NodeId) -> Vec<Gid> { self.ctx.node_input_readers(&self.doc, node) }
    pub fn node_output_writers(&self, node: NodeId) -> Vec<Gid> { self.ctx.node_output_writers(&self.doc, node) }

    pub fn has_connected_evaluator(&self, gid: Gid) -> bool { self.ctx.has_connected_evaluator(gid) }
    pub fn has_connected_function(&self, gid: Gid) -> bool { self.doc.has_connected_function(gid) }
    pub fn has_connected_reference(&self, gid: Gid) -> bool { self.doc.has_connected_reference(gid) }

    /// Runs all connected functions. Needs an open transaction.
    pub fn execute(&mut self) -> Result<Ledger, ComputationError> {
        self.ctx.execute(&mut self.doc)
    }

    // --- Structural edits ---

    /// Deletes `id` with its subtree and drops every link into the removed
    /// Parameters. Returns `Ok(false)` when `id` does not exist.
    pub fn delete_node(&mut self, id: NodeId) -> Result<bool, StoreError> {
        self.doc.ensure_open()?;
        if !self.doc.contains(id) {
            return Ok(false);
        }
        let removed: HashSet<NodeId> = self.doc.remove_subtree(id)?.into_iter().collect();
        let released = self.doc.release_links(|g| removed.contains(&g.node));
        info!(
            "Deleted node {} with {} descendants, {} links released",
            id,
            removed.len() - 1,
            released.len()
        );
        self.update_dependencies();
        Ok(true)
    }

    /// Renames a Variable and rewrites every expression naming it, then
    /// rebuilds the graph. Returns the Parameters whose expression changed.
    pub fn rename_connected(&mut self, variable: NodeId, new_name: &str) -> Result<Vec<Gid>, StoreError> {
        let old = self.doc.rename_variable(variable, new_name)?;
        if old == new_name {
            return Ok(Vec::new());
        }

        let rewrites: Vec<(Gid, String)> = self
            .doc
            .nodes()
            .flat_map(|n| n.params().iter().map(move |p| (n.gid(p.tag), p)))
            .filter_map(|(gid, p)| {
                let src = p.eval_string()?;
                expression::rename_identifier(src, &old, new_name).map(|s| (gid, s))
            })
            .collect();

        let mut rewritten = Vec::with_capacity(rewrites.len());
        for (gid, expr) in rewrites {
            debug!("Expression on {} rewritten to '{}'", gid, expr);
            self.doc.set_eval_string(gid, &expr)?;
            rewritten.push(gid);
        }
        info!("Renamed variable '{}' to '{}' ({} expressions)", old, new_name, rewritten.len());
        self.update_dependencies();
        Ok(rewritten)
    }

    /// Creates a Variable and reconnects dead expressions that name it.
    pub fn add_variable(&mut self, partition: PartitionId, name: &str, value: ParamValue) -> Result<NodeId, StoreError> {
        let id = self.doc.add_variable(partition, name, value)?;
        let waiting: Vec<Gid> = if log_enabled!(Level::Debug) {
            self.ctx
                .graph()
                .dead_expressions()
                .iter()
                .copied()
                .filter(|g| self.doc.eval_string(*g).map_or(false, |s| expression::mentions(s, name)))
                .collect()
        } else {
            Vec::new()
        };

        self.update_dependencies();
        for gid in waiting.into_iter().filter(|g| self.ctx.has_connected_evaluator(*g)) {
            debug!("Evaluator on {} reconnected to '{}'", gid, name);
        }
        Ok(id)
    }
}

/// Scoped transaction. Dropping it without `commit` aborts.
pub struct Transaction<'m> {
    model: &'m mut Model,
    finished: bool,
}

impl Transaction<'_> {
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.model.commit_command()
    }

    pub fn abort(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.model.abort_command()
    }
}

impl Deref for Transaction<'_> {
    type Target = Model;
    fn deref(&self) -> &Model { self.model }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Model { self.model }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.model.abort_command() {
                warn!("Abort on drop failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_logging;
    use crate::store::{Parameter, ParamTag, VARIABLE_VALUE};
    use rstest::{fixture, rstest};
    use uuid::Uuid;

    const SHAPE_A: ParamTag = ParamTag(0);
    const SHAPE_B: ParamTag = ParamTag(1);
    const REAL: ParamTag = ParamTag(2);
    const REF: ParamTag = ParamTag(3);
    const FUNC: ParamTag = ParamTag(5);

    const DUMMY_FUNC: Uuid = Uuid::from_u128(0x3E4A_11C0_0001);

    fn make_stub(model: &mut Model, part: PartitionId, parent: Option<NodeId>, name: &str) -> NodeId {
        model
            .document_mut()
            .add_node(
                part,
                parent,
                name,
                vec![
                    Parameter::text(SHAPE_A.0, "DummyShapeA", "shape"),
                    Parameter::text(SHAPE_B.0, "DummyShapeB", "shape"),
                    Parameter::real(REAL.0, "Real", 0.0),
                    Parameter::reference(REF.0, "Ref"),
                    Parameter::reference_list(4, "RefList"),
                    Parameter::tree_function(FUNC.0, "TFunc"),
                ],
            )
            .unwrap()
    }

    fn p(node: NodeId, tag: ParamTag) -> Gid { Gid::new(node, tag) }
    fn var(node: NodeId) -> Gid { Gid::new(node, VARIABLE_VALUE) }

    // --- Structure fixture ---
    //
    //  A -+-> B -+-> E        Tree Functions:
    //     |      +-> F          C: C.ShapeA -> C.ShapeB
    //     |      +-> G          E, F, H, D: C.ShapeB -> own Real
    //     +-> C                 I, K: D.Real -> own Real
    //     +-> D -+-> H
    //            +-> I
    //            +-> J -> K

    struct Structure {
        model: Model,
        stubs: PartitionId,
        ids: Vec<NodeId>,
    }

    impl Structure {
        fn id(&self, name: char) -> NodeId { self.ids[(name as u8 - b'A') as usize] }
    }

    #[fixture]
    fn structure() -> Structure {
        init_logging();
        let mut model = Model::new();
        let stubs = model.document_mut().add_partition("StubA");
        model.open_command().unwrap();

        let a = make_stub(&mut model, stubs, None, "A");
        let b = make_stub(&mut model, stubs, Some(a), "B");
        let c = make_stub(&mut model, stubs, Some(a), "C");
        let d = make_stub(&mut model, stubs, Some(a), "D");
        let e = make_stub(&mut model, stubs, Some(b), "E");
        let f = make_stub(&mut model, stubs, Some(b), "F");
        let g = make_stub(&mut model, stubs, Some(b), "G");
        let h = make_stub(&mut model, stubs, Some(d), "H");
        let i = make_stub(&mut model, stubs, Some(d), "I");
        let j = make_stub(&mut model, stubs, Some(d), "J");
        let k = make_stub(&mut model, stubs, Some(j), "K");

        let doc = model.document_mut();
        doc.connect_tree_function(p(c, FUNC), DUMMY_FUNC, &[p(c, SHAPE_A)], &[p(c, SHAPE_B)]).unwrap();
        for n in [e, f, h, d] {
            doc.connect_tree_function(p(n, FUNC), DUMMY_FUNC, &[p(c, SHAPE_B)], &[p(n, REAL)]).unwrap();
        }
        for n in [i, k] {
            doc.connect_tree_function(p(n, FUNC), DUMMY_FUNC, &[p(d, REAL)], &[p(n, REAL)]).unwrap();
        }
        model.update_dependencies();
        model.commit_command().unwrap();

        Structure { model, stubs, ids: vec![a, b, c, d, e, f, g, h, i, j, k] }
    }

    fn assert_present(s: &Structure, present: &str, gone: &str) {
        for n in present.chars() {
            assert!(s.model.document().contains(s.id(n)), "{} should still exist", n);
        }
        for n in gone.chars() {
            assert!(!s.model.document().contains(s.id(n)), "{} should be deleted", n);
        }
    }

    fn assert_functions(s: &Structure, connected: &str, disconnected: &str) {
        for n in connected.chars() {
            assert!(s.model.has_connected_function(p(s.id(n), FUNC)), "{} should keep its function", n);
        }
        for n in disconnected.chars() {
            assert!(!s.model.has_connected_function(p(s.id(n), FUNC)), "{} should have no function", n);
        }
    }

    #[rstest]
    fn test_delete_root_empties_partition(mut structure: Structure) {
        structure.model.open_command().unwrap();
        assert!(structure.model.delete_node(structure.id('A')).unwrap());
        structure.model.commit_command().unwrap();

        assert_eq!(structure.model.document().node_count(), 0);
        assert!(structure.model.document().partitions()[structure.stubs.index()].nodes().is_empty());
        assert_eq!(structure.model.check_dependency_graph(), GraphState::OK | GraphState::NO_GRAPH);
    }

    #[rstest]
    fn test_delete_subtree_d(mut structure: Structure) {
        structure.model.open_command().unwrap();
        assert!(structure.model.delete_node(structure.id('D')).unwrap());
        structure.model.commit_command().unwrap();

        assert_present(&structure, "ABCEFG", "DHIJK");
        assert_functions(&structure, "CEF", "ABG");
    }

    #[rstest]
    fn test_delete_subtree_d_drops_references(mut structure: Structure) {
        let (a, b, c, d) = (structure.id('A'), structure.id('B'), structure.id('C'), structure.id('D'));
        let model = &mut structure.model;

        model.open_command().unwrap();
        model.document_mut().connect_reference(p(a, REF), p(d, SHAPE_A)).unwrap();
        model.document_mut().connect_reference(p(b, REF), p(d, SHAPE_A)).unwrap();
        model.update_dependencies();
        assert!(model.referrers(p(c, SHAPE_A)).is_empty());

        model.document_mut().connect_reference(p(d, REF), p(c, SHAPE_A)).unwrap();
        model.update_dependencies();
        assert_eq!(model.referrers(p(c, SHAPE_A)), vec![p(d, REF)]);
        model.commit_command().unwrap();

        model.open_command().unwrap();
        assert!(model.delete_node(d).unwrap());
        model.commit_command().unwrap();

        assert!(!model.has_connected_reference(p(a, REF)));
        assert!(!model.has_connected_reference(p(b, REF)));
        assert!(model.referrers(p(c, SHAPE_A)).is_empty());
        assert_present(&structure, "ABCEFG", "DHIJK");
    }

    #[rstest]
    fn test_delete_subtree_c_disconnects_dependents(mut structure: Structure) {
        structure.model.open_command().unwrap();
        assert!(structure.model.delete_node(structure.id('C')).unwrap());
        structure.model.commit_command().unwrap();

        assert_present(&structure, "ABDEFGHIJK", "C");
        assert_functions(&structure, "IK", "ABDEFGHJ");
    }

    #[rstest]
    fn test_observers_of_d(structure: Structure) {
        let (d, i, k) = (structure.id('D'), structure.id('I'), structure.id('K'));
        assert!(structure.model.node_output_writers(d).is_empty());
        assert_eq!(structure.model.node_input_readers(d), vec![p(i, FUNC), p(k, FUNC)]);
    }

    #[rstest]
    fn test_delete_unknown_node(mut structure: Structure) {
        assert_eq!(structure.model.delete_node(NodeId(500)), Err(StoreError::NoOpenTransaction));
        structure.model.open_command().unwrap();
        assert_eq!(structure.model.delete_node(NodeId(500)), Ok(false));
        assert_eq!(structure.model.document().node_count(), 11);
    }

    #[rstest]
    fn test_abort_discards_deletion_and_rebuild(mut structure: Structure) {
        let (c, e) = (structure.id('C'), structure.id('E'));
        let edges_before = structure.model.context().graph().edges().to_vec();

        structure.model.open_command().unwrap();
        structure.model.delete_node(c).unwrap();
        assert!(!structure.model.has_connected_function(p(e, FUNC)));
        structure.model.abort_command().unwrap();

        assert!(structure.model.document().contains(c));
        assert!(structure.model.has_connected_function(p(e, FUNC)));
        assert_eq!(structure.model.context().graph().edges(), &edges_before[..]);
    }

    #[rstest]
    fn test_rebuild_is_idempotent(mut structure: Structure) {
        let first = structure.model.context().graph().clone();
        structure.model.update_dependencies();
        assert_eq!(first.edges(), structure.model.context().graph().edges());
        assert_eq!(first.vertices(), structure.model.context().graph().vertices());
    }

    // --- Evaluation fixture ---

    struct Evaluation {
        model: Model,
        vars: PartitionId,
        a: NodeId,
        b: NodeId,
        c: NodeId,
        rx: NodeId,
        ry: NodeId,
        ix: NodeId,
        iy: NodeId,
        bx: NodeId,
        by: NodeId,
    }

    #[fixture]
    fn evaluation() -> Evaluation {
        init_logging();
        let mut model = Model::new();
        let vars = model.document_mut().add_partition("Variables");
        let stubs = model.document_mut().add_partition("StubA");
        model.open_command().unwrap();

        let a = make_stub(&mut model, stubs, None, "A");
        let b = make_stub(&mut model, stubs, None, "B");
        let c = make_stub(&mut model, stubs, None, "C");
        let rx = model.add_variable(vars, "rX", ParamValue::Real(0.5)).unwrap();
        let ry = model.add_variable(vars, "rY", ParamValue::Real(1.5)).unwrap();
        let ix = model.add_variable(vars, "iX", ParamValue::Int(3)).unwrap();
        let iy = model.add_variable(vars, "iY", ParamValue::Int(4)).unwrap();
        let bx = model.add_variable(vars, "bX", ParamValue::Bool(true)).unwrap();
        let by = model.add_variable(vars, "bY", ParamValue::Bool(false)).unwrap();
        model.commit_command().unwrap();

        Evaluation { model, vars, a, b, c, rx, ry, ix, iy, bx, by }
    }

    #[rstest]
    fn test_remove_variable(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, a, b, c, rx, ry, ix, iy, bx, by, .. } = evaluation;

        model.open_command().unwrap();
        let doc = model.document_mut();
        doc.set_eval_string(p(a, REAL), "rY").unwrap();
        doc.set_eval_string(p(b, REAL), "2.0 * rY + iX").unwrap();
        doc.set_eval_string(p(c, REAL), "2.0 * rX - iY").unwrap();
        doc.set_eval_string(var(rx), "iX + iY").unwrap();
        doc.set_eval_string(var(ry), "rX").unwrap();
        doc.set_value(var(ix), ParamValue::Int(1)).unwrap();
        doc.set_value(var(iy), ParamValue::Int(10)).unwrap();

        doc.connect_evaluator(var(rx), &[var(ix), var(iy)]).unwrap();
        doc.connect_evaluator(var(ry), &[var(rx)]).unwrap();
        doc.connect_evaluator(p(a, REAL), &[var(ry)]).unwrap();
        doc.connect_evaluator(p(b, REAL), &[var(ry), var(ix)]).unwrap();
        doc.connect_evaluator(p(c, REAL), &[var(rx), var(iy)]).unwrap();
        model.update_dependencies();
        model.commit_command().unwrap();

        assert!(model.node_output_writers(ix).is_empty());
        assert_eq!(model.node_input_readers(ix), vec![var(rx), p(b, REAL)]);

        model.open_command().unwrap();
        assert!(model.delete_node(ix).unwrap());
        model.commit_command().unwrap();

        for n in [a, b, c, rx, ry, iy, bx, by] {
            assert!(model.document().contains(n));
        }
        assert!(!model.document().contains(ix));

        assert!(model.has_connected_evaluator(p(a, REAL)));
        assert!(!model.has_connected_evaluator(p(b, REAL)));
        assert!(model.has_connected_evaluator(p(c, REAL)));
        assert!(!model.has_connected_evaluator(var(rx)));
        assert!(model.has_connected_evaluator(var(ry)));
        assert!(!model.has_connected_evaluator(var(iy)));
        assert!(!model.has_connected_evaluator(var(bx)));
        assert!(!model.has_connected_evaluator(var(by)));

        // Expressions survive the deletion verbatim.
        assert_eq!(model.document().eval_string(p(b, REAL)), Some("2.0 * rY + iX"));
    }

    #[rstest]
    fn test_mutual_reference_with_explicit_bindings_loops(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, rx, ry, .. } = evaluation;
        model.open_command().unwrap();
        let doc = model.document_mut();
        doc.set_eval_string(var(rx), "rY").unwrap();
        doc.set_eval_string(var(ry), "rX").unwrap();
        doc.connect_evaluator(var(rx), &[var(ry)]).unwrap();
        doc.connect_evaluator(var(ry), &[var(rx)]).unwrap();
        model.update_dependencies();
        model.commit_command().unwrap();

        let state = model.check_dependency_graph();
        assert!(state.has_loops());
        assert!(!state.is_ok());
        assert_eq!(model.cyclic_parameters(), vec![var(rx), var(ry)]);
    }

    #[rstest]
    #[case::chain(&[("rX", "rY"), ("rY", "iX"), ("iX", "iY")], false)]
    #[case::ring_of_four(&[("rX", "rY"), ("rY", "iX"), ("iX", "iY"), ("iY", "rX")], true)]
    #[case::short_chain(&[("rX", "rY"), ("iX", "rX")], false)]
    #[case::shared_source(&[("rY", "rX"), ("iX", "rX + rY")], false)]
    #[case::constant_breaks_nothing(&[("rX", "1.0"), ("rY", "iX"), ("iX", "rX*rY")], true)]
    #[case::self_reference(&[("rX", "rX + 1")], true)]
    #[case::diamond(&[("rY", "rX"), ("iX", "rX"), ("iY", "rY + iX")], false)]
    fn test_check_loops(mut evaluation: Evaluation, #[case] exprs: &[(&str, &str)], #[case] loops: bool) {
        let model = &mut evaluation.model;
        model.open_command().unwrap();
        for (name, expr) in exprs {
            let gid = model.document().variable_gid(name).unwrap();
            model.document_mut().set_eval_string(gid, expr).unwrap();
        }
        model.update_dependencies();
        model.commit_command().unwrap();

        let state = model.check_dependency_graph();
        assert_eq!(state.has_loops(), loops, "{:?}", state);
        assert_eq!(state.is_ok(), !loops, "{:?}", state);
    }

    #[rstest]
    #[case("99.8*rX+sin(rX)", "KAPPA", "99.8*KAPPA+sin(KAPPA)")]
    #[case("rX+sin(rX)-rX + rX", "KAPPA", "KAPPA+sin(KAPPA)-KAPPA + KAPPA")]
    #[case("sqrt(rX)*rX", "KAPPA", "sqrt(KAPPA)*KAPPA")]
    #[case("rX", "rX_KAPPA", "rX_KAPPA")]
    fn test_rename_variable(
        mut evaluation: Evaluation,
        #[case] init: &str,
        #[case] new_name: &str,
        #[case] expected: &str,
    ) {
        let Evaluation { ref mut model, rx, ry, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_value(var(rx), ParamValue::Real(1.0)).unwrap();
        model.document_mut().set_eval_string(var(ry), init).unwrap();
        model.document_mut().connect_evaluator(var(ry), &[var(rx)]).unwrap();

        let rewritten = model.rename_connected(rx, new_name).unwrap();
        model.commit_command().unwrap();

        assert_eq!(rewritten, vec![var(ry)]);
        assert_eq!(model.document().eval_string(var(ry)), Some(expected));
        assert_eq!(model.document().find_variable(new_name), Some(rx));
        assert!(model.has_connected_evaluator(var(ry)));
    }

    #[rstest]
    fn test_rename_leaves_longer_identifiers(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, vars, rx, ry, ix, .. } = evaluation;
        model.open_command().unwrap();
        model.add_variable(vars, "rX_KAPPA", ParamValue::Real(2.0)).unwrap();
        model.document_mut().set_eval_string(var(ry), "99.8*rX+sin(rX)").unwrap();
        model.document_mut().set_eval_string(var(ix), "rX_KAPPA * 2").unwrap();

        model.rename_connected(rx, "KAPPA").unwrap();
        model.commit_command().unwrap();

        assert_eq!(model.document().eval_string(var(ry)), Some("99.8*KAPPA+sin(KAPPA)"));
        assert_eq!(model.document().eval_string(var(ix)), Some("rX_KAPPA * 2"));
    }

    #[rstest]
    fn test_rename_rewrites_dead_expressions(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, rx, ry, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(ry), "rX + ghost").unwrap();
        model.update_dependencies();
        assert!(!model.has_connected_evaluator(var(ry)));

        model.rename_connected(rx, "KAPPA").unwrap();
        model.commit_command().unwrap();
        assert_eq!(model.document().eval_string(var(ry)), Some("KAPPA + ghost"));
        assert!(!model.has_connected_evaluator(var(ry)));
    }

    #[rstest]
    fn test_rename_to_taken_name_changes_nothing(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, rx, ry, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(ry), "rX * 2").unwrap();

        assert_eq!(model.rename_connected(rx, "iX"), Err(StoreError::DuplicateVariable("iX".into())));
        assert_eq!(model.document().eval_string(var(ry)), Some("rX * 2"));
        assert_eq!(model.document().find_variable("rX"), Some(rx));
    }

    #[rstest]
    fn test_abort_undoes_rename_and_rewrites(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, a, rx, ry, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(ry), "rX + sin(rX)").unwrap();
        model.document_mut().set_eval_string(p(a, REAL), "rX * rY").unwrap();
        model.update_dependencies();
        model.commit_command().unwrap();
        let edges_before = model.context().graph().edges().to_vec();

        model.open_command().unwrap();
        assert_eq!(model.rename_connected(rx, "KAPPA").unwrap(), vec![var(ry), p(a, REAL)]);
        assert_eq!(model.document().eval_string(p(a, REAL)), Some("KAPPA * rY"));
        model.abort_command().unwrap();

        assert_eq!(model.document().find_variable("rX"), Some(rx));
        assert_eq!(model.document().find_variable("KAPPA"), None);
        assert_eq!(model.document().node(rx).unwrap().name, "rX");
        assert_eq!(model.document().eval_string(var(ry)), Some("rX + sin(rX)"));
        assert_eq!(model.document().eval_string(p(a, REAL)), Some("rX * rY"));
        assert_eq!(model.context().graph().edges(), &edges_before[..]);
        assert!(model.has_connected_evaluator(var(ry)));
    }

    #[rstest]
    fn test_abort_leaves_no_dangling_vertices(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, vars, rx, .. } = evaluation;
        model.open_command().unwrap();
        let z = model.add_variable(vars, "z", ParamValue::Real(1.0)).unwrap();
        model.document_mut().set_eval_string(var(rx), "z * 2").unwrap();
        model.update_dependencies();
        assert!(model.context().graph().contains(var(z)));
        model.abort_command().unwrap();

        assert!(!model.document().contains(z));
        let graph = model.context().graph();
        assert!(graph.vertices().iter().all(|g| model.document().resolve(*g).is_some()));
        assert!(!model.has_connected_evaluator(var(rx)));
    }

    #[rstest]
    fn test_long_flat_expression_is_dead(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, ry, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(ry), &vec!["rX"; 20_000].join("+")).unwrap();
        assert!(model.update_dependencies());
        model.commit_command().unwrap();

        assert!(!model.has_connected_evaluator(var(ry)));
        assert!(model.output_writers(var(ry)).is_empty());
        assert!(model.context().graph().dead_expressions().contains(&var(ry)));
        assert!(!model.check_dependency_graph().has_loops());
    }

    #[rstest]
    fn test_add_variable_reconnects_dead_expression(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, vars, rx, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(rx), "2*rX_KAPPA+3.14").unwrap();
        model.update_dependencies();
        model.commit_command().unwrap();
        assert!(!model.has_connected_evaluator(var(rx)));

        model.open_command().unwrap();
        let kappa = model.add_variable(vars, "rX_KAPPA", ParamValue::Real(0.0)).unwrap();
        model.commit_command().unwrap();

        assert!(model.has_connected_evaluator(var(rx)));
        assert_eq!(model.output_writers(var(rx)), vec![var(kappa)]);
    }

    #[rstest]
    fn test_transaction_guard_aborts_on_drop(mut evaluation: Evaluation) {
        let rx = evaluation.rx;
        {
            let mut tx = evaluation.model.transaction().unwrap();
            tx.document_mut().set_eval_string(var(rx), "iX * 2").unwrap();
            tx.update_dependencies();
            assert!(tx.has_connected_evaluator(var(rx)));
        }
        assert!(!evaluation.model.has_open_command());
        assert_eq!(evaluation.model.document().eval_string(var(rx)), None);
        assert!(!evaluation.model.has_connected_evaluator(var(rx)));

        let mut tx = evaluation.model.transaction().unwrap();
        tx.document_mut().set_eval_string(var(rx), "iX * 2").unwrap();
        tx.commit().unwrap();
        assert_eq!(evaluation.model.document().eval_string(var(rx)), Some("iX * 2"));
    }

    #[rstest]
    fn test_execute_evaluates_in_order(mut evaluation: Evaluation) {
        let Evaluation { ref mut model, a, rx, ry, ix, .. } = evaluation;
        model.open_command().unwrap();
        model.document_mut().set_eval_string(var(rx), "iX + iY").unwrap();
        model.document_mut().set_eval_string(var(ry), "rX / 2").unwrap();
        model.document_mut().set_eval_string(p(a, REAL), "sqrt(rY * 7)").unwrap();
        model.document_mut().set_eval_string(var(ix), "bX * 5").unwrap();
        model.update_dependencies();

        let ledger = model.execute().unwrap();
        model.commit_command().unwrap();

        assert!(ledger.is_success());
        assert_eq!(model.document().resolve(var(ix)).unwrap().as_int(), Some(5));
        assert_eq!(model.document().resolve(var(rx)).unwrap().as_real(), Some(9.0));
        assert_eq!(model.document().resolve(var(ry)).unwrap().as_real(), Some(4.5));
        let a_real = model.document().resolve(p(a, REAL)).unwrap().as_real().unwrap();
        assert!((a_real - 31.5f64.sqrt()).abs() < 1e-12);
    }
}
