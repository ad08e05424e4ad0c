//! Execution engine.
//!
//! `Runtime` owns the node arena, the operation tables, the explicit root
//! stack and the stack of live computations. Everything that allocates goes
//! through it, so independent runtimes never share state.

mod eval;
pub mod primitives;
pub mod reduce;
mod rewrite;
pub mod types;
pub mod unparse;


pub use primitives::Prelude;
pub use reduce::Arg;
pub use types::{ComputationFrame, EvalFrame, EvalStats};

use crate::arena::{Aux, Graph, Literal, Node, NodeId, Slots, Tag};
use crate::config::{RuntimeConfig, INPLACE_BOUND};
use crate::constraints::BoundVar;
use crate::error::{Interrupt, RuntimeError, Step};
use crate::symbols::{OpTable, OpsId, SymbolKind, SymbolTable, TypeId};
use smallvec::SmallVec;
use types::Slice;

pub struct Runtime {
    graph: Graph,
    symbols: SymbolTable,
    config: RuntimeConfig,
    prelude: Prelude,
    roots: Vec<NodeId>,
    computations: Vec<ComputationFrame>,
    next_id: Aux,
    slice: Slice,
    collections: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::build(RuntimeConfig::default())
    }
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: RuntimeConfig) -> Self {
        let mut symbols = SymbolTable::with_builtins();
        let prelude = Prelude::install(&mut symbols);
        Self {
            graph: Graph::new(&config),
            symbols,
            config,
            prelude,
            roots: Vec::new(),
            computations: Vec::new(),
            next_id: 0,
            slice: Slice::UNBOUNDED,
            collections: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn prelude(&self) -> Prelude {
        self.prelude
    }

    pub fn collections(&self) -> usize {
        self.collections
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.graph.get(id)
    }

    pub fn tag(&self, id: NodeId) -> Tag {
        self.graph.get(id).tag
    }

    pub fn aux(&self, id: NodeId) -> Aux {
        self.graph.get(id).aux
    }

    pub fn ops(&self, id: NodeId) -> OpsId {
        self.graph.get(id).ops
    }

    pub fn table(&self, id: NodeId) -> &OpTable {
        self.symbols.get(self.ops(id))
    }

    pub fn arity(&self, id: NodeId) -> usize {
        self.table(id).arity
    }

    pub fn literal(&self, id: NodeId) -> Option<Literal> {
        match self.graph.get(id).slots {
            Slots::Data(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn int_value(&self, id: NodeId) -> Option<i64> {
        match self.literal(self.skip_fwd(id)) {
            Some(Literal::Int(v)) => Some(v),
            _ => None,
        }
    }

    pub fn skip_fwd(&self, id: NodeId) -> NodeId {
        self.graph.skip_fwd(id)
    }

    pub fn successors(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        let arity = self.arity(id);
        match &self.graph.get(id).slots {
            Slots::Inline(s) => s[..arity.min(2)].iter().copied().collect(),
            Slots::Array(r) => self.graph.array(*r).iter().copied().collect(),
            Slots::Data(_) => SmallVec::new(),
        }
    }

    pub fn successor(&self, id: NodeId, i: usize) -> NodeId {
        assert!(i < self.arity(id), "successor {} of {:?} out of range", i, id);
        match &self.graph.get(id).slots {
            Slots::Inline(s) => s[i],
            Slots::Array(r) => self.graph.array(*r)[i],
            Slots::Data(_) => unreachable!("data node {:?} has no successors", id),
        }
    }

    pub fn set_successor(&mut self, id: NodeId, i: usize, value: NodeId) {
        assert!(i < self.arity(id), "successor {} of {:?} out of range", i, id);
        let slots = self.graph.get(id).slots;
        match slots {
            Slots::Inline(_) => {
                if let Slots::Inline(s) = &mut self.graph.get_mut(id).slots {
                    s[i] = value;
                }
            }
            Slots::Array(r) => self.graph.array_mut(r)[i] = value,
            Slots::Data(_) => unreachable!("data node {:?} has no successors", id),
        }
    }

    pub fn fresh_id(&mut self) -> Aux {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn allocate_node(&mut self) -> Result<NodeId, RuntimeError> {
        Ok(self.allocate_nodes(1)?[0])
    }

    /// Allocates `n` nodes together. On exhaustion, collects and retries the
    /// whole request.
    pub fn allocate_nodes(&mut self, n: usize) -> Result<SmallVec<[NodeId; 4]>, RuntimeError> {
        if let Some(ids) = self.graph.try_take(n) {
            return Ok(ids);
        }
        self.collect();
        if let Some(ids) = self.graph.try_take(n) {
            return Ok(ids);
        }
        if self.graph.try_grow(n) {
            tracing::debug!(capacity = self.graph.capacity(), "node pool grown");
            if let Some(ids) = self.graph.try_take(n) {
                return Ok(ids);
            }
        }
        Err(RuntimeError::Exhausted {
            requested: n,
            live: self.graph.live_count(),
            capacity: self.graph.capacity(),
        })
    }

    pub fn push_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    pub fn pop_root(&mut self) -> Option<NodeId> {
        self.roots.pop()
    }

    pub fn collect(&mut self) -> usize {
        let roots = self.root_set();
        let freed = self.graph.collect(roots);
        self.collections += 1;

        let mut out_of_time = false;
        if let Some(frame) = self.current_frame_mut() {
            frame.time_allotment = frame.time_allotment.saturating_sub(1);
            out_of_time = frame.time_allotment == 0;
        }
        if out_of_time {
            self.slice.preempt = true;
        }
        tracing::debug!(
            freed,
            live = self.graph.live_count(),
            capacity = self.graph.capacity(),
            "collection finished"
        );
        freed
    }

    fn root_set(&self) -> Vec<NodeId> {
        let mut roots = self.roots.clone();
        for comp in &self.computations {
            for frame in &comp.queue {
                roots.push(frame.node);
                roots.extend(frame.constraints.read().nodes());
            }
        }
        roots
    }

    pub(crate) fn current_frame(&self) -> Option<&EvalFrame> {
        self.computations.last()?.queue.front()
    }

    pub(crate) fn current_frame_mut(&mut self) -> Option<&mut EvalFrame> {
        self.computations.last_mut()?.queue.front_mut()
    }

    pub fn tag_for(&self, ops: OpsId) -> Tag {
        match self.symbols.get(ops).kind {
            SymbolKind::Ctor { index, .. } => Tag::ctor(index),
            SymbolKind::Function | SymbolKind::Partial => Tag::OPER,
            SymbolKind::Builtin => match ops {
                OpsId::FAIL => Tag::FAIL,
                OpsId::FWD => Tag::FWD,
                OpsId::CHOICE | OpsId::NARROWED => Tag::CHOICE,
                OpsId::FREE => Tag::FREE,
                _ => Tag::CTOR,
            },
        }
    }

    fn make_slots(&mut self, succs: &[NodeId]) -> Result<Slots, RuntimeError> {
        if succs.len() < INPLACE_BOUND {
            let mut s = [NodeId::NULL; 2];
            s[..succs.len()].copy_from_slice(succs);
            return Ok(Slots::Inline(s));
        }
        let r = self.graph.alloc_array(succs.len())?;
        self.graph.array_mut(r).copy_from_slice(succs);
        Ok(Slots::Array(r))
    }

    fn release_slots(&mut self, id: NodeId) {
        if let Slots::Array(r) = self.graph.get(id).slots {
            self.graph.release_array(r);
        }
    }

    pub fn rewrite(
        &mut self,
        id: NodeId,
        tag: Tag,
        ops: OpsId,
        aux: Aux,
        succs: &[NodeId],
    ) -> Result<(), RuntimeError> {
        debug_assert_eq!(self.symbols.get(ops).arity, succs.len());
        let slots = self.make_slots(succs)?;
        self.release_slots(id);
        *self.graph.get_mut(id) = Node { tag, ops, aux, slots };
        Ok(())
    }

    pub fn rewrite_data(&mut self, id: NodeId, ops: OpsId, aux: Aux, lit: Literal) {
        let tag = self.tag_for(ops);
        self.release_slots(id);
        *self.graph.get_mut(id) = Node {
            tag,
            ops,
            aux,
            slots: Slots::Data(lit),
        };
    }

    pub fn rewrite_to(&mut self, id: NodeId, ops: OpsId, succs: &[NodeId]) -> Result<(), RuntimeError> {
        let tag = self.tag_for(ops);
        self.rewrite(id, tag, ops, 0, succs)
    }

    pub fn rewrite_fail(&mut self, id: NodeId) {
        self.release_slots(id);
        *self.graph.get_mut(id) = Node {
            aux: 0,
            ..Node::PLACEHOLDER
        };
    }

    pub fn rewrite_fwd(&mut self, id: NodeId, target: NodeId) {
        self.release_slots(id);
        *self.graph.get_mut(id) = Node {
            tag: Tag::FWD,
            ops: OpsId::FWD,
            aux: 0,
            slots: Slots::Inline([target, NodeId::NULL]),
        };
    }

    // `succs` stay rooted across a collection.
    fn alloc_with(&mut self, succs: &[NodeId]) -> Result<NodeId, RuntimeError> {
        let depth = self.roots.len();
        self.roots.extend_from_slice(succs);
        let id = self.allocate_node();
        self.roots.truncate(depth);
        id
    }

    pub fn make(&mut self, ops: OpsId, succs: &[NodeId]) -> Result<NodeId, RuntimeError> {
        let id = self.alloc_with(succs)?;
        let tag = self.tag_for(ops);
        self.rewrite(id, tag, ops, 0, succs)?;
        Ok(id)
    }

    fn make_data(&mut self, ops: OpsId, aux: Aux, lit: Literal) -> Result<NodeId, RuntimeError> {
        let id = self.allocate_node()?;
        self.rewrite_data(id, ops, aux, lit);
        Ok(id)
    }

    pub fn int(&mut self, v: i64) -> Result<NodeId, RuntimeError> {
        self.make_data(OpsId::INT, 0, Literal::Int(v))
    }

    pub fn float(&mut self, v: f64) -> Result<NodeId, RuntimeError> {
        self.make_data(OpsId::FLOAT, 0, Literal::Float(v))
    }

    pub fn char(&mut self, c: char) -> Result<NodeId, RuntimeError> {
        self.make_data(OpsId::CHAR, 0, Literal::Char(c))
    }

    pub fn fail(&mut self) -> Result<NodeId, RuntimeError> {
        self.make(OpsId::FAIL, &[])
    }

    pub fn fwd(&mut self, target: NodeId) -> Result<NodeId, RuntimeError> {
        self.make(OpsId::FWD, &[target])
    }

    pub fn choice(&mut self, l: NodeId, r: NodeId) -> Result<NodeId, RuntimeError> {
        let id = self.alloc_with(&[l, r])?;
        let cid = self.fresh_id();
        self.rewrite(id, Tag::CHOICE, OpsId::CHOICE, cid, &[l, r])?;
        Ok(id)
    }

    pub fn free_var(&mut self, ty: Option<TypeId>) -> Result<NodeId, RuntimeError> {
        let id = self.allocate_node()?;
        let vid = self.fresh_id();
        self.init_free_var(id, vid, ty);
        Ok(id)
    }

    pub(crate) fn init_free_var(&mut self, id: NodeId, vid: Aux, ty: Option<TypeId>) {
        let slots = match ty {
            Some(t) => Slots::Data(Literal::Type(t)),
            None => Slots::Inline([NodeId::NULL; 2]),
        };
        self.release_slots(id);
        *self.graph.get_mut(id) = Node {
            tag: Tag::FREE,
            ops: OpsId::FREE,
            aux: vid,
            slots,
        };
    }

    pub fn function_value(&mut self, ops: OpsId) -> Result<NodeId, RuntimeError> {
        let arity = self
            .symbols
            .try_get(ops)
            .ok_or(RuntimeError::UnknownSymbol(ops))?
            .arity;
        self.make_data(OpsId::FUNCTION, arity as Aux, Literal::Symbol(ops))
    }

    pub fn bind_vars(&mut self, from: NodeId, to: NodeId, is_lazy: bool) -> bool {
        let from = BoundVar {
            id: self.aux(from),
            node: from,
        };
        let to = BoundVar {
            id: self.aux(to),
            node: to,
        };
        match self.current_frame_mut() {
            Some(frame) => {
                frame.constraints.write().add_var_constraints(from, to, is_lazy);
                true
            }
            None => false,
        }
    }

    /// Variables bound to `var`, directly or through other variables, in the
    /// frame being evaluated.
    pub fn bound_variables(&self, var: NodeId) -> Vec<NodeId> {
        let (Some(frame), Some(vid)) = (self.current_frame(), rewrite::variable_of(self, var)) else {
            return Vec::new();
        };
        let mut out: Vec<NodeId> = frame
            .constraints
            .read()
            .bound_pairs(vid, |n| rewrite::variable_of(self, n))
            .into_iter()
            .map(|(_, to)| to.node)
            .filter(|&n| n != var)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Normalizes `id` in place outside of the scheduler. Choices are pulled
    /// to the root but not explored.
    pub fn normalize(&mut self, id: NodeId) -> Step {
        self.push_root(id);
        let res = reduce::normalize(self, id);
        self.pop_root();
        res
    }

    pub fn head_normalize(&mut self, id: NodeId) -> Result<NodeId, Interrupt> {
        self.push_root(id);
        let res = reduce::hnf(self, id);
        self.pop_root();
        res
    }
}
