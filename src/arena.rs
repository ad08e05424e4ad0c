//! Arena - pooled storage for graph nodes and successor arrays.
//!
//! Nodes live in fixed slots addressed by `NodeId` and are rewritten in place.
//! A node with arity 0..=2 keeps its successors inline; a node with a larger
//! arity owns a block from the array pool of exactly that arity.
use crate::config::{RuntimeConfig, INPLACE_BOUND};
use crate::error::RuntimeError;
use crate::symbols::{OpsId, TypeId};
use smallvec::SmallVec;

/// Lightweight NodeId
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NULL: NodeId = NodeId(u32::MAX);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Auxiliary slot. Holds the choice id of a choice, the variable id of a free
/// variable and the remaining argument count of a partial application.
pub type Aux = u64;
pub type ChoiceId = Aux;
pub type VarId = Aux;

/// Node discriminator. Negative values are reserved; constructors count up
/// from `CTOR`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Tag(pub i32);

impl Tag {
    pub const FAIL: Tag = Tag(-5);
    pub const FREE: Tag = Tag(-4);
    pub const FWD: Tag = Tag(-3);
    pub const CHOICE: Tag = Tag(-2);
    pub const OPER: Tag = Tag(-1);
    pub const CTOR: Tag = Tag(0);

    pub fn ctor(index: u32) -> Tag {
        Tag(Self::CTOR.0 + index as i32)
    }

    pub fn kind(self) -> TagKind {
        match self {
            Tag::FAIL => TagKind::Fail,
            Tag::FREE => TagKind::Free,
            Tag::FWD => TagKind::Fwd,
            Tag::CHOICE => TagKind::Choice,
            Tag::OPER => TagKind::Oper,
            Tag(t) if t >= 0 => TagKind::Ctor(t as u32),
            Tag(t) => unreachable!("tag {} is not assigned", t),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TagKind {
    Fail,
    Free,
    Fwd,
    Choice,
    Oper,
    Ctor(u32),
}

/// Unboxed payload of a leaf node.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Char(char),
    /// A function value with no arguments yet.
    Symbol(OpsId),
    /// The data type a free variable ranges over.
    Type(TypeId),
}

/// Handle to a block in the array pool for `arity`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ArrayRef {
    pub arity: u32,
    pub block: u32,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Slots {
    Inline([NodeId; 2]),
    Array(ArrayRef),
    Data(Literal),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Node {
    pub tag: Tag,
    pub ops: OpsId,
    pub aux: Aux,
    pub slots: Slots,
}

impl Node {
    /// Freshly allocated slots hold this until a step wires them.
    pub const PLACEHOLDER: Node = Node {
        tag: Tag::FAIL,
        ops: OpsId::FAIL,
        aux: 0,
        slots: Slots::Inline([NodeId::NULL, NodeId::NULL]),
    };
}

/// Fixed-size blocks of `arity` successors. Allocation and release are O(1)
/// and blocks are never split or merged.
#[derive(Clone, Debug)]
struct ArrayPool {
    arity: usize,
    cells: Vec<NodeId>,
    free: Vec<u32>,
}

impl ArrayPool {
    fn new(arity: usize) -> Self {
        Self {
            arity,
            cells: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self) -> u32 {
        if let Some(block) = self.free.pop() {
            return block;
        }
        let block = (self.cells.len() / self.arity) as u32;
        self.cells.extend(std::iter::repeat(NodeId::NULL).take(self.arity));
        block
    }

    fn release(&mut self, block: u32) {
        let start = block as usize * self.arity;
        self.cells[start..start + self.arity].fill(NodeId::NULL);
        self.free.push(block);
    }

    fn slice(&self, block: u32) -> &[NodeId] {
        let start = block as usize * self.arity;
        &self.cells[start..start + self.arity]
    }

    fn slice_mut(&mut self, block: u32) -> &mut [NodeId] {
        let start = block as usize * self.arity;
        &mut self.cells[start..start + self.arity]
    }

    fn in_use(&self) -> usize {
        self.cells.len() / self.arity - self.free.len()
    }
}

#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    free: Vec<u32>,
    marks: Vec<bool>,
    // Indexed by arity; entries below INPLACE_BOUND are unused.
    arrays: Vec<ArrayPool>,
    grow_nodes: usize,
    max_nodes: usize,
}

impl Graph {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        let mut g = Self {
            nodes: Vec::with_capacity(cfg.initial_nodes),
            free: Vec::with_capacity(cfg.initial_nodes),
            marks: Vec::new(),
            arrays: (0..cfg.arity_bound).map(ArrayPool::new).collect(),
            grow_nodes: cfg.grow_nodes,
            max_nodes: cfg.max_nodes,
        };
        g.grow(cfg.initial_nodes);
        g
    }

    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub fn arrays_in_use(&self, arity: usize) -> usize {
        self.arrays.get(arity).map_or(0, |p| if p.arity == 0 { 0 } else { p.in_use() })
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Takes `n` slots off the free list, all or nothing. The slots are reset
    /// to `Node::PLACEHOLDER`.
    pub fn try_take(&mut self, n: usize) -> Option<SmallVec<[NodeId; 4]>> {
        if self.free.len() < n {
            return None;
        }
        let mut out = SmallVec::with_capacity(n);
        for _ in 0..n {
            let idx = self.free.pop()?;
            self.nodes[idx as usize] = Node::PLACEHOLDER;
            out.push(NodeId(idx));
        }
        Some(out)
    }

    /// Adds slots after a collection could not satisfy a request. Returns
    /// false once the hard cap is reached.
    pub fn try_grow(&mut self, needed: usize) -> bool {
        let room = self.max_nodes.saturating_sub(self.nodes.len());
        let want = needed.saturating_sub(self.free.len()).max(self.grow_nodes);
        let add = want.min(room);
        if add == 0 || self.free.len() + add < needed {
            return false;
        }
        self.grow(add);
        true
    }

    fn grow(&mut self, n: usize) {
        let start = self.nodes.len();
        self.nodes.extend(std::iter::repeat(Node::PLACEHOLDER).take(n));
        // Lowest indices are handed out first.
        self.free.extend((start..start + n).rev().map(|i| i as u32));
    }

    pub fn alloc_array(&mut self, arity: usize) -> Result<ArrayRef, RuntimeError> {
        if arity < INPLACE_BOUND || arity >= self.arrays.len() {
            return Err(RuntimeError::ArityOutOfRange {
                arity,
                bound: self.arrays.len(),
            });
        }
        let block = self.arrays[arity].alloc();
        Ok(ArrayRef {
            arity: arity as u32,
            block,
        })
    }

    pub fn release_array(&mut self, r: ArrayRef) {
        self.arrays[r.arity as usize].release(r.block);
    }

    pub fn array(&self, r: ArrayRef) -> &[NodeId] {
        self.arrays[r.arity as usize].slice(r.block)
    }

    pub fn array_mut(&mut self, r: ArrayRef) -> &mut [NodeId] {
        self.arrays[r.arity as usize].slice_mut(r.block)
    }

    /// Successors as stored. Unused inline slots are skipped.
    pub fn stored_successors(&self, id: NodeId) -> SmallVec<[NodeId; 4]> {
        match &self.get(id).slots {
            Slots::Inline(s) => s.iter().copied().filter(|n| !n.is_null()).collect(),
            Slots::Array(r) => self.array(*r).iter().copied().collect(),
            Slots::Data(_) => SmallVec::new(),
        }
    }

    /// Follows FWD indirections to the first node that is not one.
    pub fn skip_fwd(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = self.get(id);
            match (node.tag, node.slots) {
                (Tag::FWD, Slots::Inline([next, _])) => id = next,
                _ => return id,
            }
        }
    }

    /// Marks everything reachable from `roots`, then returns every unmarked
    /// slot to the free list. Returns the number of slots freed.
    pub fn collect<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = NodeId>,
    {
        let before = self.free.len();
        self.marks.clear();
        self.marks.resize(self.nodes.len(), false);

        let mut stack: Vec<NodeId> = roots.into_iter().filter(|r| !r.is_null()).collect();
        while let Some(id) = stack.pop() {
            let idx = id.index();
            if self.marks[idx] {
                continue;
            }
            self.marks[idx] = true;
            stack.extend(self.stored_successors(id));
        }

        self.free.clear();
        for idx in (0..self.nodes.len()).rev() {
            if self.marks[idx] {
                continue;
            }
            if let Slots::Array(r) = self.nodes[idx].slots {
                self.release_array(r);
            }
            self.nodes[idx] = Node::PLACEHOLDER;
            self.free.push(idx as u32);
        }
        self.free.len().saturating_sub(before)
    }
}
