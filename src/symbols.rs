//! Operation tables.
//!
//! Every node points at the table of its symbol. All behavior the engine needs
//! from a node (printing, comparison, reduction) goes through these entries.

use crate::arena::NodeId;
use crate::engine::{reduce, unparse, Runtime};
use crate::error::Step;
use std::cmp::Ordering;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OpsId(pub u32);

impl OpsId {
    pub const FAIL: OpsId = OpsId(0);
    pub const FWD: OpsId = OpsId(1);
    pub const CHOICE: OpsId = OpsId(2);
    /// A choice produced by instantiating a free variable.
    pub const NARROWED: OpsId = OpsId(3);
    pub const FREE: OpsId = OpsId(4);
    pub const INT: OpsId = OpsId(5);
    pub const FLOAT: OpsId = OpsId(6);
    pub const CHAR: OpsId = OpsId(7);
    /// One more argument applied to a partial application.
    pub const PARTIAL: OpsId = OpsId(8);
    /// A function used as a value; the base of every partial spine.
    pub const FUNCTION: OpsId = OpsId(9);
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TypeId(pub u32);

pub type StepFn = fn(&mut Runtime, NodeId) -> Step;
pub type LabelFn = fn(&Runtime, NodeId) -> String;
pub type EqualsFn = fn(&Runtime, NodeId, NodeId) -> bool;
pub type CompareFn = fn(&Runtime, NodeId, NodeId) -> Ordering;
pub type ShowFn = fn(&Runtime, NodeId, &mut String, bool);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymbolKind {
    /// Engine-internal node forms (fail, fwd, choice, free, literals).
    Builtin,
    /// A partial application; head normal form even though tagged `OPER`.
    Partial,
    Ctor { data_type: TypeId, index: u32 },
    Function,
}

#[derive(Clone)]
pub struct OpTable {
    pub name: String,
    pub kind: SymbolKind,
    pub arity: usize,
    pub label: LabelFn,
    pub equals: EqualsFn,
    pub compare: CompareFn,
    pub show: ShowFn,
    /// N: drive to constructor, choice or failure form, successors included.
    pub normalize: StepFn,
    /// H: drive to head normal form.
    pub head: StepFn,
}

impl std::fmt::Debug for OpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpTable")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("arity", &self.arity)
            .finish()
    }
}

impl OpTable {
    fn builtin(name: &str, arity: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: SymbolKind::Builtin,
            arity,
            label: unparse::label_name,
            equals: unparse::equals_structural,
            compare: unparse::compare_structural,
            show: unparse::show_applicative,
            normalize: reduce::step_noop,
            head: reduce::step_noop,
        }
    }

    pub fn constructor(name: &str, arity: usize, data_type: TypeId, index: u32) -> Self {
        Self {
            kind: SymbolKind::Ctor { data_type, index },
            normalize: reduce::normalize_ctor,
            ..Self::builtin(name, arity)
        }
    }

    pub fn function(name: &str, arity: usize, head: StepFn) -> Self {
        Self {
            kind: SymbolKind::Function,
            normalize: reduce::normalize_oper,
            head,
            ..Self::builtin(name, arity)
        }
    }
}

#[derive(Clone, Debug)]
pub struct DataType {
    pub name: String,
    pub ctors: Vec<OpsId>,
}

#[derive(Clone, Debug)]
pub struct SymbolTable {
    tables: Vec<OpTable>,
    types: Vec<DataType>,
}

impl SymbolTable {
    pub fn with_builtins() -> Self {
        let tables = vec![
            OpTable::builtin("fail", 0),
            OpTable {
                label: unparse::label_fwd,
                show: unparse::show_fwd,
                normalize: reduce::normalize_fwd,
                head: reduce::head_fwd,
                ..OpTable::builtin("fwd", 1)
            },
            OpTable {
                label: unparse::label_choice,
                show: unparse::show_choice,
                ..OpTable::builtin("choice", 2)
            },
            OpTable {
                label: unparse::label_choice,
                show: unparse::show_choice,
                ..OpTable::builtin("narrowed", 2)
            },
            OpTable {
                label: unparse::label_free,
                ..OpTable::builtin("free", 0)
            },
            OpTable {
                label: unparse::label_literal,
                show: unparse::show_literal,
                ..OpTable::builtin("Int", 0)
            },
            OpTable {
                label: unparse::label_literal,
                show: unparse::show_literal,
                ..OpTable::builtin("Float", 0)
            },
            OpTable {
                label: unparse::label_literal,
                show: unparse::show_literal,
                ..OpTable::builtin("Char", 0)
            },
            OpTable {
                kind: SymbolKind::Partial,
                label: unparse::label_partial,
                show: unparse::show_partial,
                ..OpTable::builtin("partial", 2)
            },
            OpTable {
                kind: SymbolKind::Partial,
                label: unparse::label_partial,
                show: unparse::show_partial,
                ..OpTable::builtin("function", 0)
            },
        ];
        debug_assert_eq!(tables[OpsId::FUNCTION.0 as usize].name, "function");
        Self {
            tables,
            types: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, id: OpsId) -> &OpTable {
        &self.tables[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: OpsId) -> &mut OpTable {
        &mut self.tables[id.0 as usize]
    }

    pub fn try_get(&self, id: OpsId) -> Option<&OpTable> {
        self.tables.get(id.0 as usize)
    }

    pub fn lookup(&self, name: &str) -> Option<OpsId> {
        self.tables
            .iter()
            .position(|t| t.name == name)
            .map(|i| OpsId(i as u32))
    }

    pub fn register(&mut self, table: OpTable) -> OpsId {
        let id = OpsId(self.tables.len() as u32);
        self.tables.push(table);
        id
    }

    pub fn define_function(&mut self, name: &str, arity: usize, head: StepFn) -> OpsId {
        self.register(OpTable::function(name, arity, head))
    }

    /// Registers a data type and its constructors, in tag order.
    pub fn define_type(&mut self, name: &str, ctors: &[(&str, usize)]) -> (TypeId, Vec<OpsId>) {
        let ty = TypeId(self.types.len() as u32);
        let ids: Vec<OpsId> = ctors
            .iter()
            .enumerate()
            .map(|(i, (cname, arity))| {
                self.register(OpTable::constructor(cname, *arity, ty, i as u32))
            })
            .collect();
        self.types.push(DataType {
            name: name.to_string(),
            ctors: ids.clone(),
        });
        (ty, ids)
    }

    pub fn data_type(&self, id: TypeId) -> &DataType {
        &self.types[id.0 as usize]
    }
}
