use super::Runtime;
use crate::arena::{Literal, NodeId, Slots, Tag, TagKind};
use crate::symbols::{OpsId, SymbolKind};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::cmp::Ordering;

const DEBUG_REPR_MAX_DEPTH: usize = 6;
const DEBUG_REPR_MAX_NODES: usize = 200;
const DEBUG_REPR_MAX_ARGS: usize = 6;

pub fn node_kind(rt: &Runtime, id: NodeId) -> &'static str {
    match rt.tag(id).kind() {
        TagKind::Fail => "Fail",
        TagKind::Free => "Free",
        TagKind::Fwd => "Fwd",
        TagKind::Choice => "Choice",
        TagKind::Oper => "Oper",
        TagKind::Ctor(_) => "Ctor",
    }
}

impl Runtime {
    pub fn label(&self, id: NodeId) -> String {
        (self.table(id).label)(self, id)
    }

    pub fn show(&self, id: NodeId) -> String {
        let mut out = String::new();
        show_node(self, id, &mut out, true);
        out
    }

    /// Raw graph dump for logs. Marks indirections and shared nodes and gives
    /// up past a fixed depth and size.
    pub fn repr(&self, id: NodeId) -> String {
        enum Item {
            Node(NodeId, usize),
            Text(&'static str),
        }

        let mut out = String::new();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut budget = DEBUG_REPR_MAX_NODES;
        let mut stack = vec![Item::Node(id, 0)];

        while let Some(item) = stack.pop() {
            let (curr, depth) = match item {
                Item::Text(s) => {
                    out.push_str(s);
                    continue;
                }
                Item::Node(curr, depth) => (curr, depth),
            };
            if budget == 0 || depth > DEBUG_REPR_MAX_DEPTH {
                out.push_str("...");
                continue;
            }
            if !seen.insert(curr) {
                out.push_str(&format!("<shared {}>", curr.0));
                continue;
            }
            budget -= 1;

            let succs = self.successors(curr);
            if self.tag(curr) == Tag::FWD {
                out.push_str(&format!("fwd#{} ", curr.0));
                stack.push(Item::Node(succs[0], depth + 1));
                continue;
            }
            if succs.is_empty() {
                out.push_str(&self.label(curr));
                continue;
            }
            let limit = DEBUG_REPR_MAX_ARGS.min(succs.len());
            stack.push(Item::Text(")"));
            if succs.len() > DEBUG_REPR_MAX_ARGS {
                stack.push(Item::Text(" ..."));
            }
            for s in succs.iter().take(limit).rev() {
                stack.push(Item::Node(*s, depth + 1));
                stack.push(Item::Text(" "));
            }
            out.push('(');
            out.push_str(&self.label(curr));
        }
        out
    }
}

fn show_node(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    let id = rt.skip_fwd(id);
    (rt.table(id).show)(rt, id, out, outer)
}

pub fn label_name(rt: &Runtime, id: NodeId) -> String {
    rt.table(id).name.clone()
}

pub fn label_fwd(rt: &Runtime, id: NodeId) -> String {
    rt.label(rt.skip_fwd(id))
}

pub fn label_choice(rt: &Runtime, id: NodeId) -> String {
    format!("?{}", rt.aux(id))
}

pub fn label_free(rt: &Runtime, id: NodeId) -> String {
    format!("_x{}", rt.aux(id))
}

pub fn label_literal(rt: &Runtime, id: NodeId) -> String {
    match rt.literal(id) {
        Some(Literal::Int(v)) => v.to_string(),
        Some(Literal::Float(v)) => format!("{:?}", v),
        Some(Literal::Char(c)) => format!("{:?}", c),
        Some(Literal::Symbol(ops)) => rt.symbols().get(ops).name.clone(),
        Some(Literal::Type(ty)) => rt.symbols().data_type(ty).name.clone(),
        None => rt.table(id).name.clone(),
    }
}

pub fn label_partial(rt: &Runtime, id: NodeId) -> String {
    match partial_spine(rt, id) {
        Some((target, _)) => rt.symbols().get(target).name.clone(),
        None => rt.table(id).name.clone(),
    }
}

pub fn partial_spine(rt: &Runtime, id: NodeId) -> Option<(OpsId, SmallVec<[NodeId; 4]>)> {
    let mut args: SmallVec<[NodeId; 4]> = SmallVec::new();
    let mut curr = rt.skip_fwd(id);
    loop {
        match rt.ops(curr) {
            OpsId::PARTIAL => {
                args.push(rt.successor(curr, 1));
                curr = rt.skip_fwd(rt.successor(curr, 0));
            }
            OpsId::FUNCTION => {
                let Some(Literal::Symbol(target)) = rt.literal(curr) else {
                    return None;
                };
                args.reverse();
                return Some((target, args));
            }
            _ => return None,
        }
    }
}

fn show_application(rt: &Runtime, name: &str, args: &[NodeId], out: &mut String, outer: bool) {
    let wrap = !outer && !args.is_empty();
    if wrap {
        out.push('(');
    }
    out.push_str(name);
    for &a in args {
        out.push(' ');
        show_node(rt, a, out, false);
    }
    if wrap {
        out.push(')');
    }
}

pub fn show_applicative(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    let succs = rt.successors(id);
    show_application(rt, &rt.label(id), &succs, out, outer);
}

pub fn show_tuple(rt: &Runtime, id: NodeId, out: &mut String, _outer: bool) {
    out.push('(');
    for (i, s) in rt.successors(id).iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        show_node(rt, *s, out, true);
    }
    out.push(')');
}

/// `[a, b]` for a list ending in `[]`, `(a : rest)` otherwise.
pub fn show_list(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    let SymbolKind::Ctor { data_type, .. } = rt.table(id).kind else {
        return show_applicative(rt, id, out, outer);
    };
    let mut items: SmallVec<[NodeId; 4]> = SmallVec::new();
    let mut curr = id;
    while rt.ops(curr) == rt.ops(id) {
        items.push(rt.successor(curr, 0));
        curr = rt.skip_fwd(rt.successor(curr, 1));
    }
    let nil = SymbolKind::Ctor { data_type, index: 0 };
    if rt.table(curr).kind == nil {
        out.push('[');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            show_node(rt, *item, out, true);
        }
        out.push(']');
        return;
    }
    if !outer {
        out.push('(');
    }
    for item in &items {
        show_node(rt, *item, out, false);
        out.push_str(" : ");
    }
    show_node(rt, curr, out, false);
    if !outer {
        out.push(')');
    }
}

pub fn show_fwd(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    show_node(rt, rt.successor(id, 0), out, outer)
}

pub fn show_choice(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    if !outer {
        out.push('(');
    }
    show_node(rt, rt.successor(id, 0), out, false);
    out.push_str(&format!(" ?{} ", rt.aux(id)));
    show_node(rt, rt.successor(id, 1), out, false);
    if !outer {
        out.push(')');
    }
}

pub fn show_literal(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    let negative = match rt.literal(id) {
        Some(Literal::Int(v)) => v < 0,
        Some(Literal::Float(v)) => v.is_sign_negative(),
        _ => false,
    };
    let text = label_literal(rt, id);
    if negative && !outer {
        out.push('(');
        out.push_str(&text);
        out.push(')');
    } else {
        out.push_str(&text);
    }
}

pub fn show_partial(rt: &Runtime, id: NodeId, out: &mut String, outer: bool) {
    match partial_spine(rt, id) {
        Some((target, args)) => {
            show_application(rt, &rt.symbols().get(target).name, &args, out, outer)
        }
        None => out.push_str("<function>"),
    }
}

pub fn equals_structural(rt: &Runtime, a: NodeId, b: NodeId) -> bool {
    let (a, b) = (rt.skip_fwd(a), rt.skip_fwd(b));
    if a == b {
        return true;
    }
    let (na, nb) = (rt.node(a), rt.node(b));
    if na.tag != nb.tag || na.ops != nb.ops {
        return false;
    }
    if matches!(na.tag.kind(), TagKind::Free | TagKind::Choice) && na.aux != nb.aux {
        return false;
    }
    match (na.slots, nb.slots) {
        (Slots::Data(x), Slots::Data(y)) => x == y,
        _ => rt
            .successors(a)
            .iter()
            .zip(rt.successors(b).iter())
            .all(|(&x, &y)| (rt.table(x).equals)(rt, x, y)),
    }
}

pub fn compare_structural(rt: &Runtime, a: NodeId, b: NodeId) -> Ordering {
    let (a, b) = (rt.skip_fwd(a), rt.skip_fwd(b));
    if a == b {
        return Ordering::Equal;
    }
    let (na, nb) = (rt.node(a), rt.node(b));
    let head = na
        .tag
        .cmp(&nb.tag)
        .then(na.ops.cmp(&nb.ops))
        .then(na.aux.cmp(&nb.aux));
    if head != Ordering::Equal {
        return head;
    }
    match (na.slots, nb.slots) {
        (Slots::Data(x), Slots::Data(y)) => compare_literal(x, y),
        _ => {
            for (&x, &y) in rt.successors(a).iter().zip(rt.successors(b).iter()) {
                let ord = (rt.table(x).compare)(rt, x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
    }
}

fn compare_literal(x: Literal, y: Literal) -> Ordering {
    match (x, y) {
        (Literal::Int(a), Literal::Int(b)) => a.cmp(&b),
        (Literal::Float(a), Literal::Float(b)) => a.total_cmp(&b),
        (Literal::Char(a), Literal::Char(b)) => a.cmp(&b),
        (Literal::Symbol(a), Literal::Symbol(b)) => a.cmp(&b),
        (Literal::Type(a), Literal::Type(b)) => a.0.cmp(&b.0),
        _ => Ordering::Equal,
    }
}
