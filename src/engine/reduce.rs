//! Reduction: the N (normalize) and H (head normalize) drivers and the
//! table entries for the builtin node forms.
//!
//! A step either finishes its rewrite or raises an `Interrupt` before
//! touching the graph, so any frame can be abandoned between two steps and
//! resumed later by normalizing its root again.

use crate::arena::{NodeId, Tag, TagKind};
use crate::engine::rewrite;
use crate::engine::unparse::node_kind;
use crate::engine::Runtime;
use crate::error::{Interrupt, Step};
use crate::symbols::SymbolKind;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Arg {
    Value(NodeId),
    // The enclosing node was rewritten to a failure or a pulled-up choice.
    Rewritten,
}

impl Runtime {
    pub(crate) fn tick(&mut self) -> Step {
        if self.slice.preempt || self.slice.remaining == 0 {
            return Err(Interrupt::Preempted);
        }
        self.slice.remaining -= 1;
        self.slice.used += 1;
        Ok(())
    }
}

pub fn normalize(rt: &mut Runtime, id: NodeId) -> Step {
    rt.tick()?;
    let step = rt.table(id).normalize;
    step(rt, id)
}

pub fn head(rt: &mut Runtime, id: NodeId) -> Step {
    rt.tick()?;
    tracing::trace!(node = id.0, kind = node_kind(rt, id), "head step");
    let step = rt.table(id).head;
    step(rt, id)
}

pub fn hnf(rt: &mut Runtime, id: NodeId) -> Result<NodeId, Interrupt> {
    let mut curr = rt.skip_fwd(id);
    loop {
        if rt.tag(curr) != Tag::OPER || rt.table(curr).kind == SymbolKind::Partial {
            return Ok(curr);
        }
        head(rt, curr)?;
        curr = rt.skip_fwd(curr);
    }
}

/// Forces successor `i` of `root` to head normal form.
///
/// Failures and choices are propagated by rewriting `root`; a typed free
/// variable is narrowed first, an untyped one suspends the step.
pub fn hnf_arg(rt: &mut Runtime, root: NodeId, i: usize) -> Result<Arg, Interrupt> {
    let succ = rt.successor(root, i);
    let arg = hnf(rt, succ)?;
    if arg != succ {
        rt.set_successor(root, i, arg);
    }
    if rt.tag(arg) == Tag::FREE {
        rewrite::narrow(rt, arg)?;
    }
    let arg = rt.skip_fwd(arg);
    settle(rt, root, i, arg)
}

pub fn nf_arg(rt: &mut Runtime, root: NodeId, i: usize) -> Result<Arg, Interrupt> {
    let Arg::Value(arg) = hnf_arg(rt, root, i)? else {
        return Ok(Arg::Rewritten);
    };
    normalize(rt, arg)?;
    let arg = rt.skip_fwd(arg);
    settle(rt, root, i, arg)
}

fn settle(rt: &mut Runtime, root: NodeId, i: usize, arg: NodeId) -> Result<Arg, Interrupt> {
    match rt.tag(arg).kind() {
        TagKind::Fail => {
            rt.rewrite_fail(root);
            Ok(Arg::Rewritten)
        }
        TagKind::Choice => {
            rewrite::pull(rt, root, i)?;
            Ok(Arg::Rewritten)
        }
        TagKind::Free => Err(Interrupt::Suspended(rt.aux(arg))),
        TagKind::Oper | TagKind::Ctor(_) => Ok(Arg::Value(arg)),
        TagKind::Fwd => unreachable!("indirection survived skip_fwd at {:?}", arg),
    }
}

pub fn step_noop(_: &mut Runtime, _: NodeId) -> Step {
    Ok(())
}

pub fn normalize_fwd(rt: &mut Runtime, id: NodeId) -> Step {
    let target = rt.successor(id, 0);
    normalize(rt, target)
}

pub fn head_fwd(rt: &mut Runtime, id: NodeId) -> Step {
    let target = rt.successor(id, 0);
    hnf(rt, target).map(|_| ())
}

pub fn normalize_oper(rt: &mut Runtime, id: NodeId) -> Step {
    let r = hnf(rt, id)?;
    if matches!(rt.tag(r).kind(), TagKind::Ctor(_)) {
        normalize(rt, r)?;
    }
    Ok(())
}

/// N for constructors: normalize successors left to right. A failing
/// successor fails the constructor; a choice is pulled above it.
pub fn normalize_ctor(rt: &mut Runtime, root: NodeId) -> Step {
    for i in 0..rt.arity(root) {
        let succ = rt.successor(root, i);
        normalize(rt, succ)?;
        let s = rt.skip_fwd(succ);
        if s != succ {
            rt.set_successor(root, i, s);
        }
        match rt.tag(s).kind() {
            TagKind::Fail => {
                rt.rewrite_fail(root);
                return Ok(());
            }
            TagKind::Choice => {
                rewrite::pull(rt, root, i)?;
                return Ok(());
            }
            _ => {}
        }
    }
    Ok(())
}
