//! Builtin data types and functions.
//!
//! Each function is a head step: it forces the arguments it is strict in
//! with `hnf_arg`/`nf_arg` and then rewrites the call node in place. When an
//! argument fails or turns out to be a choice the call node has already been
//! rewritten and the step just returns.

use super::reduce::{hnf_arg, nf_arg, Arg};
use super::unparse::{self, partial_spine};
use super::Runtime;
use crate::arena::{Literal, NodeId, Tag};
use crate::error::Step;
use crate::symbols::{OpsId, SymbolKind, SymbolTable, TypeId};
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug)]
pub struct Prelude {
    pub bool_type: TypeId,
    pub false_: OpsId,
    pub true_: OpsId,
    pub success_type: TypeId,
    pub success: OpsId,
    pub unit_type: TypeId,
    pub unit: OpsId,
    pub pair_type: TypeId,
    pub pair: OpsId,
    pub triple_type: TypeId,
    pub triple: OpsId,
    pub list_type: TypeId,
    pub nil: OpsId,
    pub cons: OpsId,
    pub ordering_type: TypeId,
    pub lt: OpsId,
    pub eq: OpsId,
    pub gt: OpsId,

    pub add: OpsId,
    pub sub: OpsId,
    pub mul: OpsId,
    pub div: OpsId,
    pub modulo: OpsId,
    pub equals: OpsId,
    pub compare: OpsId,
    pub choice: OpsId,
    pub failed: OpsId,
    pub unify: OpsId,
    pub conj: OpsId,
    pub cond: OpsId,
    pub strict_apply: OpsId,
    pub ensure_not_free: OpsId,
    pub apply: OpsId,
    pub loop_: OpsId,
}

impl Prelude {
    pub fn install(symbols: &mut SymbolTable) -> Self {
        let (bool_type, b) = symbols.define_type("Bool", &[("False", 0), ("True", 0)]);
        let (success_type, s) = symbols.define_type("Success", &[("Success", 0)]);
        let (unit_type, u) = symbols.define_type("Unit", &[("()", 0)]);
        let (pair_type, p) = symbols.define_type("Pair", &[("(,)", 2)]);
        let (triple_type, t) = symbols.define_type("Triple", &[("(,,)", 3)]);
        let (list_type, l) = symbols.define_type("List", &[("[]", 0), (":", 2)]);
        let (ordering_type, o) = symbols.define_type("Ordering", &[("LT", 0), ("EQ", 0), ("GT", 0)]);
        symbols.get_mut(p[0]).show = unparse::show_tuple;
        symbols.get_mut(t[0]).show = unparse::show_tuple;
        symbols.get_mut(l[1]).show = unparse::show_list;

        Self {
            bool_type,
            false_: b[0],
            true_: b[1],
            success_type,
            success: s[0],
            unit_type,
            unit: u[0],
            pair_type,
            pair: p[0],
            triple_type,
            triple: t[0],
            list_type,
            nil: l[0],
            cons: l[1],
            ordering_type,
            lt: o[0],
            eq: o[1],
            gt: o[2],

            add: symbols.define_function("+", 2, step_add),
            sub: symbols.define_function("-", 2, step_sub),
            mul: symbols.define_function("*", 2, step_mul),
            div: symbols.define_function("div", 2, step_div),
            modulo: symbols.define_function("mod", 2, step_mod),
            equals: symbols.define_function("==", 2, step_equals),
            compare: symbols.define_function("compare", 2, step_compare),
            choice: symbols.define_function("?", 2, step_choice),
            failed: symbols.define_function("failed", 0, step_failed),
            unify: symbols.define_function("=:=", 2, step_unify),
            conj: symbols.define_function("&", 2, step_conj),
            cond: symbols.define_function("&>", 2, step_cond),
            strict_apply: symbols.define_function("$!", 2, step_strict_apply),
            ensure_not_free: symbols.define_function("ensureNotFree", 1, step_ensure_not_free),
            apply: symbols.define_function("apply", 2, step_apply),
            loop_: symbols.define_function("loop", 0, step_loop),
        }
    }
}

fn int_binop(rt: &mut Runtime, root: NodeId, op: fn(i64, i64) -> Option<i64>) -> Step {
    let Arg::Value(x) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let Arg::Value(y) = hnf_arg(rt, root, 1)? else {
        return Ok(());
    };
    match (rt.literal(x), rt.literal(y)) {
        (Some(Literal::Int(a)), Some(Literal::Int(b))) => match op(a, b) {
            Some(v) => rt.rewrite_data(root, OpsId::INT, 0, Literal::Int(v)),
            None => rt.rewrite_fail(root),
        },
        _ => {
            tracing::debug!(call = %rt.label(root), "arithmetic on a non-integer");
            rt.rewrite_fail(root);
        }
    }
    Ok(())
}

/// Integer division rounding toward negative infinity. Division by zero
/// and overflow have no value.
pub fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

pub fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Some(r + b)
    } else {
        Some(r)
    }
}

fn step_add(rt: &mut Runtime, root: NodeId) -> Step {
    int_binop(rt, root, |a, b| Some(a.wrapping_add(b)))
}

fn step_sub(rt: &mut Runtime, root: NodeId) -> Step {
    int_binop(rt, root, |a, b| Some(a.wrapping_sub(b)))
}

fn step_mul(rt: &mut Runtime, root: NodeId) -> Step {
    int_binop(rt, root, |a, b| Some(a.wrapping_mul(b)))
}

fn step_div(rt: &mut Runtime, root: NodeId) -> Step {
    int_binop(rt, root, floor_div)
}

fn step_mod(rt: &mut Runtime, root: NodeId) -> Step {
    int_binop(rt, root, floor_mod)
}

fn step_equals(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(x) = nf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let Arg::Value(y) = nf_arg(rt, root, 1)? else {
        return Ok(());
    };
    let same = (rt.table(x).equals)(rt, x, y);
    let p = rt.prelude();
    rt.rewrite_to(root, if same { p.true_ } else { p.false_ }, &[])?;
    Ok(())
}

fn step_compare(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(x) = nf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let Arg::Value(y) = nf_arg(rt, root, 1)? else {
        return Ok(());
    };
    let p = rt.prelude();
    let result = match (rt.table(x).compare)(rt, x, y) {
        Ordering::Less => p.lt,
        Ordering::Equal => p.eq,
        Ordering::Greater => p.gt,
    };
    rt.rewrite_to(root, result, &[])?;
    Ok(())
}

fn step_choice(rt: &mut Runtime, root: NodeId) -> Step {
    let (l, r) = (rt.successor(root, 0), rt.successor(root, 1));
    let cid = rt.fresh_id();
    rt.rewrite(root, Tag::CHOICE, OpsId::CHOICE, cid, &[l, r])?;
    Ok(())
}

fn step_failed(rt: &mut Runtime, root: NodeId) -> Step {
    rt.rewrite_fail(root);
    Ok(())
}

fn succeed(rt: &mut Runtime, root: NodeId) -> Step {
    let success = rt.prelude().success;
    rt.rewrite_to(root, success, &[])?;
    Ok(())
}

/// `x =:= y`. Two variables are bound to each other; anything else is
/// unified constructor by constructor.
fn step_unify(rt: &mut Runtime, root: NodeId) -> Step {
    let a = rt.skip_fwd(rt.successor(root, 0));
    let b = rt.skip_fwd(rt.successor(root, 1));
    if rt.tag(a) == Tag::FREE && rt.tag(b) == Tag::FREE {
        if rt.aux(a) != rt.aux(b) && !rt.bind_vars(a, b, false) {
            tracing::debug!(x = rt.aux(a), y = rt.aux(b), "variable binding outside a computation");
        }
        return succeed(rt, root);
    }

    let Arg::Value(x) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let Arg::Value(y) = hnf_arg(rt, root, 1)? else {
        return Ok(());
    };
    if rt.ops(x) != rt.ops(y) || rt.table(x).kind == SymbolKind::Partial {
        rt.rewrite_fail(root);
        return Ok(());
    }
    if let (Some(lx), Some(ly)) = (rt.literal(x), rt.literal(y)) {
        return if lx == ly {
            succeed(rt, root)
        } else {
            rt.rewrite_fail(root);
            Ok(())
        };
    }

    let xs = rt.successors(x);
    let ys = rt.successors(y);
    let n = xs.len();
    if n == 0 {
        return succeed(rt, root);
    }

    // One unification per argument, joined by n - 1 conjunctions.
    rt.push_root(root);
    let fresh = rt.allocate_nodes(2 * n - 1);
    rt.pop_root();
    let fresh = fresh?;
    let p = rt.prelude();
    for k in 0..n {
        rt.rewrite_to(fresh[k], p.unify, &[xs[k], ys[k]])?;
    }
    let mut acc = fresh[n - 1];
    for k in (0..n - 1).rev() {
        let c = fresh[n + k];
        rt.rewrite_to(c, p.conj, &[fresh[k], acc])?;
        acc = c;
    }
    rt.rewrite_fwd(root, acc);
    Ok(())
}

fn step_conj(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(_) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let Arg::Value(_) = hnf_arg(rt, root, 1)? else {
        return Ok(());
    };
    succeed(rt, root)
}

/// `c &> e`: `e` once the constraint `c` is satisfied.
fn step_cond(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(_) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let body = rt.successor(root, 1);
    rt.rewrite_fwd(root, body);
    Ok(())
}

fn step_ensure_not_free(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(x) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    rt.rewrite_fwd(root, x);
    Ok(())
}

/// `f $! x`: apply `f` once `x` is in head normal form.
fn step_strict_apply(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(_) = hnf_arg(rt, root, 1)? else {
        return Ok(());
    };
    let (f, x) = (rt.successor(root, 0), rt.successor(root, 1));
    let apply = rt.prelude().apply;
    rt.rewrite_to(root, apply, &[f, x])?;
    Ok(())
}

/// `apply f x`. Adds one argument to a partial application; the last
/// missing argument turns it into a call of the target function.
fn step_apply(rt: &mut Runtime, root: NodeId) -> Step {
    let Arg::Value(f) = hnf_arg(rt, root, 0)? else {
        return Ok(());
    };
    let x = rt.successor(root, 1);
    let remaining = rt.aux(f);
    if rt.table(f).kind != SymbolKind::Partial || remaining == 0 {
        tracing::debug!(function = %rt.show(f), "apply of a saturated value");
        rt.rewrite_fail(root);
        return Ok(());
    }
    if remaining > 1 {
        rt.rewrite(root, Tag::OPER, OpsId::PARTIAL, remaining - 1, &[f, x])?;
        return Ok(());
    }
    let Some((target, mut args)) = partial_spine(rt, f) else {
        rt.rewrite_fail(root);
        return Ok(());
    };
    args.push(x);
    rt.rewrite_to(root, target, &args)?;
    Ok(())
}

/// Never reaches a value. Allocates on every step so that it also runs
/// the collector.
fn step_loop(rt: &mut Runtime, _root: NodeId) -> Step {
    rt.int(0)?;
    Ok(())
}
