//! Non-local rewrites: hoisting a choice above the node that needs its
//! value, and instantiating free variables.

use crate::arena::{ChoiceId, Literal, NodeId, Tag, TagKind, VarId};
use crate::constraints::BoundVar;
use crate::engine::Runtime;
use crate::error::{Interrupt, RuntimeError, Step};
use crate::symbols::OpsId;
use smallvec::SmallVec;

/// Hoists the choice at successor `i` of `root` above `root`, recording
/// variable bindings when the choice came from narrowing.
pub(crate) fn pull(rt: &mut Runtime, root: NodeId, i: usize) -> Step {
    let choice = rt.skip_fwd(rt.successor(root, i));
    if rt.ops(choice) == OpsId::NARROWED {
        pull_bind(rt, root, i)
    } else {
        pull_tab(rt, root, i).map_err(Interrupt::from)
    }
}

/// `root = f(.., l ?c r, ..)` becomes `f(.., l, ..) ?c f(.., r, ..)`.
///
/// The two copies alias every other successor of `root`, and the rewritten
/// root keeps the choice's identifier, so every path through it is decided
/// the same way as the original choice.
pub fn pull_tab(rt: &mut Runtime, root: NodeId, i: usize) -> Result<(), RuntimeError> {
    rt.push_root(root);
    let fresh = rt.allocate_nodes(2);
    rt.pop_root();
    let fresh = fresh?;

    let choice = rt.skip_fwd(rt.successor(root, i));
    debug_assert_eq!(rt.tag(choice), Tag::CHOICE);
    let (cops, cid) = (rt.ops(choice), rt.aux(choice));
    let alts = [rt.successor(choice, 0), rt.successor(choice, 1)];

    let node = *rt.node(root);
    let mut succs = rt.successors(root);
    for (copy, alt) in fresh.iter().zip(alts) {
        succs[i] = alt;
        rt.rewrite(*copy, node.tag, node.ops, node.aux, &succs)?;
    }
    rt.rewrite(root, Tag::CHOICE, cops, cid, &[fresh[0], fresh[1]])?;
    tracing::trace!(root = root.0, choice = cid, position = i, "pull-tab");
    Ok(())
}

/// Pull-tab for a choice created by narrowing a variable. Every variable
/// bound to it is narrowed as well and tied to it, so bound variables
/// always take the same constructor.
pub fn pull_bind(rt: &mut Runtime, root: NodeId, i: usize) -> Step {
    let choice = rt.skip_fwd(rt.successor(root, i));
    let var = rt.aux(choice);
    pull_tab(rt, root, i)?;
    bind_generators(rt, var)
}

fn bind_generators(rt: &mut Runtime, var: VarId) -> Step {
    let pairs = {
        let view: &Runtime = rt;
        match view.current_frame() {
            Some(frame) => frame
                .constraints
                .read()
                .bound_pairs(var, |n| variable_of(view, n)),
            None => return Ok(()),
        }
    };
    for (from, to) in pairs {
        for end in [from.node, to.node] {
            let node = rt.skip_fwd(end);
            if rt.tag(node) == Tag::FREE && rt.literal(node).is_some() {
                instantiate(rt, node)?;
            }
        }
        link(rt, from, to);
    }
    Ok(())
}

#[derive(Default)]
struct Generator {
    choices: SmallVec<[ChoiceId; 4]>,
    alts: SmallVec<[NodeId; 4]>,
}

/// Inner choice ids and alternatives of a narrowed variable, in
/// constructor order.
fn generator(rt: &Runtime, var: NodeId) -> Generator {
    let mut out = Generator::default();
    let mut curr = rt.skip_fwd(var);
    if rt.ops(curr) == OpsId::NARROWED {
        out.alts.push(rt.skip_fwd(rt.successor(curr, 0)));
        curr = rt.skip_fwd(rt.successor(curr, 1));
        while rt.ops(curr) == OpsId::CHOICE {
            out.choices.push(rt.aux(curr));
            out.alts.push(rt.skip_fwd(rt.successor(curr, 0)));
            curr = rt.skip_fwd(rt.successor(curr, 1));
        }
    }
    if matches!(rt.tag(curr).kind(), TagKind::Ctor(_)) {
        out.alts.push(curr);
    }
    out
}

/// Ties two narrowed variables together: the choice at each position of one
/// generator to the choice at the same position of the other, and the
/// fields of matching alternatives pairwise.
fn link(rt: &mut Runtime, a: BoundVar, b: BoundVar) {
    let linked = match rt.current_frame() {
        Some(frame) => frame
            .constraints
            .read()
            .choice_partners(a.id)
            .is_some_and(|p| p.contains(&b.id)),
        None => return,
    };
    if linked {
        return;
    }
    let (ga, gb) = (generator(rt, a.node), generator(rt, b.node));
    let same_shape = ga.alts.len() == gb.alts.len()
        && ga.choices.len() == gb.choices.len()
        && ga.alts.iter().zip(&gb.alts).all(|(&x, &y)| rt.ops(x) == rt.ops(y));
    if !same_shape {
        tracing::debug!(a = a.id, b = b.id, "bound variables narrowed to different types");
        return;
    }

    let mut fields: SmallVec<[(BoundVar, BoundVar); 4]> = SmallVec::new();
    for (&x, &y) in ga.alts.iter().zip(&gb.alts) {
        for (fx, fy) in rt.successors(x).into_iter().zip(rt.successors(y)) {
            if let (Some(ix), Some(iy)) = (variable_of(rt, fx), variable_of(rt, fy)) {
                fields.push((BoundVar { id: ix, node: fx }, BoundVar { id: iy, node: fy }));
            }
        }
    }
    let Some(frame) = rt.current_frame_mut() else {
        return;
    };
    let cs = frame.constraints.write();
    cs.add_choice_constraints(a.id, b.id);
    for (&ca, &cb) in ga.choices.iter().zip(&gb.choices) {
        cs.add_choice_constraints(ca, cb);
    }
    for &(fx, fy) in &fields {
        cs.add_var_constraints(fx, fy, false);
    }
    tracing::trace!(a = a.id, b = b.id, fields = fields.len(), "bound generators");
}

/// Variable id of a node that is, or was narrowed from, a free variable.
pub(crate) fn variable_of(rt: &Runtime, id: NodeId) -> Option<VarId> {
    let id = rt.skip_fwd(id);
    match rt.ops(id) {
        OpsId::FREE | OpsId::NARROWED => Some(rt.aux(id)),
        _ => None,
    }
}

/// Rewrites a typed free variable in place into a choice over the
/// constructors of its type, each applied to fresh variables.
///
/// The outermost choice carries the variable's id and is marked `NARROWED`;
/// the inner ones are ordinary choices. A type with one constructor becomes
/// an indirection to it, and the variables bound to it are instantiated
/// right away. A type with none becomes a failure. An untyped variable
/// cannot be narrowed and suspends the step.
pub fn narrow(rt: &mut Runtime, var: NodeId) -> Step {
    let vid = rt.aux(var);
    if instantiate(rt, var)? == 1 {
        bind_generators(rt, vid)?;
    }
    Ok(())
}

/// Builds the generator of `var` and returns its number of constructors.
fn instantiate(rt: &mut Runtime, var: NodeId) -> Result<usize, Interrupt> {
    let vid = rt.aux(var);
    let Some(Literal::Type(ty)) = rt.literal(var) else {
        return Err(Interrupt::Suspended(vid));
    };
    let ctors: SmallVec<[(OpsId, usize); 4]> = rt
        .symbols()
        .data_type(ty)
        .ctors
        .iter()
        .map(|&c| (c, rt.symbols().get(c).arity))
        .collect();
    let n = ctors.len();
    if n == 0 {
        rt.rewrite_fail(var);
        return Ok(0);
    }

    // One node per constructor, one per argument, and the inner choices.
    let total = n + ctors.iter().map(|(_, a)| a).sum::<usize>() + n.saturating_sub(2);
    rt.push_root(var);
    let fresh = rt.allocate_nodes(total);
    rt.pop_root();
    let fresh = fresh?;
    let mut cursor = 0;
    let mut take = || {
        cursor += 1;
        fresh[cursor - 1]
    };

    let mut alts: SmallVec<[NodeId; 4]> = SmallVec::new();
    for &(ctor, arity) in &ctors {
        let node = take();
        let mut args: SmallVec<[NodeId; 4]> = SmallVec::new();
        for _ in 0..arity {
            let arg = take();
            let aid = rt.fresh_id();
            rt.init_free_var(arg, aid, None);
            args.push(arg);
        }
        rt.rewrite_to(node, ctor, &args)?;
        alts.push(node);
    }

    if n == 1 {
        rt.rewrite_fwd(var, alts[0]);
        tracing::trace!(var = vid, "narrowed to single constructor");
        return Ok(1);
    }

    let mut acc = alts[n - 1];
    for k in (1..n - 1).rev() {
        let inner = take();
        let cid = rt.fresh_id();
        rt.rewrite(inner, Tag::CHOICE, OpsId::CHOICE, cid, &[alts[k], acc])?;
        acc = inner;
    }
    rt.rewrite(var, Tag::CHOICE, OpsId::NARROWED, vid, &[alts[0], acc])?;
    tracing::trace!(var = vid, alternatives = n, "narrowed");
    Ok(n)
}
