use spindle::{NodeId, Runtime};
use std::ops::ControlFlow;

fn all_values(rt: &mut Runtime, root: NodeId) -> (Vec<String>, spindle::EvalStats) {
    let mut out = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            out.push(rt.show(v));
            ControlFlow::Continue(())
        })
        .unwrap();
    (out, stats)
}

#[test]
fn test_shared_choice_is_decided_once() {
    // let x = 1 ? 2 in x + x
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let one = rt.int(1).unwrap();
    let two = rt.int(2).unwrap();
    let x = rt.make(p.choice, &[one, two]).unwrap();
    let root = rt.make(p.add, &[x, x]).unwrap();

    let (values, stats) = all_values(&mut rt, root);
    assert_eq!(values, vec!["2", "4"]);
    // The second occurrence is followed, not forked.
    assert_eq!(stats.forks, 1);
}

#[test]
fn test_shared_choice_inside_constructor() {
    // let x = 1 ? 2 in (x, x)
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let one = rt.int(1).unwrap();
    let two = rt.int(2).unwrap();
    let x = rt.make(p.choice, &[one, two]).unwrap();
    let root = rt.make(p.pair, &[x, x]).unwrap();

    let (values, _) = all_values(&mut rt, root);
    assert_eq!(values, vec!["(1, 1)", "(2, 2)"]);
}

#[test]
fn test_independent_variables_enumerate_all_pairs() {
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.bool_type)).unwrap();
    let y = rt.free_var(Some(p.bool_type)).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let root = rt.make(p.pair, &[ex, ey]).unwrap();

    let (values, stats) = all_values(&mut rt, root);
    assert_eq!(
        values,
        vec!["(False, False)", "(False, True)", "(True, False)", "(True, True)"]
    );
    assert_eq!(stats.forks, 3);
}

#[test]
fn test_bound_variables_take_the_same_constructor() {
    // (x =:= y) &> (ensureNotFree x, ensureNotFree y)
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.bool_type)).unwrap();
    let y = rt.free_var(Some(p.bool_type)).unwrap();
    let bind = rt.make(p.unify, &[x, y]).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let pair = rt.make(p.pair, &[ex, ey]).unwrap();
    let root = rt.make(p.cond, &[bind, pair]).unwrap();

    let (values, stats) = all_values(&mut rt, root);
    assert_eq!(values, vec!["(False, False)", "(True, True)"]);
    assert_eq!(stats.forks, 1);
}

#[test]
fn test_bound_variables_agree_past_the_first_choice() {
    // Ordering has three constructors, so its generator nests two choices.
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.ordering_type)).unwrap();
    let y = rt.free_var(Some(p.ordering_type)).unwrap();
    let bind = rt.make(p.unify, &[x, y]).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let pair = rt.make(p.pair, &[ex, ey]).unwrap();
    let root = rt.make(p.cond, &[bind, pair]).unwrap();

    let (values, stats) = all_values(&mut rt, root);
    assert_eq!(values, vec!["(LT, LT)", "(EQ, EQ)", "(GT, GT)"]);
    // Only x's choices fork; y follows them.
    assert_eq!(stats.forks, 2);
}

fn field_bindings(rt: &Runtime, pair: NodeId) -> Vec<bool> {
    let xs = rt.skip_fwd(rt.successor(pair, 0));
    let ys = rt.skip_fwd(rt.successor(pair, 1));
    (0..rt.arity(xs))
        .map(|i| {
            let (fx, fy) = (rt.successor(xs, i), rt.successor(ys, i));
            rt.bound_variables(fx) == vec![fy]
        })
        .collect()
}

#[test]
fn test_bound_variables_bind_their_fields() {
    // (x =:= y) &> (ensureNotFree x, ensureNotFree y), x and y lists
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.list_type)).unwrap();
    let y = rt.free_var(Some(p.list_type)).unwrap();
    let bind = rt.make(p.unify, &[x, y]).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let pair = rt.make(p.pair, &[ex, ey]).unwrap();
    let root = rt.make(p.cond, &[bind, pair]).unwrap();

    let mut shown = Vec::new();
    let mut fields = Vec::new();
    rt.evaluate(root, |rt, v| {
        shown.push(rt.show(v));
        fields.push(field_bindings(rt, v));
        ControlFlow::Continue(())
    })
    .unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0], "([], [])");
    assert!(fields[0].is_empty());
    assert_eq!(fields[1], vec![true, true]);
}

#[test]
fn test_single_constructor_variables_bind_their_fields() {
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.pair_type)).unwrap();
    let y = rt.free_var(Some(p.pair_type)).unwrap();
    let bind = rt.make(p.unify, &[x, y]).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let pair = rt.make(p.pair, &[ex, ey]).unwrap();
    let root = rt.make(p.cond, &[bind, pair]).unwrap();

    let mut fields = Vec::new();
    let stats = rt
        .evaluate(root, |rt, v| {
            fields.push(field_bindings(rt, v));
            ControlFlow::Continue(())
        })
        .unwrap();
    assert_eq!(fields, vec![vec![true, true]]);
    assert_eq!(stats.forks, 0);
}

#[test]
fn test_unify_variable_with_value() {
    // (x =:= True) &> x
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.bool_type)).unwrap();
    let t = rt.make(p.true_, &[]).unwrap();
    let bind = rt.make(p.unify, &[x, t]).unwrap();
    let root = rt.make(p.cond, &[bind, x]).unwrap();

    let (values, stats) = all_values(&mut rt, root);
    assert_eq!(values, vec!["True"]);
    assert_eq!(stats.failures, 1);
}

#[test]
fn test_unify_structures_with_variables() {
    // ((x, False) =:= (True, y)) &> (x, y)
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.bool_type)).unwrap();
    let y = rt.free_var(Some(p.bool_type)).unwrap();
    let t = rt.make(p.true_, &[]).unwrap();
    let f = rt.make(p.false_, &[]).unwrap();
    let lhs = rt.make(p.pair, &[x, f]).unwrap();
    let rhs = rt.make(p.pair, &[t, y]).unwrap();
    let bind = rt.make(p.unify, &[lhs, rhs]).unwrap();
    let ex = rt.make(p.ensure_not_free, &[x]).unwrap();
    let ey = rt.make(p.ensure_not_free, &[y]).unwrap();
    let out = rt.make(p.pair, &[ex, ey]).unwrap();
    let root = rt.make(p.cond, &[bind, out]).unwrap();

    let (values, _) = all_values(&mut rt, root);
    assert_eq!(values, vec!["(True, False)"]);
}

#[test]
fn test_equality_narrows_both_sides() {
    // x == False, with x a free Bool
    let mut rt = Runtime::default();
    let p = rt.prelude();
    let x = rt.free_var(Some(p.bool_type)).unwrap();
    let f = rt.make(p.false_, &[]).unwrap();
    let root = rt.make(p.equals, &[x, f]).unwrap();

    let (values, _) = all_values(&mut rt, root);
    assert_eq!(values, vec!["True", "False"]);
}
