use proptest::prelude::*;
use spindle::arena::VarId;
use spindle::constraints::{BoundVar, ConstraintStore};
use spindle::engine::primitives::{floor_div, floor_mod};
use spindle::shared::Shared;
use spindle::{NodeId, Runtime, RuntimeConfig};

fn var(id: VarId) -> BoundVar {
    BoundVar {
        id,
        node: NodeId(id as u32),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_fwd_chains_are_invisible(len in 0usize..40, v in -1_000_000i64..1_000_000) {
        let mut rt = Runtime::default();
        let p = rt.prelude();
        let mut node = rt.int(v).unwrap();
        for _ in 0..len {
            node = rt.fwd(node).unwrap();
        }
        prop_assert_eq!(rt.show(node), v.to_string());

        let sum = rt.make(p.add, &[node, node]).unwrap();
        rt.normalize(sum).unwrap();
        prop_assert_eq!(rt.int_value(sum), Some(2 * v));
    }

    #[test]
    fn prop_normal_bindings_are_symmetric(pairs in prop::collection::vec((0u64..12, 0u64..12), 0..30)) {
        let mut cs = ConstraintStore::new();
        for &(a, b) in &pairs {
            cs.add_var_constraints(var(a), var(b), false);
        }
        for id in 0u64..12 {
            for binding in cs.var_bindings(id) {
                let partner = binding.partner.0 as VarId;
                let back = cs
                    .var_bindings(partner)
                    .iter()
                    .any(|b| b.partner == NodeId(id as u32));
                prop_assert!(back, "{} -> {} has no reverse binding", id, partner);
            }
        }
    }

    #[test]
    fn prop_choice_bindings_are_symmetric(pairs in prop::collection::vec((0u64..12, 0u64..12), 0..30)) {
        let mut cs = ConstraintStore::new();
        for &(a, b) in &pairs {
            cs.add_choice_constraints(a, b);
        }
        for &(a, b) in &pairs {
            prop_assert!(a == b || cs.equivalent_choices(a).contains(&b));
            prop_assert!(a == b || cs.equivalent_choices(b).contains(&a));
        }
    }

    #[test]
    fn prop_writes_never_leak_into_aliases(
        base in prop::collection::vec(any::<i32>(), 0..16),
        extra in prop::collection::vec(any::<i32>(), 1..16),
    ) {
        let original = Shared::new(base.clone());
        let mut copy = original.clone();
        for &x in &extra {
            copy.write().push(x);
        }
        prop_assert_eq!(original.read(), &base);
        prop_assert_eq!(copy.read().len(), base.len() + extra.len());
        prop_assert!(!Shared::ptr_eq(&original, &copy));
    }

    #[test]
    fn prop_floor_division_identity(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(b != 0 && !(a == i64::MIN && b == -1));
        let q = floor_div(a, b).unwrap();
        let r = floor_mod(a, b).unwrap();
        prop_assert_eq!(q.wrapping_mul(b).wrapping_add(r), a);
        prop_assert!(r == 0 || r.signum() == b.signum());
        prop_assert!(r.unsigned_abs() < b.unsigned_abs());
    }

    #[test]
    fn prop_every_alternative_is_found_in_order(
        xs in prop::collection::vec(-50i64..50, 1..6),
        k in -50i64..50,
    ) {
        let mut rt = Runtime::default();
        let p = rt.prelude();
        let mut alts = rt.int(xs[xs.len() - 1]).unwrap();
        for &x in xs.iter().rev().skip(1) {
            let lit = rt.int(x).unwrap();
            alts = rt.make(p.choice, &[lit, alts]).unwrap();
        }
        let offset = rt.int(k).unwrap();
        let root = rt.make(p.add, &[alts, offset]).unwrap();

        let expected: Vec<String> = xs.iter().map(|x| (x + k).to_string()).collect();
        prop_assert_eq!(rt.values(root).unwrap(), expected);
    }

    #[test]
    fn prop_collection_keeps_rooted_values(garbage in 0usize..300, v in any::<i64>()) {
        let mut rt = Runtime::new(RuntimeConfig::with_fixed_pool(16)).unwrap();
        let kept = rt.int(v).unwrap();
        rt.push_root(kept);
        for i in 0..garbage {
            rt.int(i as i64).unwrap();
        }
        prop_assert_eq!(rt.int_value(kept), Some(v));
        prop_assert!(rt.graph().live_count() <= 16);
    }
}
