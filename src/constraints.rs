//! Constraint store and fingerprint.
//!
//! Both are threaded through forked computations inside `Shared` cells. Each
//! key's bucket is its own `Shared`, so writing one bucket never copies the
//! others even while the outer map is aliased.

use crate::arena::{ChoiceId, NodeId, VarId};
use crate::shared::Shared;
use rustc_hash::{FxHashMap, FxHashSet};

/// One endpoint of a variable binding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BoundVar {
    pub id: VarId,
    pub node: NodeId,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Binding {
    pub bound: NodeId,
    pub partner: NodeId,
    /// Functional-pattern binding between a variable and an unevaluated
    /// expression. Stored in one direction only.
    pub is_lazy: bool,
}

#[derive(Clone, Default, Debug)]
pub struct ConstraintStore {
    eq_var: Shared<FxHashMap<VarId, Shared<Vec<Binding>>>>,
    eq_choice: Shared<FxHashMap<ChoiceId, Shared<FxHashSet<ChoiceId>>>>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var_constraints(&mut self, from: BoundVar, to: BoundVar, is_lazy: bool) {
        self.add_one_var_constraint(from, to.node, is_lazy);
        if !is_lazy {
            self.add_one_var_constraint(to, from.node, is_lazy);
        }
    }

    fn add_one_var_constraint(&mut self, from: BoundVar, to: NodeId, is_lazy: bool) {
        self.eq_var
            .write()
            .entry(from.id)
            .or_default()
            .write()
            .push(Binding {
                bound: from.node,
                partner: to,
                is_lazy,
            });
    }

    pub fn var_bindings(&self, id: VarId) -> &[Binding] {
        self.eq_var
            .read()
            .get(&id)
            .map(|b| b.read().as_slice())
            .unwrap_or(&[])
    }

    pub fn add_choice_constraints(&mut self, a: ChoiceId, b: ChoiceId) {
        self.add_one_choice_constraint(a, b);
        self.add_one_choice_constraint(b, a);
    }

    fn add_one_choice_constraint(&mut self, a: ChoiceId, b: ChoiceId) {
        // Skip the write, and with it a possible copy, when already present.
        if self.eq_choice.read().get(&a).is_some_and(|set| set.read().contains(&b)) {
            return;
        }
        self.eq_choice.write().entry(a).or_default().write().insert(b);
    }

    pub fn choice_partners(&self, id: ChoiceId) -> Option<&FxHashSet<ChoiceId>> {
        self.eq_choice.read().get(&id).map(|s| s.read())
    }

    /// Every choice id reachable from `id` through choice bindings, `id`
    /// excluded.
    pub fn equivalent_choices(&self, id: ChoiceId) -> FxHashSet<ChoiceId> {
        let mut seen = FxHashSet::default();
        seen.insert(id);
        let mut stack = vec![id];
        while let Some(curr) = stack.pop() {
            if let Some(partners) = self.choice_partners(curr) {
                for &p in partners {
                    if seen.insert(p) {
                        stack.push(p);
                    }
                }
            }
        }
        seen.remove(&id);
        seen
    }

    /// Normal (non-lazy) bindings reachable from `id`, as pairs of the bound
    /// variable and its partner. Partners `var_of` does not recognize as
    /// variables are skipped.
    pub fn bound_pairs(
        &self,
        id: VarId,
        var_of: impl Fn(NodeId) -> Option<VarId>,
    ) -> Vec<(BoundVar, BoundVar)> {
        let mut seen = FxHashSet::default();
        seen.insert(id);
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(curr) = stack.pop() {
            for b in self.var_bindings(curr).iter().filter(|b| !b.is_lazy) {
                let Some(pid) = var_of(b.partner) else { continue };
                out.push((
                    BoundVar {
                        id: curr,
                        node: b.bound,
                    },
                    BoundVar {
                        id: pid,
                        node: b.partner,
                    },
                ));
                if seen.insert(pid) {
                    stack.push(pid);
                }
            }
        }
        out
    }

    /// Nodes referenced by bindings; the collector treats them as roots.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.eq_var
            .read()
            .values()
            .flat_map(|bucket| bucket.read().iter().flat_map(|b| [b.bound, b.partner]))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Side {
    Left,
    Right,
}

/// Choice decisions already made along one computation path.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Fingerprint {
    decisions: FxHashMap<ChoiceId, Side>,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ChoiceId) -> Option<Side> {
        self.decisions.get(&id).copied()
    }

    /// Records a decision. A choice is decided once per path; the earlier
    /// decision stands and is returned if there was one.
    pub fn set(&mut self, id: ChoiceId, side: Side) -> Option<Side> {
        match self.decisions.get(&id) {
            Some(prev) => Some(*prev),
            None => {
                self.decisions.insert(id, side);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(id: VarId) -> BoundVar {
        BoundVar {
            id,
            node: NodeId(id as u32),
        }
    }

    #[test]
    fn normal_binding_is_symmetric() {
        let mut cs = ConstraintStore::new();
        cs.add_var_constraints(var(1), var(2), false);
        assert_eq!(cs.var_bindings(1)[0].partner, NodeId(2));
        assert_eq!(cs.var_bindings(2)[0].partner, NodeId(1));
    }

    #[test]
    fn lazy_binding_is_one_way() {
        let mut cs = ConstraintStore::new();
        cs.add_var_constraints(var(1), var(9), true);
        assert_eq!(cs.var_bindings(1).len(), 1);
        assert!(cs.var_bindings(1)[0].is_lazy);
        assert!(cs.var_bindings(9).is_empty());
    }

    #[test]
    fn choice_equivalence_is_transitive_by_reachability() {
        let mut cs = ConstraintStore::new();
        cs.add_choice_constraints(0, 1);
        cs.add_choice_constraints(1, 2);
        let eq: FxHashSet<_> = cs.equivalent_choices(0);
        assert_eq!(eq, [1, 2].into_iter().collect());
        assert!(cs.choice_partners(2).unwrap().contains(&1));
        assert!(cs.equivalent_choices(7).is_empty());
    }

    #[test]
    fn aliased_store_diverges_on_write() {
        let mut a = ConstraintStore::new();
        a.add_choice_constraints(0, 1);
        let mut b = a.clone();
        b.add_choice_constraints(0, 2);
        assert!(!a.choice_partners(0).unwrap().contains(&2));
        assert!(b.choice_partners(0).unwrap().contains(&2));
    }

    #[test]
    fn duplicate_choice_binding_keeps_sharing() {
        let mut a = ConstraintStore::new();
        a.add_choice_constraints(3, 4);
        let mut b = a.clone();
        b.add_choice_constraints(4, 3);
        assert!(Shared::ptr_eq(&a.eq_choice, &b.eq_choice));
    }

    #[test]
    fn bound_pairs_follow_chains() {
        let mut cs = ConstraintStore::new();
        cs.add_var_constraints(var(1), var(2), false);
        cs.add_var_constraints(var(2), var(3), false);
        cs.add_var_constraints(var(3), var(50), true);
        let pairs = cs.bound_pairs(1, |n| Some(n.0 as VarId));
        let ids: FxHashSet<_> = pairs.iter().map(|(_, to)| to.id).collect();
        assert_eq!(ids, [1, 2, 3].into_iter().collect());
        assert!(pairs.iter().all(|(from, to)| from.id != 50 && to.id != 50));
        assert!(pairs.contains(&(var(2), var(3))));
    }

    #[test]
    fn fingerprint_keeps_first_decision() {
        let mut fp = Fingerprint::new();
        assert_eq!(fp.set(5, Side::Left), None);
        assert_eq!(fp.set(5, Side::Right), Some(Side::Left));
        assert_eq!(fp.get(5), Some(Side::Left));
        assert_eq!(fp.get(6), None);
    }
}
