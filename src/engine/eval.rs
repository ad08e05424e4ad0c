//! The fair scheduler.
//!
//! Each `evaluate` call pushes a computation: a queue of frames, one per
//! pending alternative. The front frame is normalized for one slice; what
//! its root turned into decides whether it yields a value, is dropped, is
//! forked at a choice, or goes to the back of the queue.

use super::reduce;
use super::types::{ComputationFrame, EvalFrame, EvalStats, Slice};
use super::unparse::node_kind;
use super::Runtime;
use crate::arena::{ChoiceId, NodeId, TagKind};
use crate::constraints::Side;
use crate::error::{Interrupt, RuntimeError};
use std::ops::ControlFlow;

impl Runtime {
    /// Enumerates the values of `root`, handing each to `on_value` as it is
    /// found. Returning `ControlFlow::Break` abandons the rest of the search.
    ///
    /// Values are produced in breadth-first order over the choices, and an
    /// alternative that never terminates does not stop the others from
    /// being explored. A value is only valid inside the callback; copy out
    /// what you need (e.g. with `show`).
    pub fn evaluate<F>(&mut self, root: NodeId, mut on_value: F) -> Result<EvalStats, RuntimeError>
    where
        F: FnMut(&Runtime, NodeId) -> ControlFlow<()>,
    {
        let outer = self.slice;
        let collections = self.collections;
        self.push_root(root);
        self.computations
            .push(ComputationFrame::new(root, self.config.time_allotment));

        let res = self.run(&mut on_value);

        self.computations.pop();
        self.pop_root();
        self.slice = outer;
        let mut stats = res?;
        stats.collections = self.collections - collections;
        tracing::debug!(
            solutions = stats.solutions,
            steps = stats.steps,
            forks = stats.forks,
            failures = stats.failures,
            "evaluation finished"
        );
        Ok(stats)
    }

    /// Every value of `root`, printed.
    pub fn values(&mut self, root: NodeId) -> Result<Vec<String>, RuntimeError> {
        let mut out = Vec::new();
        self.evaluate(root, |rt, v| {
            out.push(rt.show(v));
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    fn run<F>(&mut self, on_value: &mut F) -> Result<EvalStats, RuntimeError>
    where
        F: FnMut(&Runtime, NodeId) -> ControlFlow<()>,
    {
        let mut stats = EvalStats::default();

        while let Some(frame) = self.current_frame() {
            let expr = frame.node;
            let mut budget = self.config.slice_steps;
            if let Some(limit) = self.config.step_limit {
                if stats.steps >= limit {
                    stats.step_limit_hit = true;
                    tracing::debug!(limit, "step limit reached");
                    break;
                }
                budget = budget.min(limit - stats.steps);
            }

            self.slice = Slice::new(budget);
            let outcome = reduce::normalize(self, expr);
            stats.steps += self.slice.used;

            match outcome {
                Ok(()) => {}
                Err(Interrupt::Preempted) => {
                    stats.preemptions += 1;
                    self.requeue(false);
                    continue;
                }
                Err(Interrupt::Suspended(var)) => {
                    self.requeue(true);
                    let pending = self.pending();
                    tracing::trace!(var, pending, "frame suspended");
                    if self.all_suspended() {
                        stats.floundered += pending;
                        tracing::warn!(frames = pending, "computation floundered on unbound variables");
                        self.abandon();
                        break;
                    }
                    continue;
                }
                Err(Interrupt::Fatal(err)) => return Err(err),
            }

            if self.dispatch(expr, &mut stats, on_value).is_break() {
                self.abandon();
                break;
            }
        }
        Ok(stats)
    }

    /// Acts on a frame whose root is in normal form.
    fn dispatch<F>(&mut self, mut expr: NodeId, stats: &mut EvalStats, on_value: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&Runtime, NodeId) -> ControlFlow<()>,
    {
        loop {
            match self.tag(expr).kind() {
                TagKind::Fail => {
                    stats.failures += 1;
                    self.drop_front();
                    return ControlFlow::Continue(());
                }
                TagKind::Fwd => {
                    expr = self.successor(expr, 0);
                    if let Some(frame) = self.current_frame_mut() {
                        frame.node = expr;
                    }
                }
                TagKind::Choice => {
                    self.fork(expr, stats);
                    return ControlFlow::Continue(());
                }
                TagKind::Oper => {
                    tracing::warn!(
                        value = %self.show(expr),
                        "normalized expression yields a function; discarding"
                    );
                    stats.violations += 1;
                    self.drop_front();
                    return ControlFlow::Continue(());
                }
                TagKind::Ctor(_) | TagKind::Free => {
                    stats.solutions += 1;
                    tracing::trace!(node = expr.0, kind = node_kind(self, expr), "value");
                    let flow = on_value(self, expr);
                    self.drop_front();
                    return flow;
                }
            }
        }
    }

    /// Forks the front frame at `choice`, or follows the choice without
    /// forking when this path has already decided it.
    fn fork(&mut self, choice: NodeId, stats: &mut EvalStats) {
        let cid = self.aux(choice);
        let alts = [self.successor(choice, 0), self.successor(choice, 1)];
        let allotment = self.config.time_allotment;
        let Some(comp) = self.computations.last_mut() else {
            return;
        };
        let Some(mut front) = comp.queue.pop_front() else {
            return;
        };
        front.suspended = false;

        match decided(&front, cid) {
            Decision::Conflict => {
                tracing::trace!(choice = cid, "inconsistent choice bindings");
                stats.failures += 1;
            }
            Decision::Taken(side) => {
                front.node = match side {
                    Side::Left => alts[0],
                    Side::Right => alts[1],
                };
                comp.queue.push_front(front);
            }
            Decision::Open => {
                let mut left = front.fork(alts[0], allotment);
                left.fingerprint.write().set(cid, Side::Left);
                front.node = alts[1];
                front.time_allotment = allotment;
                front.fingerprint.write().set(cid, Side::Right);
                comp.queue.push_back(left);
                comp.queue.push_back(front);
                stats.forks += 1;
                tracing::trace!(choice = cid, pending = comp.queue.len(), "fork");
            }
        }
    }

    /// Sends the front frame to the back with a fresh allotment.
    fn requeue(&mut self, suspended: bool) {
        let allotment = self.config.time_allotment;
        if let Some(comp) = self.computations.last_mut() {
            if let Some(front) = comp.queue.front_mut() {
                front.time_allotment = allotment;
                front.suspended = suspended;
            }
            comp.rotate();
        }
    }

    fn drop_front(&mut self) {
        if let Some(comp) = self.computations.last_mut() {
            comp.queue.pop_front();
        }
    }

    fn abandon(&mut self) {
        if let Some(comp) = self.computations.last_mut() {
            comp.queue.clear();
        }
    }

    /// Bindings live in each frame's own store, so once every queued frame
    /// waits on a variable none of them can make progress.
    fn all_suspended(&self) -> bool {
        self.computations
            .last()
            .is_some_and(|c| c.queue.iter().all(|f| f.suspended))
    }

    fn pending(&self) -> usize {
        self.computations.last().map_or(0, |c| c.queue.len())
    }

    /// Frames queued across every live computation. The frame currently
    /// yielding a value counts until its callback returns.
    pub fn pending_frames(&self) -> usize {
        self.computations.iter().map(|c| c.queue.len()).sum()
    }
}

enum Decision {
    Open,
    Taken(Side),
    /// The choice is tied to choices this path decided both ways.
    Conflict,
}

fn decided(frame: &EvalFrame, cid: ChoiceId) -> Decision {
    let fp = frame.fingerprint.read();
    let mut found = fp.get(cid);
    for other in frame.constraints.read().equivalent_choices(cid) {
        match (found, fp.get(other)) {
            (Some(a), Some(b)) if a != b => return Decision::Conflict,
            (None, b) => found = b,
            _ => {}
        }
    }
    match found {
        Some(side) => Decision::Taken(side),
        None => Decision::Open,
    }
}
