use crate::arena::NodeId;
use crate::constraints::{ConstraintStore, Fingerprint};
use crate::shared::Shared;
use std::collections::VecDeque;

/// One pending sub-goal of a computation.
#[derive(Debug)]
pub struct EvalFrame {
    pub node: NodeId,
    pub fingerprint: Shared<Fingerprint>,
    pub constraints: Shared<ConstraintStore>,
    /// Collections this frame may survive before it is rotated.
    pub time_allotment: usize,
    /// Set while the frame waits on an unbound variable.
    pub suspended: bool,
}

impl EvalFrame {
    pub fn new(node: NodeId, time_allotment: usize) -> Self {
        Self {
            node,
            fingerprint: Shared::default(),
            constraints: Shared::default(),
            time_allotment,
            suspended: false,
        }
    }

    /// A sibling sharing this frame's fingerprint and constraints.
    pub fn fork(&self, node: NodeId, time_allotment: usize) -> Self {
        Self {
            node,
            fingerprint: self.fingerprint.clone(),
            constraints: self.constraints.clone(),
            time_allotment,
            suspended: false,
        }
    }
}

/// One activation of `Runtime::evaluate`: a fair queue of frames.
#[derive(Debug, Default)]
pub struct ComputationFrame {
    pub queue: VecDeque<EvalFrame>,
}

impl ComputationFrame {
    pub fn new(root: NodeId, time_allotment: usize) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(EvalFrame::new(root, time_allotment));
        Self { queue }
    }

    /// Moves the front frame to the back.
    pub fn rotate(&mut self) {
        if let Some(frame) = self.queue.pop_front() {
            self.queue.push_back(frame);
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalStats {
    pub solutions: usize,
    pub steps: usize,
    pub forks: usize,
    pub failures: usize,
    /// Frames whose root normalized to an unapplied function.
    pub violations: usize,
    /// Frames dropped because every remaining frame waited on a variable.
    pub floundered: usize,
    pub preemptions: usize,
    pub collections: usize,
    pub step_limit_hit: bool,
}

/// Budget of the frame currently being reduced.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Slice {
    pub remaining: usize,
    pub used: usize,
    pub preempt: bool,
}

impl Slice {
    pub const UNBOUNDED: Slice = Slice {
        remaining: usize::MAX,
        used: 0,
        preempt: false,
    };

    pub fn new(steps: usize) -> Self {
        Self {
            remaining: steps,
            used: 0,
            preempt: false,
        }
    }
}
