use crate::arena::VarId;
use crate::symbols::OpsId;
use thiserror::Error;

/// Fatal runtime errors. Search failure and policy violations are not
/// errors; they stay local to the frame that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("node pool exhausted: requested {requested} slots with {live} live of {capacity}")]
    Exhausted {
        requested: usize,
        live: usize,
        capacity: usize,
    },

    #[error("arity {arity} is outside the pooled range (bound {bound})")]
    ArityOutOfRange { arity: usize, bound: usize },

    #[error("no operation table registered for {0:?}")]
    UnknownSymbol(OpsId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a reduction step stopped before finishing its rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupt {
    /// The current slice ran out; the frame goes to the back of the queue.
    Preempted,
    /// A strict position needs a variable nothing has bound yet.
    Suspended(VarId),
    Fatal(RuntimeError),
}

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Fatal(err)
    }
}

/// Result of one reduction step.
pub type Step = Result<(), Interrupt>;
