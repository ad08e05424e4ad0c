//! Execution engine for lazy functional-logic programs.
//!
//! Programs are graphs of nodes rewritten in place. Non-determinism is
//! represented by choice nodes that are hoisted toward the root and explored
//! by a fair breadth-first scheduler, so every value of an expression is
//! eventually produced even when some alternatives never terminate.

pub mod arena;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod shared;
pub mod symbols;

pub use arena::{Literal, NodeId, Tag};
pub use config::RuntimeConfig;
pub use engine::{EvalStats, Prelude, Runtime};
pub use error::{Interrupt, RuntimeError, Step};
pub use symbols::{OpsId, TypeId};
