//! Runtime configuration.
//!
//! Every knob has a deterministic default. `RuntimeConfig::from_env` layers
//! the `SPINDLE_*` environment overrides on top; they are read once per
//! process.

use crate::error::RuntimeError;
use std::sync::OnceLock;

/// Number of successors a node stores inline. Arity at or above this uses a
/// pooled array.
pub const INPLACE_BOUND: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Node slots created when the pool is built.
    pub initial_nodes: usize,
    /// Slots added when a collection frees less than requested.
    pub grow_nodes: usize,
    /// Hard cap on node slots; running past it is fatal.
    pub max_nodes: usize,
    /// Successor arrays are pooled for arities `INPLACE_BOUND..arity_bound`.
    pub arity_bound: usize,
    /// Step dispatches a frame may spend before it is rotated.
    pub slice_steps: usize,
    /// Collections a frame may survive before it is rotated.
    pub time_allotment: usize,
    /// Total step budget of one `evaluate` call.
    pub step_limit: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            initial_nodes: 4096,
            grow_nodes: 256,
            max_nodes: 1 << 22,
            arity_bound: 50,
            slice_steps: 10_000,
            time_allotment: 1,
            step_limit: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        static ENV: OnceLock<RuntimeConfig> = OnceLock::new();
        ENV.get_or_init(|| {
            let mut cfg = RuntimeConfig::default();
            if let Some(v) = env_usize("SPINDLE_INITIAL_NODES") {
                cfg.initial_nodes = v;
            }
            if let Some(v) = env_usize("SPINDLE_GROW_NODES") {
                cfg.grow_nodes = v;
            }
            if let Some(v) = env_usize("SPINDLE_MAX_NODES") {
                cfg.max_nodes = v;
            }
            if let Some(v) = env_usize("SPINDLE_ARITY_BOUND") {
                cfg.arity_bound = v;
            }
            if let Some(v) = env_usize("SPINDLE_SLICE_STEPS") {
                cfg.slice_steps = v;
            }
            if let Some(v) = env_usize("SPINDLE_TIME_ALLOTMENT") {
                cfg.time_allotment = v;
            }
            if let Some(v) = env_usize("SPINDLE_STEP_LIMIT") {
                cfg.step_limit = Some(v);
            }
            cfg
        })
        .clone()
    }

    /// Small pool, no growth. Handy for exercising the collector.
    pub fn with_fixed_pool(nodes: usize) -> Self {
        Self {
            initial_nodes: nodes,
            grow_nodes: 0,
            max_nodes: nodes,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.arity_bound <= INPLACE_BOUND {
            return Err(RuntimeError::InvalidConfig(format!(
                "arity_bound must exceed {}, got {}",
                INPLACE_BOUND, self.arity_bound
            )));
        }
        if self.initial_nodes == 0 {
            return Err(RuntimeError::InvalidConfig("initial_nodes must be positive".into()));
        }
        if self.initial_nodes > self.max_nodes {
            return Err(RuntimeError::InvalidConfig(format!(
                "initial_nodes ({}) exceeds max_nodes ({})",
                self.initial_nodes, self.max_nodes
            )));
        }
        if self.slice_steps == 0 || self.time_allotment == 0 {
            return Err(RuntimeError::InvalidConfig(
                "slice_steps and time_allotment must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring non-numeric configuration override");
            None
        }
    }
}
