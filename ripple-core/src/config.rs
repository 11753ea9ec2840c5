//! Runtime configuration.
//!
//! The engine itself has very few knobs. Both limits exist to turn a cyclic
//! graph into an error instead of a stack overflow or a flush that never
//! reaches rest.

use serde::{Deserialize, Serialize};

/// Default maximum nesting of execution contexts.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum number of observer runs within one flush cycle.
pub const DEFAULT_MAX_FLUSH_ITERATIONS: usize = 100_000;

/// Limits applied to a single [`Runtime`](crate::reactive::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How deeply consumer executions may nest (an expression reading an
    /// expression reading an expression ...).
    pub max_depth: usize,

    /// How many observer runs one flush may perform before giving up.
    pub max_flush_iterations: usize,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_flush_iterations(mut self, iterations: usize) -> Self {
        self.max_flush_iterations = iterations;
        self
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_flush_iterations: DEFAULT_MAX_FLUSH_ITERATIONS,
        }
    }
}
