//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::{QuadsumError, Result};

/// Environment variable overriding [`EngineConfig::threads`].
pub const THREADS_ENV: &str = "QUADSUM_THREADS";
/// Environment variable overriding [`EngineConfig::node_capacity`].
pub const NODE_CAPACITY_ENV: &str = "QUADSUM_NODE_CAPACITY";

/// Configuration shared by both engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads in the pool. `0` uses one per available core.
    pub threads: usize,
    /// Upper bound on quadtree arena slots. The arena is never larger than a
    /// complete tree of `max_depth` levels; this only lowers it.
    pub node_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            node_capacity: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `QUADSUM_THREADS` and `QUADSUM_NODE_CAPACITY`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`. An unparseable value is
    /// an error.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(threads) = parse_env(THREADS_ENV)? {
            self.threads = threads;
        }
        if let Some(capacity) = parse_env(NODE_CAPACITY_ENV)? {
            self.node_capacity = Some(capacity);
        }
        Ok(self)
    }

    /// Arena capacity to use for a tree of `max_depth` levels.
    pub fn arena_capacity(&self, max_depth: u32) -> usize {
        let complete = crate::addressing::tree_capacity(max_depth);
        self.node_capacity
            .map_or(complete, |cap| cap.clamp(1, complete))
    }
}

fn parse_env(key: &str) -> Result<Option<usize>> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| QuadsumError::invalid(format!("invalid value for {key} ({raw:?}): {e}")))
}

/// How many times to repeat a build for timing, and how many leading runs to
/// discard as warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repetition {
    pub iterations: usize,
    pub warmup: usize,
}

impl Repetition {
    pub fn new(iterations: usize, warmup: usize) -> Result<Self> {
        let repetition = Self { iterations, warmup };
        repetition.validate()?;
        Ok(repetition)
    }

    /// A single measured run.
    pub fn once() -> Self {
        Self {
            iterations: 1,
            warmup: 0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(QuadsumError::invalid("iteration count must be positive"));
        }
        if self.warmup >= self.iterations {
            return Err(QuadsumError::invalid(format!(
                "warm-up runs ({}) must be fewer than iterations ({})",
                self.warmup, self.iterations
            )));
        }
        Ok(())
    }

    /// Runs whose timings are kept.
    pub fn measured(&self) -> usize {
        self.iterations.saturating_sub(self.warmup)
    }
}

impl Default for Repetition {
    fn default() -> Self {
        Self::once()
    }
}
