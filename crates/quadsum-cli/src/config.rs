//! CLI configuration management.
//!
//! Settings come from, lowest precedence first: built-in defaults, the JSON
//! file given with `--config`, environment variables, command-line flags.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use quadsum_core::{EngineConfig, Repetition};
use serde::{Deserialize, Serialize};

pub const ITERATIONS_ENV: &str = "QUADSUM_ITERATIONS";
pub const WARMUP_ENV: &str = "QUADSUM_WARMUP";
pub const SEED_ENV: &str = "QUADSUM_SEED";

/// Application-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool size and quadtree arena limit.
    pub engine: EngineConfig,

    /// Builds per configuration, warm-up included.
    pub iterations: usize,

    /// Leading builds whose timings are discarded.
    pub warmup: usize,

    /// Seed for the random point sets. Fresh entropy when unset.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            iterations: 10,
            warmup: 3,
            seed: None,
        }
    }
}

impl Config {
    /// Load the config file (if any), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.engine = config.engine.with_env_overrides()?;
        if let Some(iterations) = env_override(ITERATIONS_ENV)? {
            config.iterations = iterations;
        }
        if let Some(warmup) = env_override(WARMUP_ENV)? {
            config.warmup = warmup;
        }
        if let Some(seed) = env_override(SEED_ENV)? {
            config.seed = Some(seed);
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Validated iteration and warm-up counts.
    pub fn repetition(&self) -> Result<Repetition> {
        Repetition::new(self.iterations, self.warmup).context("Invalid iteration settings")
    }
}

fn env_override<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid value for {key} ({raw:?}): {e}")),
        Err(_) => Ok(None),
    }
}
