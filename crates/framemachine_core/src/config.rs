//! Configuration management for pool runs.
//!
//! Strongly-typed structures that map to a `config.toml` file. Missing
//! sections fall back to their defaults.
//!
//! ## Example `config.toml`
//!
//! ```toml
//! [pool]
//! population_size = 256
//! stop_timeout_ms = 1000
//! failure_policy = "Isolate"
//! seed = 42
//!
//! [selection]
//! interval = 65536
//! strategy = "TopSetCrossover"
//!
//! [logging]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of machines in a freshly constructed pool.
pub const DEFAULT_POPULATION_SIZE: usize = 0x100;

/// What a panic inside one machine's evaluation does to its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FailurePolicy {
    /// The panic aborts the whole generation and the pool enters `Error`.
    #[default]
    Abort,
    /// The failing member is scored at the default value and the generation continues.
    Isolate,
}

/// Pool construction and worker settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    pub population_size: usize,
    /// How long `stop()` waits for the worker to exit.
    pub stop_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Size of a dedicated evaluation thread pool; the global rayon pool when unset.
    pub worker_threads: Option<usize>,
    /// Seeds population generation for reproducible runs.
    pub seed: Option<u64>,
    /// Log a progress line every this many generations.
    pub report_every: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            population_size: DEFAULT_POPULATION_SIZE,
            stop_timeout_ms: 1000,
            failure_policy: FailurePolicy::Abort,
            worker_threads: None,
            seed: None,
            report_every: 10_000,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.population_size <= 1 << 20,
            "Population size too large (max 1048576)"
        );
        anyhow::ensure!(self.stop_timeout_ms > 0, "Stop timeout must be positive");
        if let Some(threads) = self.worker_threads {
            anyhow::ensure!(threads > 0, "Worker thread count must be positive");
        }
        anyhow::ensure!(self.report_every > 0, "Report interval must be positive");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StrategyKind {
    #[default]
    TopSetCrossover,
    ElitistMutation,
}

/// Selection schedule and the parameters of the bundled strategies.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    /// Generations between selections; selection runs after `interval + 1`.
    pub interval: u64,
    pub strategy: StrategyKind,
    /// Size of the ranked top set; `2 * sqrt(population)` when unset.
    pub top_set: Option<usize>,
    /// Chance a crossover word is inherited rather than randomized.
    pub parent_rate: f64,
    /// Elite share and per-copy mutation count are `len / elite_divisor`.
    pub elite_divisor: usize,
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            interval: 0x10000,
            strategy: StrategyKind::TopSetCrossover,
            top_set: None,
            parent_rate: 1.0 / 3.0,
            elite_divisor: 16,
            seed: None,
        }
    }
}

impl SelectionConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.parent_rate),
            "Parent rate must be in [0.0, 1.0]"
        );
        anyhow::ensure!(self.elite_divisor > 0, "Elite divisor must be positive");
        if let Some(top_set) = self.top_set {
            anyhow::ensure!(top_set >= 2, "Top set needs at least two members");
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub report_interval_ms: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            report_interval_ms: 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub pool: PoolConfig,
    pub selection: SelectionConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates all configuration parameters.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.pool.validate()?;
        self.selection.validate()?;
        anyhow::ensure!(
            self.logging.report_interval_ms > 0,
            "Report interval must be positive"
        );
        Ok(())
    }

    /// Parses and validates configuration from TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Stable hash of the settings that shape evolution.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.pool).as_bytes());
        hasher.update(format!("{:?}", self.selection).as_bytes());
        hex::encode(hasher.finalize())
    }
}
