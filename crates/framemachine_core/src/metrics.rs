//! Run metrics and structured logging.
//!
//! Counters are plain atomics so the worker can update them while
//! observers read them from other threads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

pub struct PoolMetrics {
    generations: AtomicU64,
    selections: AtomicU64,
    failures: AtomicU64,
    population: AtomicU64,
    report_every: u64,
    start_time: Instant,
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PoolMetrics {
    /// Creates a collector that logs progress every `report_every` generations.
    #[must_use]
    pub fn new(report_every: u64) -> Self {
        Self {
            generations: AtomicU64::new(0),
            selections: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            population: AtomicU64::new(0),
            report_every: report_every.max(1),
            start_time: Instant::now(),
        }
    }

    /// Records a finished generation.
    pub fn record_generation(&self, population: usize, failures: usize, duration: Duration) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.population.store(population as u64, Ordering::Relaxed);
        if failures > 0 {
            self.failures.fetch_add(failures as u64, Ordering::Relaxed);
        }

        if generation % self.report_every == 0 {
            tracing::info!(
                generation = generation,
                population = population,
                failures = self.failures(),
                duration_us = duration.as_micros() as u64,
                "Generation"
            );
        }
    }

    /// Records a population replacement.
    pub fn record_selection(&self, before: usize, after: usize) {
        let round = self.selections.fetch_add(1, Ordering::Relaxed) + 1;
        self.population.store(after as u64, Ordering::Relaxed);
        tracing::info!(
            round = round,
            generation = self.generations(),
            before = before,
            after = after,
            "Selection"
        );
    }

    #[must_use]
    pub fn generations(&self) -> u64 {
        self.generations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn selections(&self) -> u64 {
        self.selections.load(Ordering::Relaxed)
    }

    /// Evaluations that failed under the isolate policy.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Population size after the last generation or selection.
    #[must_use]
    pub fn population(&self) -> u64 {
        self.population.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Initialize tracing subscriber for logging.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .finish(),
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PoolMetrics::new(10);
        assert_eq!(metrics.generations(), 0);
        assert_eq!(metrics.selections(), 0);
    }

    #[test]
    fn test_record_generation() {
        let metrics = PoolMetrics::new(1);
        metrics.record_generation(256, 0, Duration::from_micros(40));
        metrics.record_generation(256, 3, Duration::from_micros(40));
        assert_eq!(metrics.generations(), 2);
        assert_eq!(metrics.failures(), 3);
        assert_eq!(metrics.population(), 256);
    }

    #[test]
    fn test_record_selection_updates_population() {
        let metrics = PoolMetrics::default();
        metrics.record_selection(256, 40);
        assert_eq!(metrics.selections(), 1);
        assert_eq!(metrics.population(), 40);
    }
}
