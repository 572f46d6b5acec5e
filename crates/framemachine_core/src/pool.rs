//! The population pool and its generational loop.
//!
//! A pool owns a scored population and drives it from a dedicated worker
//! thread: every input item is fed to all machines in parallel, the
//! machines are rescored, and every `selection_interval + 1` generations the
//! whole population is replaced by the selection strategy.
//!
//! ## Example
//!
//! ```no_run
//! use framemachine_core::{Machine, Pool, PopulationSnapshot};
//!
//! let pool = Pool::<i32, i64, i32>::builder()
//!     .input_converter(|x: &i32| *x)
//!     .output_converter(|o| o)
//!     .fitness(|x: &i32, score: i64, out: i32| if out == *x { score + 1 } else { score })
//!     .selection(|snapshot: &PopulationSnapshot<i64>| {
//!         snapshot.ranked().into_iter().take(16).map(|m| m.machine.clone()).collect::<Vec<Machine>>()
//!     })
//!     .selection_interval(1000)
//!     .input(0..100_000)
//!     .build()?;
//! pool.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{FailurePolicy, PoolConfig};
use crate::error::{panic_message, ConstructionError, LifecycleError, PoolError, Result};
use crate::lifecycle::{Lifecycle, PoolState};
use crate::machine::Machine;
use crate::metrics::PoolMetrics;
use crate::population::{Population, PopulationSnapshot};
use crate::random::rng_from_seed;
use crate::strategy::{Evaluator, Fitness, InputConverter, OutputConverter, Score, Selection};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lazily pulled, single-pass input. May be infinite.
pub type InputStream<I> = Box<dyn Iterator<Item = I> + Send>;

const WORKER_NAME: &str = "framemachine-pool";

/// Why a run of the generational loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Stopped,
    Exhausted,
}

/// State shared between the pool handle and its worker.
struct Shared<I, R, O> {
    lifecycle: Lifecycle,
    population: RwLock<Population<R>>,
    evaluator: Evaluator<I, R, O>,
    selection: Box<dyn Selection<R>>,
    selection_interval: u64,
    failure_policy: FailurePolicy,
    threads: Option<rayon::ThreadPool>,
    metrics: PoolMetrics,
    input: Mutex<Option<InputStream<I>>>,
    /// An item pulled after the pool left `Running`; the next run starts with it.
    pending: Mutex<Option<I>>,
    failure: Mutex<Option<String>>,
}

#[derive(Default)]
struct Workers {
    current: Option<JoinHandle<()>>,
    /// A worker that outlived its stop timeout.
    stale: Option<JoinHandle<()>>,
}

pub struct Pool<I, R, O> {
    shared: Arc<Shared<I, R, O>>,
    workers: Mutex<Workers>,
    stop_timeout: Duration,
    disposed: AtomicBool,
}

/// Collects the required pool components. `build()` fails with
/// [`ConstructionError::MissingComponent`] if any is absent.
pub struct PoolBuilder<I, R, O> {
    input_convert: Option<InputConverter<I>>,
    output_convert: Option<OutputConverter<O>>,
    fitness: Option<Box<dyn Fitness<I, R, O>>>,
    selection: Option<Box<dyn Selection<R>>>,
    selection_interval: Option<u64>,
    input: Option<InputStream<I>>,
    initial: Option<Vec<Machine>>,
    config: PoolConfig,
}

impl<I, R, O> Default for PoolBuilder<I, R, O> {
    fn default() -> Self {
        Self {
            input_convert: None,
            output_convert: None,
            fitness: None,
            selection: None,
            selection_interval: None,
            input: None,
            initial: None,
            config: PoolConfig::default(),
        }
    }
}

impl<I, R, O> PoolBuilder<I, R, O>
where
    I: Send + Sync + 'static,
    R: Score,
    O: 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn input_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(&I) -> i32 + Send + Sync + 'static,
    {
        self.input_convert = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn output_converter<F>(mut self, f: F) -> Self
    where
        F: Fn(i32) -> O + Send + Sync + 'static,
    {
        self.output_convert = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn fitness<F>(mut self, fitness: F) -> Self
    where
        F: Fitness<I, R, O> + 'static,
    {
        self.fitness = Some(Box::new(fitness));
        self
    }

    #[must_use]
    pub fn selection<S>(mut self, selection: S) -> Self
    where
        S: Selection<R> + 'static,
    {
        self.selection = Some(Box::new(selection));
        self
    }

    /// Generations between selections; selection runs every `interval + 1`
    /// generations. Unsigned, so `0` is the every-generation schedule and no
    /// negative interval exists.
    #[must_use]
    pub fn selection_interval(mut self, interval: u64) -> Self {
        self.selection_interval = Some(interval);
        self
    }

    #[must_use]
    pub fn input<T>(mut self, input: T) -> Self
    where
        T: IntoIterator<Item = I>,
        T::IntoIter: Send + 'static,
    {
        self.input = Some(Box::new(input.into_iter()));
        self
    }

    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts from these machines instead of a random population.
    #[must_use]
    pub fn initial_population(mut self, machines: Vec<Machine>) -> Self {
        self.initial = Some(machines);
        self
    }

    pub fn build(self) -> std::result::Result<Pool<I, R, O>, ConstructionError> {
        let input_convert = self
            .input_convert
            .ok_or(ConstructionError::MissingComponent("input converter"))?;
        let output_convert = self
            .output_convert
            .ok_or(ConstructionError::MissingComponent("output converter"))?;
        let fitness = self
            .fitness
            .ok_or(ConstructionError::MissingComponent("fitness"))?;
        let selection = self
            .selection
            .ok_or(ConstructionError::MissingComponent("selection"))?;
        let selection_interval = self
            .selection_interval
            .ok_or(ConstructionError::MissingComponent("selection interval"))?;
        let input = self
            .input
            .ok_or(ConstructionError::MissingComponent("input stream"))?;
        self.config
            .validate()
            .map_err(|e| ConstructionError::invalid_config(e.to_string()))?;

        let threads = match self.config.worker_threads {
            Some(count) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(count)
                    .thread_name(|i| format!("framemachine-eval-{i}"))
                    .build()
                    .map_err(|e| ConstructionError::ThreadPool(e.to_string()))?,
            ),
            None => None,
        };

        let lifecycle = Lifecycle::new();
        let population = match self.initial {
            Some(machines) => Population::from_machines(machines),
            None => {
                let mut rng = rng_from_seed(self.config.seed);
                Population::generate_with_rng(self.config.population_size, &mut rng)
            }
        };
        let metrics = PoolMetrics::new(self.config.report_every);

        tracing::info!(
            population = population.len(),
            selection_interval = selection_interval,
            policy = ?self.config.failure_policy,
            "Pool initialized"
        );
        lifecycle.set(PoolState::Stopped);

        Ok(Pool {
            shared: Arc::new(Shared {
                lifecycle,
                population: RwLock::new(population),
                evaluator: Evaluator::new(input_convert, output_convert, fitness),
                selection,
                selection_interval,
                failure_policy: self.config.failure_policy,
                threads,
                metrics,
                input: Mutex::new(Some(input)),
                pending: Mutex::new(None),
                failure: Mutex::new(None),
            }),
            workers: Mutex::new(Workers::default()),
            stop_timeout: self.config.stop_timeout(),
            disposed: AtomicBool::new(false),
        })
    }
}

impl<I, R, O> Pool<I, R, O>
where
    I: Send + Sync + 'static,
    R: Score,
    O: 'static,
{
    #[must_use]
    pub fn builder() -> PoolBuilder<I, R, O> {
        PoolBuilder::new()
    }

    /// `Stopped -> Starting -> Running`, then launches the worker.
    pub fn start(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(LifecycleError::Disposed.into());
        }
        let mut workers = self.lock_workers();
        let lifecycle = &self.shared.lifecycle;
        lifecycle.transition("start", PoolState::Stopped, PoolState::Starting)?;

        if let Some(stale) = workers.stale.take() {
            if !stale.is_finished() {
                workers.stale = Some(stale);
                lifecycle.set(PoolState::Stopped);
                return Err(LifecycleError::WorkerBusy.into());
            }
            join_worker(stale);
        }
        if let Some(previous) = workers.current.take() {
            join_worker(previous);
        }

        let Some(input) = lock(&self.shared.input).take() else {
            lifecycle.set(PoolState::Stopped);
            return Err(LifecycleError::WorkerBusy.into());
        };

        lifecycle.set(PoolState::Running);
        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run(&shared, input))
        {
            Ok(handle) => {
                workers.current = Some(handle);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to spawn pool worker");
                lifecycle.set(PoolState::Error);
                Err(PoolError::Spawn(e))
            }
        }
    }

    /// `stop()` followed by `start()`. Not atomic.
    pub fn restart(&self) -> Result<()> {
        self.stop()?;
        self.start()
    }

    /// A copy of the current population and scores.
    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot<R> {
        self.shared
            .population
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    #[must_use]
    pub fn population_len(&self) -> usize {
        self.shared
            .population
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<I, R, O> Pool<I, R, O> {
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.shared.lifecycle.state()
    }

    #[must_use]
    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }

    /// Message of the panic that moved the pool to `Error`.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        lock(&self.shared.failure).clone()
    }

    /// `Running -> Stopping -> Stopped`. Blocks until the worker exits or the
    /// stop timeout elapses; on timeout the pool is forced to `Stopped` and
    /// [`PoolError::StopTimeout`] is returned.
    pub fn stop(&self) -> Result<()> {
        let mut workers = self.lock_workers();
        let lifecycle = &self.shared.lifecycle;
        lifecycle.transition("stop", PoolState::Running, PoolState::Stopping)?;

        if lifecycle.wait_stopped(self.stop_timeout) {
            if let Some(handle) = workers.current.take() {
                join_worker(handle);
            }
            return Ok(());
        }

        tracing::warn!(
            timeout_ms = self.stop_timeout.as_millis() as u64,
            "Worker did not stop in time, forcing Stopped"
        );
        workers.stale = workers.current.take();
        // The worker may have failed meanwhile; keep Error if so.
        let _ = lifecycle.transition("stop", PoolState::Stopping, PoolState::Stopped);
        Err(PoolError::StopTimeout {
            timeout: self.stop_timeout,
        })
    }

    /// Blocks while a run is in progress, up to `timeout`. Returns false on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.shared.lifecycle.wait_while(timeout, |s| {
            matches!(
                s,
                PoolState::Starting | PoolState::Running | PoolState::Stopping
            )
        })
    }

    /// `Error -> Stopped`, clearing the recorded failure.
    pub fn reset(&self) -> Result<()> {
        let mut workers = self.lock_workers();
        self.shared
            .lifecycle
            .transition("reset", PoolState::Error, PoolState::Stopped)?;
        if let Some(handle) = workers.current.take() {
            join_worker(handle);
        }
        lock(&self.shared.failure).take();
        Ok(())
    }

    /// Stops a running pool and marks it disposed. Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.state() == PoolState::Running {
            self.stop()?;
        }
        tracing::debug!("Pool shut down");
        Ok(())
    }

    fn lock_workers(&self) -> MutexGuard<'_, Workers> {
        lock(&self.workers)
    }
}

impl<I, R, O> Drop for Pool<I, R, O> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "Pool shutdown failed");
        }
    }
}

impl<I, R, O> Shared<I, R, O>
where
    I: Sync,
    R: Score,
{
    fn generations(&self, input: &mut InputStream<I>) -> RunEnd {
        let mut countdown = self.selection_interval;
        loop {
            if self.lifecycle.state() != PoolState::Running {
                return RunEnd::Stopped;
            }
            let pending = lock(&self.pending).take();
            let Some(x) = pending.or_else(|| input.next()) else {
                return RunEnd::Exhausted;
            };
            // `next()` may block past a stop or a stop timeout.
            if self.lifecycle.state() != PoolState::Running {
                *lock(&self.pending) = Some(x);
                return RunEnd::Stopped;
            }
            self.generation(&x);
            match countdown.checked_sub(1) {
                Some(rest) => countdown = rest,
                None => {
                    self.select();
                    countdown = self.selection_interval;
                }
            }
        }
    }

    fn generation(&self, x: &I) {
        let started = Instant::now();
        let mut guard = self
            .population
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let population: &mut Population<R> = &mut guard;
        let evaluator = &self.evaluator;
        let policy = self.failure_policy;
        let failures = match &self.threads {
            Some(threads) => threads.install(|| population.evaluate(x, evaluator, policy)),
            None => population.evaluate(x, evaluator, policy),
        };
        self.metrics
            .record_generation(population.len(), failures, started.elapsed());
    }

    fn select(&self) {
        let mut population = self
            .population
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // The live population stays in place until selection returns.
        let snapshot = population.snapshot();
        let next = self.selection.select(&snapshot);
        *population = Population::from_machines(next);
        self.metrics.record_selection(snapshot.len(), population.len());
    }
}

fn run<I, R, O>(shared: &Shared<I, R, O>, mut input: InputStream<I>)
where
    I: Sync,
    R: Score,
{
    tracing::info!(
        selection_interval = shared.selection_interval,
        "Generational loop started"
    );
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| shared.generations(&mut input)));
    // Hand the stream back before settling so a restart can resume it.
    *lock(&shared.input) = Some(input);

    match outcome {
        Ok(end) => {
            tracing::info!(
                generations = shared.metrics.generations(),
                exhausted = end == RunEnd::Exhausted,
                "Generational loop finished"
            );
            shared.lifecycle.settle_stopped();
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(reason = %reason, "Generation aborted");
            *lock(&shared.failure) = Some(reason);
            shared.lifecycle.set(PoolState::Error);
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::error!("Pool worker panicked outside the generational loop");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
