//! # FrameMachine Core
//!
//! Execution and evolution engine for frame machines: tiny register
//! machines that run a fixed 256-instruction program over a pair of
//! ping-pong state frames.
//!
//! This crate contains:
//! - The machine and its double-buffered cycle
//! - Genetic operators on code frames (random, crossover, mutation)
//! - Scored populations evaluated in parallel with rayon
//! - The pool: a worker-driven generational loop with a guarded lifecycle
//! - Bundled selection strategies
//! - Configuration, metrics and structured logging
//!
//! ## Example
//!
//! ```
//! use framemachine_core::Machine;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut machine = Machine::generate_with_rng(&mut rng);
//! machine.set_input(7);
//! machine.cycle();
//! let _out = machine.output();
//! ```

/// Configuration for pools, selection and logging
pub mod config;
/// Error types
pub mod error;
/// Genetic operators on code frames
pub mod genome;
/// Pool lifecycle state machine
pub mod lifecycle;
/// The frame machine and its execution cycle
pub mod machine;
/// Counters and logging setup
pub mod metrics;
/// Scored populations and snapshots
pub mod population;
/// Population pool and generational loop
pub mod pool;
/// Seeded random sources
pub mod random;
/// Bundled selection strategies
pub mod selection;
/// Fitness and selection traits
pub mod strategy;

pub use config::{AppConfig, FailurePolicy, LoggingConfig, PoolConfig, SelectionConfig, StrategyKind};
pub use error::{ConstructionError, LifecycleError, PoolError};
pub use genome::CodeFrameLogic;
pub use lifecycle::PoolState;
pub use machine::{Machine, MachineId};
pub use metrics::PoolMetrics;
pub use pool::{InputStream, Pool, PoolBuilder};
pub use population::{Member, Population, PopulationSnapshot};
pub use selection::{ElitistMutation, SelectionStrategy, TopSetCrossover};
pub use strategy::{Evaluator, Fitness, Score, Selection};
