//! # FrameMachine
//!
//! Experiment drivers for frame machines: input signals, a trend-prediction
//! fitness and the liveness survey. The engine lives in `framemachine_core`.

/// Random machine liveness survey
pub mod liveness;
/// Input waves and the trend fitness
pub mod signal;

pub use liveness::{survey, LivenessReport};
pub use signal::{trend_fitness, Hysteresis, Sample, SignalKind, SineWave};
