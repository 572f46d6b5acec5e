//! Input signals for evolution runs.
//!
//! Waves are infinite `i32` iterators. [`Hysteresis`] pairs every value with
//! the one after it, so a fitness can judge a prediction against the future.

use framemachine_core::random::{rng_from_seed, MachineRng};
use rand::Rng;

/// `i32::MAX * sin(x / 4) - 2`, wrapping on the low end.
#[must_use]
pub fn sine(x: i32) -> i32 {
    let wave = f64::from(i32::MAX) * (f64::from(x) / 4.0).sin();
    (wave as i32).wrapping_sub(2)
}

#[derive(Debug, Clone, Default)]
pub struct SineWave {
    step: i32,
}

impl SineWave {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for SineWave {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        let value = sine(self.step);
        self.step = self.step.wrapping_add(1);
        Some(value)
    }
}

/// Uniform values in `i32::MIN..i32::MAX`.
#[derive(Debug, Clone)]
pub struct PseudoRandomWave {
    rng: MachineRng,
}

impl PseudoRandomWave {
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: rng_from_seed(seed),
        }
    }
}

impl Iterator for PseudoRandomWave {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        Some(self.rng.gen_range(i32::MIN..i32::MAX))
    }
}

/// A signal value together with its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub current: i32,
    pub next: i32,
}

/// Delays a signal by one step: yields the previous value (starting at 0)
/// with the newly pulled one as lookahead.
#[derive(Debug, Clone)]
pub struct Hysteresis<S> {
    source: S,
    last: i32,
}

impl<S> Hysteresis<S> {
    pub fn new(source: S) -> Self {
        Self { source, last: 0 }
    }
}

impl<S: Iterator<Item = i32>> Iterator for Hysteresis<S> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let next = self.source.next()?;
        let current = std::mem::replace(&mut self.last, next);
        Some(Sample { current, next })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SignalKind {
    Sine,
    Random,
}

impl SignalKind {
    /// The wave for this kind. `seed` only affects [`SignalKind::Random`].
    #[must_use]
    pub fn wave(self, seed: Option<u64>) -> Box<dyn Iterator<Item = i32> + Send> {
        match self {
            Self::Sine => Box::new(SineWave::new()),
            Self::Random => Box::new(PseudoRandomWave::new(seed)),
        }
    }
}

/// Scores a trend prediction: the output's low bit set means "the next
/// sample is higher". A hit adds one, a miss takes one away.
#[must_use]
pub fn trend_fitness(sample: &Sample, score: i64, output: i32) -> i64 {
    let trend_up = output & 1 == 1;
    let hit = if trend_up {
        sample.next > sample.current
    } else {
        sample.next <= sample.current
    };
    if hit {
        score + 1
    } else {
        score - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_values() {
        assert_eq!(sine(0), -2);
        // i32::MAX * sin(0.25) = 531_295_956.7
        assert_eq!(sine(1), 531_295_954);
        assert!(SineWave::new().take(100).all(|v| v != i32::MIN));
    }

    #[test]
    fn test_hysteresis_lags_by_one() {
        let samples: Vec<Sample> = Hysteresis::new([5, 9, 2].into_iter()).collect();
        assert_eq!(
            samples,
            vec![
                Sample { current: 0, next: 5 },
                Sample { current: 5, next: 9 },
                Sample { current: 9, next: 2 },
            ]
        );
    }

    #[test]
    fn test_trend_fitness() {
        let rising = Sample { current: 1, next: 2 };
        let flat = Sample { current: 2, next: 2 };
        assert_eq!(trend_fitness(&rising, 0, 1), 1);
        assert_eq!(trend_fitness(&rising, 0, 2), -1);
        assert_eq!(trend_fitness(&flat, 10, 0), 11);
        assert_eq!(trend_fitness(&flat, 10, -1), 9);
    }

    #[test]
    fn test_seeded_random_wave_repeats() {
        let a: Vec<i32> = PseudoRandomWave::new(Some(3)).take(8).collect();
        let b: Vec<i32> = PseudoRandomWave::new(Some(3)).take(8).collect();
        assert_eq!(a, b);
    }
}
