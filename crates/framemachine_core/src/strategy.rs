//! Caller-supplied strategies consumed by the pool.
//!
//! Fitness and selection are a capability pair handed to the pool at
//! construction. Plain closures implement both traits.

use crate::machine::Machine;
use crate::population::PopulationSnapshot;
use std::fmt::Debug;

/// A fitness score: ordered, copyable, with a zero value as its default.
///
/// Only `PartialOrd` is required so floating point scores work. Ranking
/// treats incomparable scores (NaN) as equal and orders them by machine id,
/// so a score type should keep its values totally ordered in practice.
pub trait Score: Copy + Default + PartialOrd + Debug + Send + Sync + 'static {}

impl<T> Score for T where T: Copy + Default + PartialOrd + Debug + Send + Sync + 'static {}

/// Scores one machine for one generation.
pub trait Fitness<I, R, O>: Send + Sync {
    /// `(current input, previous score, converted output) -> new score`
    fn score(&self, input: &I, previous: R, output: O) -> R;
}

impl<I, R, O, F> Fitness<I, R, O> for F
where
    F: Fn(&I, R, O) -> R + Send + Sync,
{
    fn score(&self, input: &I, previous: R, output: O) -> R {
        self(input, previous, output)
    }
}

/// Produces the next population from a scored snapshot.
///
/// The returned machines replace the population entirely, including its size.
pub trait Selection<R>: Send + Sync {
    fn select(&self, snapshot: &PopulationSnapshot<R>) -> Vec<Machine>;
}

impl<R, F> Selection<R> for F
where
    F: Fn(&PopulationSnapshot<R>) -> Vec<Machine> + Send + Sync,
{
    fn select(&self, snapshot: &PopulationSnapshot<R>) -> Vec<Machine> {
        self(snapshot)
    }
}

pub type InputConverter<I> = Box<dyn Fn(&I) -> i32 + Send + Sync>;
pub type OutputConverter<O> = Box<dyn Fn(i32) -> O + Send + Sync>;

/// Everything needed to run one machine through one generation.
pub struct Evaluator<I, R, O> {
    input_convert: InputConverter<I>,
    output_convert: OutputConverter<O>,
    fitness: Box<dyn Fitness<I, R, O>>,
}

impl<I, R: Score, O> Evaluator<I, R, O> {
    pub fn new(
        input_convert: InputConverter<I>,
        output_convert: OutputConverter<O>,
        fitness: Box<dyn Fitness<I, R, O>>,
    ) -> Self {
        Self {
            input_convert,
            output_convert,
            fitness,
        }
    }

    /// Feeds `input`, cycles once and returns the new score.
    pub fn step(&self, machine: &mut Machine, input: &I, previous: R) -> R {
        machine.set_input((self.input_convert)(input));
        machine.cycle();
        let output = (self.output_convert)(machine.output());
        self.fitness.score(input, previous, output)
    }
}
