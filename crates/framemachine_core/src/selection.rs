//! Bundled selection strategies.
//!
//! Both strategies rank the snapshot by score and rebuild the population
//! from its best members. Their proportions are taken from the configured
//! population size rather than the snapshot, so a population that drifted in
//! size is pulled back toward it. Each owns a seeded generator behind a mutex
//! so a seeded run selects the same way every time.

use crate::config::{AppConfig, SelectionConfig, StrategyKind};
use crate::genome::CodeFrameLogic;
use crate::machine::{Machine, MachineId};
use crate::population::{Member, PopulationSnapshot};
use crate::random::{rng_from_seed, MachineRng};
use crate::strategy::{Score, Selection};
use framemachine_data::CodeFrame;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ranked top set size for a population of `len`: `2 * floor(sqrt(len))`.
#[must_use]
pub fn default_top_set(len: usize) -> usize {
    2 * (len as f64).sqrt() as usize
}

/// Most frequent score among `members`. Ties go to the better-ranked score.
fn modal_score<R: Score>(members: &[&Member<R>]) -> Option<R> {
    let mut best: Option<(R, usize)> = None;
    for member in members {
        let count = members.iter().filter(|m| m.score == member.score).count();
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((member.score, count));
        }
    }
    best.map(|(score, _)| score)
}

/// Breeds the ranked top set and keeps its leaders.
///
/// With a top set of `t` members, every ordered pair drawn from the best
/// `t / 2` produces one crossover child. The population becomes
/// `children.len() - t` of those children followed by the survivors: the top
/// members ranked above the first member holding the modal score, or the top
/// two if fewer than two qualify.
pub struct TopSetCrossover {
    top_set: usize,
    parent_rate: f64,
    rng: Mutex<MachineRng>,
}

impl TopSetCrossover {
    #[must_use]
    pub fn new(top_set: usize, parent_rate: f64, seed: Option<u64>) -> Self {
        Self {
            top_set,
            parent_rate,
            rng: Mutex::new(rng_from_seed(seed)),
        }
    }

    /// Uses `top_set` from `config`, or the default for `population_size`.
    #[must_use]
    pub fn from_config(config: &SelectionConfig, population_size: usize) -> Self {
        let top_set = config
            .top_set
            .unwrap_or_else(|| default_top_set(population_size));
        Self::new(top_set, config.parent_rate, config.seed)
    }

    fn rng(&self) -> MutexGuard<'_, MachineRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Score> Selection<R> for TopSetCrossover {
    fn select(&self, snapshot: &PopulationSnapshot<R>) -> Vec<Machine> {
        let ranked = snapshot.ranked();
        let size = self.top_set.min(ranked.len());
        let top = &ranked[..size];
        let Some(mode) = modal_score(top) else {
            return Vec::new();
        };

        for (rank, member) in top.iter().enumerate() {
            tracing::debug!(
                rank = rank,
                machine = %member.machine.id(),
                score = ?member.score,
                "Top set"
            );
        }

        let parents = &top[..size / 2];
        let mut rng = self.rng();
        let mut children = Vec::with_capacity(parents.len() * parents.len());
        for x in parents {
            for y in parents {
                let code =
                    x.machine
                        .code()
                        .crossover_with_rng(y.machine.code(), self.parent_rate, &mut *rng);
                children.push(Machine::with_id(MachineId::from_rng(&mut *rng), code));
            }
        }

        let mut survivors: Vec<Machine> = top
            .iter()
            .take_while(|m| m.score != mode)
            .map(|m| m.machine.clone())
            .collect();
        if survivors.len() < 2 {
            survivors = top.iter().take(2).map(|m| m.machine.clone()).collect();
        }

        tracing::info!(
            top_set = size,
            mode = ?mode,
            best = ?top[0].score,
            children = children.len(),
            survivors = survivors.len(),
            "Top set selection"
        );

        let keep = children.len().saturating_sub(size);
        children.truncate(keep);
        children.extend(survivors);
        children
    }
}

/// Keeps an elite share, then fills the rest with mutated elite copies and
/// fresh random machines in equal parts.
pub struct ElitistMutation {
    population_size: usize,
    divisor: usize,
    rng: Mutex<MachineRng>,
}

impl ElitistMutation {
    /// `divisor` sets both the elite share (`population_size / divisor`) and
    /// the number of rewritten words per copy (`code length / divisor`).
    #[must_use]
    pub fn new(population_size: usize, divisor: usize, seed: Option<u64>) -> Self {
        Self {
            population_size,
            divisor: divisor.max(1),
            rng: Mutex::new(rng_from_seed(seed)),
        }
    }

    #[must_use]
    pub fn from_config(config: &SelectionConfig, population_size: usize) -> Self {
        Self::new(population_size, config.elite_divisor, config.seed)
    }
}

impl<R: Score> Selection<R> for ElitistMutation {
    fn select(&self, snapshot: &PopulationSnapshot<R>) -> Vec<Machine> {
        let ranked = snapshot.ranked();
        if ranked.is_empty() {
            return Vec::new();
        }
        let elite_len = (self.population_size / self.divisor).max(1);
        let elite: Vec<&Machine> = ranked.iter().take(elite_len).map(|m| &m.machine).collect();
        let split = self.population_size.saturating_sub(elite.len()) / 2;
        let rewrites = framemachine_data::FRAME_SIZE / self.divisor;

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Machine> = elite.iter().map(|m| (*m).clone()).collect();
        for i in 0..split {
            let parent = elite[i % elite.len()];
            let code = parent.code().mutate_with_rng(rewrites, &mut *rng);
            next.push(Machine::with_id(MachineId::from_rng(&mut *rng), code));
        }
        for _ in 0..split {
            let code = CodeFrame::random_with_rng(&mut *rng);
            next.push(Machine::with_id(MachineId::from_rng(&mut *rng), code));
        }

        tracing::info!(
            elite = elite.len(),
            mutants = split,
            random = split,
            best = ?ranked[0].score,
            "Elitist selection"
        );
        next
    }
}

/// One of the bundled strategies, chosen by configuration.
pub enum SelectionStrategy {
    TopSetCrossover(TopSetCrossover),
    ElitistMutation(ElitistMutation),
}

impl SelectionStrategy {
    /// The strategy named by `config.selection`, sized for `config.pool`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let size = config.pool.population_size;
        match config.selection.strategy {
            StrategyKind::TopSetCrossover => {
                Self::TopSetCrossover(TopSetCrossover::from_config(&config.selection, size))
            }
            StrategyKind::ElitistMutation => {
                Self::ElitistMutation(ElitistMutation::from_config(&config.selection, size))
            }
        }
    }
}

impl<R: Score> Selection<R> for SelectionStrategy {
    fn select(&self, snapshot: &PopulationSnapshot<R>) -> Vec<Machine> {
        match self {
            Self::TopSetCrossover(s) => Selection::<R>::select(s, snapshot),
            Self::ElitistMutation(s) => Selection::<R>::select(s, snapshot),
        }
    }
}
