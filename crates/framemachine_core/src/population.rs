//! Scored machine populations.
//!
//! A [`Population`] is keyed by machine id, so every member owns its own
//! machine and score. The per-generation fan-out hands each rayon task a
//! disjoint member; no two tasks ever touch the same key.

use crate::config::FailurePolicy;
use crate::error::panic_message;
use crate::machine::{Machine, MachineId};
use crate::strategy::{Evaluator, Score};
use rand::Rng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

/// A machine and its accumulated score.
#[derive(Debug, Clone)]
pub struct Member<R> {
    pub machine: Machine,
    pub score: R,
}

#[derive(Debug, Clone)]
pub struct Population<R> {
    members: HashMap<MachineId, Member<R>>,
}

impl<R> Default for Population<R> {
    fn default() -> Self {
        Self {
            members: HashMap::new(),
        }
    }
}

impl<R: Score> Population<R> {
    /// `size` random machines, all at the default score.
    pub fn generate_with_rng<G: Rng + ?Sized>(size: usize, rng: &mut G) -> Self {
        Self::from_machines((0..size).map(|_| Machine::generate_with_rng(rng)))
    }

    /// Members for `machines` with default scores. A repeated id keeps the last machine.
    pub fn from_machines<T>(machines: T) -> Self
    where
        T: IntoIterator<Item = Machine>,
    {
        let members = machines
            .into_iter()
            .map(|machine| {
                (
                    machine.id(),
                    Member {
                        machine,
                        score: R::default(),
                    },
                )
            })
            .collect();
        Self { members }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &MachineId) -> Option<&Member<R>> {
        self.members.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member<R>> {
        self.members.values()
    }

    /// Runs one generation: every member takes `input`, cycles once and is
    /// rescored. Runs on the current rayon pool and returns once every member
    /// is done. Returns the number of isolated failures.
    pub fn evaluate<I, O>(
        &mut self,
        input: &I,
        evaluator: &Evaluator<I, R, O>,
        policy: FailurePolicy,
    ) -> usize
    where
        I: Sync,
    {
        self.members
            .par_iter_mut()
            .map(|(id, member)| match policy {
                FailurePolicy::Abort => {
                    member.score = evaluator.step(&mut member.machine, input, member.score);
                    0
                }
                FailurePolicy::Isolate => {
                    let previous = member.score;
                    let machine = &mut member.machine;
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        evaluator.step(machine, input, previous)
                    })) {
                        Ok(score) => {
                            member.score = score;
                            0
                        }
                        Err(payload) => {
                            member.score = R::default();
                            tracing::warn!(
                                machine = %id,
                                reason = %panic_message(payload.as_ref()),
                                "Evaluation failed, score reset"
                            );
                            1
                        }
                    }
                }
            })
            .sum()
    }

    /// Immutable copy for readers.
    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot<R> {
        PopulationSnapshot {
            members: self.members.clone(),
        }
    }

    /// Freezes this population without copying it.
    #[must_use]
    pub fn into_snapshot(self) -> PopulationSnapshot<R> {
        PopulationSnapshot {
            members: self.members,
        }
    }
}

/// A frozen view of a population, handed to selection and to observers.
#[derive(Debug, Clone)]
pub struct PopulationSnapshot<R> {
    members: HashMap<MachineId, Member<R>>,
}

impl<R: Score> PopulationSnapshot<R> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &MachineId) -> Option<&Member<R>> {
        self.members.get(id)
    }

    #[must_use]
    pub fn score(&self, id: &MachineId) -> Option<R> {
        self.members.get(id).map(|m| m.score)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member<R>> {
        self.members.values()
    }

    /// Members from best to worst score. Ties are ordered by id so the
    /// ranking does not depend on map iteration order.
    #[must_use]
    pub fn ranked(&self) -> Vec<&Member<R>> {
        let mut ranked: Vec<&Member<R>> = self.members.values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.machine.id().cmp(&b.machine.id()))
        });
        ranked
    }

    #[must_use]
    pub fn best(&self) -> Option<&Member<R>> {
        self.ranked().into_iter().next()
    }
}

/// Builds a snapshot from explicitly scored machines. A repeated id keeps
/// the last entry.
impl<R: Score> FromIterator<(Machine, R)> for PopulationSnapshot<R> {
    fn from_iter<T: IntoIterator<Item = (Machine, R)>>(iter: T) -> Self {
        let members = iter
            .into_iter()
            .map(|(machine, score)| (machine.id(), Member { machine, score }))
            .collect();
        Self { members }
    }
}
