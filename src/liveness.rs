//! Liveness survey of random machines.
//!
//! A random program usually settles into emitting only 0 or -1. The survey
//! counts how often fresh machines produce anything else, over a grid of
//! machine and cycle counts.

use framemachine_core::Machine;
use rand::Rng;
use rayon::prelude::*;
use std::io::Write;

/// Largest machine or cycle count in the survey grid.
pub const GRID_LIMIT: usize = i16::MAX as usize / 4;

/// True for any output other than all-zeros or all-ones.
#[must_use]
pub fn is_live(output: i32) -> bool {
    output != 0 && output != -1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessReport {
    pub machines: usize,
    pub cycles: usize,
    /// Machines that produced at least one live output.
    pub live_machines: usize,
    /// Live outputs over all machines and cycles.
    pub live_outputs: u64,
}

/// Runs `machines` fresh random machines for up to `cycles` inputs.
pub fn survey<G, S>(machines: usize, cycles: usize, input: S, rng: &mut G) -> LivenessReport
where
    G: Rng + ?Sized,
    S: IntoIterator<Item = i32>,
{
    let mut pool: Vec<(Machine, bool)> = (0..machines)
        .map(|_| (Machine::generate_with_rng(rng), false))
        .collect();

    let mut live_outputs = 0u64;
    for x in input.into_iter().take(cycles) {
        live_outputs += pool
            .par_iter_mut()
            .map(|(machine, live)| {
                machine.set_input(x);
                machine.cycle();
                if is_live(machine.output()) {
                    *live = true;
                    1u64
                } else {
                    0
                }
            })
            .sum::<u64>();
    }

    LivenessReport {
        machines,
        cycles,
        live_machines: pool.iter().filter(|(_, live)| *live).count(),
        live_outputs,
    }
}

/// Doubling sizes from 4 up to `limit`.
pub fn grid_sizes(limit: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(4usize), |n| n.checked_mul(2)).take_while(move |&n| n <= limit)
}

pub const CSV_HEADER: &str = "machines,cycles,live_machines,live_outputs";

impl LivenessReport {
    #[must_use]
    pub fn csv_row(&self) -> String {
        format!(
            "{},{},{},{}",
            self.machines, self.cycles, self.live_machines, self.live_outputs
        )
    }
}

pub fn write_csv<W: Write>(writer: &mut W, reports: &[LivenessReport]) -> std::io::Result<()> {
    writeln!(writer, "{CSV_HEADER}")?;
    for report in reports {
        writeln!(writer, "{}", report.csv_row())?;
    }
    Ok(())
}
