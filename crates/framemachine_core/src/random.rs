//! Random source for code frames and selection.
//!
//! ChaCha20 is a cryptographically strong generator. Unseeded generators draw
//! their key from the operating system; a seed makes runs reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

pub type MachineRng = ChaCha20Rng;

/// Seeded generator when `seed` is set, otherwise one keyed from OS entropy.
#[must_use]
pub fn rng_from_seed(seed: Option<u64>) -> MachineRng {
    match seed {
        Some(seed) => MachineRng::seed_from_u64(seed),
        None => MachineRng::from_entropy(),
    }
}

/// `len` uniformly distributed words.
pub fn random_words<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<u32> {
    (0..len).map(|_| rng.gen()).collect()
}
