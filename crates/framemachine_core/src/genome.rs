use crate::random::random_words;
use framemachine_data::{CodeFrame, FRAME_SIZE};
use rand::Rng;

/// Genetic operators on code frames.
pub trait CodeFrameLogic {
    fn random_with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self;
    /// Per word: `self` with probability `parent_rate / 2`, `other` with
    /// `parent_rate / 2`, otherwise a fresh random word.
    fn crossover_with_rng<R: Rng + ?Sized>(&self, other: &Self, parent_rate: f64, rng: &mut R)
        -> Self;
    /// Copy with `count` randomly chosen cells overwritten by random words.
    fn mutate_with_rng<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Self;
    /// Fraction of cells holding the same word in both frames.
    fn similarity(&self, other: &Self) -> f32;
}

impl CodeFrameLogic for CodeFrame {
    fn random_with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        CodeFrame::from_fn(|_| rng.gen())
    }

    fn crossover_with_rng<R: Rng + ?Sized>(
        &self,
        other: &Self,
        parent_rate: f64,
        rng: &mut R,
    ) -> Self {
        let half = (parent_rate / 2.0).clamp(0.0, 0.5);
        CodeFrame::from_fn(|i| {
            let roll = rng.gen::<f64>();
            if roll < half {
                self.word(i)
            } else if roll < 2.0 * half {
                other.word(i)
            } else {
                rng.gen()
            }
        })
    }

    fn mutate_with_rng<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Self {
        let mut words = *self.words();
        for word in random_words(count, rng) {
            let cell = rng.gen_range(0..FRAME_SIZE);
            words[cell] = word;
        }
        CodeFrame::from(words)
    }

    fn similarity(&self, other: &Self) -> f32 {
        let same = self
            .words()
            .iter()
            .zip(other.words().iter())
            .filter(|(a, b)| a == b)
            .count();
        same as f32 / FRAME_SIZE as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_crossover_full_parent_rate_only_inherits() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = CodeFrame::from_fn(|_| 1);
        let b = CodeFrame::from_fn(|_| 2);
        let child = a.crossover_with_rng(&b, 1.0, &mut rng);
        assert!(child.words().iter().all(|&w| w == 1 || w == 2));
        assert!(child.words().contains(&1));
        assert!(child.words().contains(&2));
    }

    #[test]
    fn test_crossover_zero_parent_rate_is_random() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let a = CodeFrame::from_fn(|_| 1);
        let child = a.crossover_with_rng(&a, 0.0, &mut rng);
        assert!(child.similarity(&a) < 0.05);
    }

    #[test]
    fn test_mutate_touches_at_most_count_cells() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let frame = CodeFrame::from_fn(|_| 0);
        let mutated = frame.mutate_with_rng(16, &mut rng);
        let changed = FRAME_SIZE - (mutated.similarity(&frame) * FRAME_SIZE as f32) as usize;
        assert!(changed <= 16);
        assert!(changed > 0);
    }

    #[test]
    fn test_random_frames_differ() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let a = CodeFrame::random_with_rng(&mut rng);
        let b = CodeFrame::random_with_rng(&mut rng);
        assert_ne!(a, b);
    }
}
