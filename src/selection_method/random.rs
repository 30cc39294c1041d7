use rand::seq::SliceRandom;
use rand::Rng;

use super::*;

/// Uniform shuffle, fresh per cycle.
pub struct Random;

impl Random {
    pub fn order_with<R: Rng + ?Sized>(candidates: &mut [Endpoint], rng: &mut R) {
        candidates.shuffle(rng);
    }
}

impl SelectionAlgorithm for Random {
    fn order(&self, candidates: &mut [Endpoint]) {
        Self::order_with(candidates, &mut rand::thread_rng());
    }
}
