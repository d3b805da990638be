use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::game::Game;
use crate::game_input::{extract_features, Features};
use crate::snake::Direction;

/// Anything that picks the next heading from an observation.
pub trait Policy {
    fn act(&mut self, features: &Features) -> Direction;
}

/// Feeds one observation of `game` to `policy` and applies the answer.
pub fn drive<P: Policy + ?Sized>(policy: &mut P, game: &mut Game) -> Direction {
    let dir = policy.act(&extract_features(game));
    game.change_direction(dir);
    dir
}

/// Uniformly random actions. Baseline for evaluation.
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl Policy for RandomPolicy {
    fn act(&mut self, _features: &Features) -> Direction {
        Direction::ALL[self.rng.gen_range(0..Direction::ALL.len())]
    }
}
