use rand::Rng;
use rand::seq::SliceRandom;

use crate::game_input::Features;

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Features,
    pub action: usize,
    pub reward: f32,
    pub next_state: Features,
    pub done: bool,
}

/// Bounded experience memory; once full the oldest entry is overwritten.
pub struct ReplayBuffer {
    buffer: Vec<Transition>,
    capacity: usize,
    index: usize, // next overwrite position
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            index: 0,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.index] = transition;
            self.index = (self.index + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// is it possible to learn (are there at least batch_size elements)
    pub fn is_ready(&self, batch_size: usize) -> bool {
        self.buffer.len() >= batch_size
    }

    /// Random batch without replacement; smaller when the memory holds fewer.
    pub fn sample<R: Rng>(&self, batch_size: usize, rng: &mut R) -> Vec<&Transition> {
        self.buffer.choose_multiple(rng, batch_size).collect()
    }
}
