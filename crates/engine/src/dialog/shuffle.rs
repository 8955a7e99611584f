use rand::seq::SliceRandom;
use rand::Rng;

use super::script::DialogScript;

/// Repeatable script indices still to be played in this generation.
///
/// The order is fixed at refill time and consumed from the back, so a stored
/// bag replays the same draws without needing the random source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShuffleBag {
    remaining: Vec<usize>,
}

impl ShuffleBag {
    pub fn from_remaining(remaining: Vec<usize>) -> Self {
        Self { remaining }
    }

    pub fn remaining(&self) -> &[usize] {
        &self.remaining
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Replaces the contents with every repeatable index, freshly shuffled.
    pub fn refill<R: Rng + ?Sized>(&mut self, scripts: &[DialogScript], rng: &mut R) {
        self.remaining.clear();
        self.remaining.extend(
            scripts
                .iter()
                .enumerate()
                .filter(|(_, script)| !script.play_once())
                .map(|(index, _)| index),
        );
        self.remaining.shuffle(rng);
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.remaining.pop()
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }

    /// Drops entries that do not name a repeatable script, and repeats.
    /// Returns how many were removed.
    pub fn retain_valid(&mut self, scripts: &[DialogScript]) -> usize {
        let before = self.remaining.len();
        let mut seen = vec![false; scripts.len()];
        self.remaining.retain(|&index| {
            let valid = scripts
                .get(index)
                .is_some_and(|script| !script.play_once());
            if !valid || seen[index] {
                return false;
            }
            seen[index] = true;
            true
        });
        before - self.remaining.len()
    }
}
