//! Built-in reference models

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{Model, Prediction};
use crate::tasks::Example;

const NO_ANSWER: &str = "I don't know";

/// Answers every example with its first label
#[derive(Debug, Clone, Copy, Default)]
pub struct RepeatLabel;

impl RepeatLabel {
    pub const NAME: &'static str = "repeat_label";
}

#[async_trait]
impl Model for RepeatLabel {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, example: &Example) -> Result<Prediction> {
        let text = example
            .labels
            .first()
            .map(String::as_str)
            .unwrap_or(NO_ANSWER);
        Ok(Prediction::new(text))
    }
}

/// Picks a random label candidate with a seeded generator
#[derive(Debug)]
pub struct RandomCandidate {
    rng: Mutex<StdRng>,
}

impl RandomCandidate {
    pub const NAME: &'static str = "random_candidate";

    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Model for RandomCandidate {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn evaluate(&self, example: &Example) -> Result<Prediction> {
        // fall back to labels when the task offers no candidates
        let pool = if example.label_candidates.is_empty() {
            &example.labels
        } else {
            &example.label_candidates
        };

        let mut ranked = pool.clone();
        ranked.shuffle(&mut *self.rng.lock());
        let text = ranked.first().cloned().unwrap_or_else(|| NO_ANSWER.to_string());
        Ok(Prediction::new(text).with_candidates(ranked))
    }
}
