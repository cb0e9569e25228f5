//! Built-in synthetic tasks
//!
//! Deterministic teachers used to exercise the engine end to end. Every
//! example's label repeats its text, so a model that echoes the label scores
//! perfectly on every metric.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::source::ExampleSource;
use super::{DataType, Example, Split};

/// Examples in the training split of the single-turn teachers
pub const NUM_TRAIN: usize = 500;
/// Examples in the valid and test splits of the single-turn teachers
pub const NUM_TEST: usize = 100;
/// Candidates offered with each example
pub const NUM_CANDIDATES: usize = 100;
/// Turns per episode in the multi-turn teacher
pub const EPISODE_TURNS: usize = 4;

const DIGITS_PER_TEXT: usize = 4;

/// Variant of the integration teacher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationVariant {
    /// Single-turn examples with random candidate sets
    Candidate,
    /// Four-turn episodes with random candidate sets
    MultiturnCandidate,
    /// Single-turn examples drawn from one fixed candidate set
    FixedDialogCandidate,
}

impl IntegrationVariant {
    /// Resolve a task name such as `integration_tests:multiturnCandidate`
    pub fn from_task_name(name: &str) -> Option<Self> {
        match name {
            "integration_tests" | "integration_tests:candidate" => Some(Self::Candidate),
            "integration_tests:multiturnCandidate" => Some(Self::MultiturnCandidate),
            "integration_tests:fixed_dialog_candidate" => Some(Self::FixedDialogCandidate),
            _ => None,
        }
    }

    fn salt(&self) -> u64 {
        match self {
            Self::Candidate => 0x11,
            Self::MultiturnCandidate => 0x22,
            Self::FixedDialogCandidate => 0x33,
        }
    }

    /// Examples per epoch for a split
    pub fn num_examples(&self, split: Split) -> usize {
        let base = match split {
            Split::Train => NUM_TRAIN,
            Split::Valid | Split::Test => NUM_TEST,
        };
        match self {
            Self::MultiturnCandidate => base * EPISODE_TURNS,
            Self::Candidate | Self::FixedDialogCandidate => base,
        }
    }
}

fn random_text(rng: &mut StdRng) -> String {
    (0..DIGITS_PER_TEXT)
        .map(|_| rng.gen_range(0..10u8).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn candidates_with(rng: &mut StdRng, label: &str) -> Vec<String> {
    let mut candidates: Vec<String> = (1..NUM_CANDIDATES).map(|_| random_text(rng)).collect();
    candidates.push(label.to_string());
    candidates.shuffle(rng);
    candidates
}

/// Generate the examples of one variant and split
pub fn generate(variant: IntegrationVariant, split: Split, seed: u64) -> Vec<Example> {
    let split_salt = match split {
        Split::Train => 1,
        Split::Valid => 2,
        Split::Test => 3,
    };
    let mut rng = StdRng::seed_from_u64(seed ^ (variant.salt() << 8) ^ split_salt);
    let total = variant.num_examples(split);

    match variant {
        IntegrationVariant::Candidate => (0..total)
            .map(|_| {
                let text = random_text(&mut rng);
                let candidates = candidates_with(&mut rng, &text);
                Example::new(text.clone())
                    .with_labels([text])
                    .with_candidates(candidates)
            })
            .collect(),
        IntegrationVariant::MultiturnCandidate => (0..total)
            .map(|i| {
                let text = random_text(&mut rng);
                let candidates = candidates_with(&mut rng, &text);
                Example::new(text.clone())
                    .with_labels([text])
                    .with_candidates(candidates)
                    .with_episode_done((i + 1) % EPISODE_TURNS == 0)
            })
            .collect(),
        IntegrationVariant::FixedDialogCandidate => {
            let fixed: Vec<String> = (0..NUM_CANDIDATES).map(|_| random_text(&mut rng)).collect();
            (0..total)
                .map(|_| {
                    let text = fixed[rng.gen_range(0..fixed.len())].clone();
                    Example::new(text.clone())
                        .with_labels([text])
                        .with_candidates(fixed.iter().cloned())
                })
                .collect()
        }
    }
}

/// Build the source for an integration task name
pub fn source(name: &str, datatype: DataType, seed: u64) -> Option<ExampleSource> {
    let variant = IntegrationVariant::from_task_name(name)?;
    let examples = generate(variant, datatype.split, seed);
    Some(ExampleSource::for_datatype(name, examples, datatype, seed))
}
