//! Task sources
//!
//! A task source hands out examples one at a time and tells the caller when
//! an epoch boundary has been reached or the stream has run dry.

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{DataType, Example};

/// Outcome of asking a source for its next example
#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    /// Another example in the current pass
    Example(Example),
    /// The current pass is over; `reset` starts the next one
    EpochBoundary,
    /// No more examples and no epoch boundary is defined
    Exhausted,
}

/// A finite or epoch-bounded stream of labeled examples
pub trait TaskSource: Send {
    /// Task identifier
    fn id(&self) -> &str;

    /// Examples per epoch, if the source declares an epoch
    fn num_examples(&self) -> Option<u64>;

    /// Next example, or the reason there is none
    fn next_example(&mut self) -> Result<Next>;

    /// Start a new pass after an epoch boundary
    fn reset(&mut self);
}

/// In-memory source over a fixed list of examples
///
/// Training order is reshuffled on every reset; evaluation order is the list
/// order. Without a declared epoch the end of the list reports
/// [`Next::Exhausted`] instead of an epoch boundary.
pub struct ExampleSource {
    id: String,
    examples: Vec<Example>,
    order: Vec<usize>,
    cursor: usize,
    shuffle: Option<StdRng>,
    declare_epoch: bool,
}

impl ExampleSource {
    /// Create an ordered source with a declared epoch
    pub fn new(id: impl Into<String>, examples: Vec<Example>) -> Self {
        let order = (0..examples.len()).collect();
        Self {
            id: id.into(),
            examples,
            order,
            cursor: 0,
            shuffle: None,
            declare_epoch: true,
        }
    }

    /// Shuffle the order of every pass with a seeded generator
    pub fn shuffled(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.shuffle = Some(rng);
        self
    }

    /// Do not declare an epoch size; the end of the list exhausts the source
    pub fn streaming(mut self) -> Self {
        self.declare_epoch = false;
        self
    }

    /// Source configured for a datatype: shuffled when training, without an
    /// epoch size when streaming
    pub fn for_datatype(
        id: impl Into<String>,
        examples: Vec<Example>,
        datatype: DataType,
        seed: u64,
    ) -> Self {
        let mut source = Self::new(id, examples);
        if datatype.is_training() {
            source = source.shuffled(seed);
        }
        if datatype.stream {
            source = source.streaming();
        }
        source
    }
}

impl TaskSource for ExampleSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn num_examples(&self) -> Option<u64> {
        self.declare_epoch.then_some(self.examples.len() as u64)
    }

    fn next_example(&mut self) -> Result<Next> {
        match self.order.get(self.cursor) {
            Some(&index) => {
                self.cursor += 1;
                Ok(Next::Example(self.examples[index].clone()))
            }
            None if self.declare_epoch => Ok(Next::EpochBoundary),
            None => Ok(Next::Exhausted),
        }
    }

    fn reset(&mut self) {
        self.cursor = 0;
        if let Some(rng) = &mut self.shuffle {
            self.order.shuffle(rng);
        }
    }
}
