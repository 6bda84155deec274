//! Chain collectors.
//!
//! The sampler hands each retained sweep to a collector as an encoded
//! `AlgorithmState`; readers pull states back out for density evaluation
//! or inspection.
use crate::error::Error;
use crate::messages::{self, AlgorithmState};

pub trait Collector: Send {
    /// Called once before the first sweep is collected.
    fn start(&mut self) {}

    /// Called once after the last sweep is collected.
    fn finish(&mut self) {}

    /// Append one encoded state to the chain.
    fn collect(&mut self, bytes: Vec<u8>);

    /// Decode the `i`-th stored state, if any.
    fn get(&self, i: usize) -> Result<Option<AlgorithmState>, Error>;

    /// Decode the whole stored chain in collection order.
    fn chain(&self) -> Result<Vec<AlgorithmState>, Error>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps the encoded chain in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryCollector {
    states: Vec<Vec<u8>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Collector for MemoryCollector {
    fn start(&mut self) {
        self.states.clear();
    }

    fn collect(&mut self, bytes: Vec<u8>) {
        self.states.push(bytes);
    }

    fn get(&self, i: usize) -> Result<Option<AlgorithmState>, Error> {
        self.states
            .get(i)
            .map(|bytes| messages::decode_state(bytes))
            .transpose()
            .map_err(Error::from)
    }

    fn chain(&self) -> Result<Vec<AlgorithmState>, Error> {
        self.states
            .iter()
            .map(|bytes| messages::decode_state(bytes).map_err(Error::from))
            .collect()
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}
