//! A 32-bit Mersenne-Twister generator with an exportable state.
//!
//! The plugin boundary requires handing the native generator's exact stream
//! position to a foreign runtime and reading it back, so unlike the usual
//! ecosystem generators this one exposes its full internal state: the 624
//! state words plus the cursor, the same representation NumPy's `MT19937`
//! bit generator uses for `__getstate__`/`__setstate__`.
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of 32-bit words in the MT19937 state.
pub const STATE_WORDS: usize = 624;

const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;
const DEFAULT_SEED: u32 = 5489;

/// The cross-runtime representation of a Mersenne-Twister state: the word
/// array plus the cursor position (number of words consumed since the last
/// twist).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorState {
    pub key: Vec<u32>,
    pub pos: u32,
}

/// A malformed [`GeneratorState`]. Always a configuration problem on the
/// foreign side, never recoverable.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GeneratorStateError {
    #[error("generator state must hold exactly {STATE_WORDS} words, found {found}")]
    WordCount { found: usize },
    #[error("generator cursor {pos} is past the end of the {STATE_WORDS}-word state")]
    CursorOutOfRange { pos: u32 },
}

/// The MT19937 generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mt19937 {
    key: [u32; STATE_WORDS],
    pos: usize,
}

impl Mt19937 {
    /// Seed a generator with the reference `init_genrand` recurrence.
    pub fn new(seed: u32) -> Self {
        let mut key = [0_u32; STATE_WORDS];
        key[0] = seed;
        for i in 1..STATE_WORDS {
            key[i] = (1_812_433_253_u32)
                .wrapping_mul(key[i - 1] ^ (key[i - 1] >> 30))
                .wrapping_add(i as u32);
        }
        Self {
            key,
            pos: STATE_WORDS,
        }
    }

    /// Export the full internal state.
    pub fn state(&self) -> GeneratorState {
        GeneratorState {
            key: self.key.to_vec(),
            pos: self.pos as u32,
        }
    }

    /// Replace the internal state wholesale.
    ///
    /// After a successful call the next draw continues the imported stream
    /// exactly; `set_state(other.state())` makes the two generators emit
    /// identical sequences from here on.
    pub fn set_state(&mut self, state: &GeneratorState) -> Result<(), GeneratorStateError> {
        if state.key.len() != STATE_WORDS {
            return Err(GeneratorStateError::WordCount {
                found: state.key.len(),
            });
        }
        if state.pos as usize > STATE_WORDS {
            return Err(GeneratorStateError::CursorOutOfRange { pos: state.pos });
        }
        self.key.copy_from_slice(&state.key);
        self.pos = state.pos as usize;
        Ok(())
    }

    /// Reconstruct a generator from an exported state.
    pub fn from_state(state: &GeneratorState) -> Result<Self, GeneratorStateError> {
        let mut out = Self::new(DEFAULT_SEED);
        out.set_state(state)?;
        Ok(out)
    }

    fn twist(&mut self) {
        for i in 0..STATE_WORDS {
            let y = (self.key[i] & UPPER_MASK)
                | (self.key[(i + 1) % STATE_WORDS] & LOWER_MASK);
            let mut next = self.key[(i + M) % STATE_WORDS] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.key[i] = next;
        }
        self.pos = 0;
    }
}

impl Default for Mt19937 {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        if self.pos >= STATE_WORDS {
            self.twist();
        }
        let mut y = self.key[self.pos];
        self.pos += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    fn next_u64(&mut self) -> u64 {
        let lo = u64::from(self.next_u32());
        let hi = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Mt19937 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u32::from_le_bytes(seed))
    }
}
