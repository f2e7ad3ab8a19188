use sha2::{Digest, Sha256};

use crate::error::DrawError;

/// The only place randomness enters an allocation.
pub trait EntropySource {
    fn next_word(&mut self) -> u128;
}

/// Expands a 32-byte seed into a stream of words.
///
/// `word_i = u128_be(sha256(seed || i_be)[0..16])`
#[derive(Clone, Debug)]
pub struct HashChainEntropy {
    seed: [u8; 32],
    counter: u64,
}

impl HashChainEntropy {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed, counter: 0 }
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.seed)
    }
}

impl EntropySource for HashChainEntropy {
    fn next_word(&mut self) -> u128 {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hasher.update(self.counter.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        self.counter += 1;

        let mut word = [0u8; 16];
        word.copy_from_slice(&digest[0..16]);
        u128::from_be_bytes(word)
    }
}

/// Replays a fixed list of words, starting over once the list runs out.
#[derive(Clone, Debug)]
pub struct ScriptedEntropy {
    words: Vec<u128>,
    cursor: usize,
}

impl ScriptedEntropy {
    pub fn new(words: Vec<u128>) -> Self {
        Self { words, cursor: 0 }
    }
}

impl EntropySource for ScriptedEntropy {
    fn next_word(&mut self) -> u128 {
        if self.words.is_empty() {
            return 0;
        }
        let word = self.words[self.cursor % self.words.len()];
        self.cursor += 1;
        word
    }
}

/// Turns raw entropy words into bounded draws.
///
/// Draws are reduced with a plain modulo. The bound never exceeds 2^64 while
/// words are 128 bits wide, so the bias towards low values stays below 2^-64.
#[derive(Clone, Debug)]
pub struct DrawEngine<E> {
    source: E,
    draws: u64,
}

impl<E: EntropySource> DrawEngine<E> {
    pub fn new(source: E) -> Self {
        Self { source, draws: 0 }
    }

    /// Uniform value in `[0, bound)`.
    pub fn next(&mut self, bound: u64) -> Result<u64, DrawError> {
        if bound == 0 {
            return Err(DrawError::EmptyRange);
        }
        self.draws += 1;
        Ok((self.source.next_word() % bound as u128) as u64)
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn source(&self) -> &E {
        &self.source
    }
}
