//! # Config — Sieve Tuning Parameters
//!
//! Every size and threshold the engine uses lives in [`SieveConfig`] rather
//! than in constants, so tests can drive tiny synthetic ranges while
//! production keeps the device-sized defaults below.
//!
//! | Field | Default | Meaning |
//! |-------|---------|---------|
//! | `segment_words` | 8192 | words per segment (32 KiB) |
//! | `segments_per_block` | 64 | segments per work group in the default buffer |
//! | `num_blocks` | 256 | work groups per sieve pass |
//! | `small_prime_count` | 23 | primes 7..=101 use the dense phase |
//! | `min_chain_length` | 8 | shortest run reported as a chain |
//! | `long_chain_length` | 10 | shortest run kept in the long pool |
//! | `max_long_chains` | 32 | long pool capacity |
//! | `histogram_max` | 10 | top histogram bucket (longer runs clamp here) |
//! | `estimated_chains_per_million` | 30 | sizes the general pool |
//! | `threads` | 0 | worker threads per device (0 = one per core) |
//!
//! `segments_per_block` only sizes [`SieveConfig::sieve_word_count`]. A
//! session handed any other word count spreads it over `num_blocks` work
//! groups, so the per-group segment count follows from the buffer size.
//!
//! The struct is serde-enabled with `#[serde(default)]` so a caller can embed
//! it in its own configuration file; reading files is the caller's job.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SieveError};
use crate::wheel;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
    pub segment_words: usize,
    pub segments_per_block: usize,
    pub num_blocks: usize,
    pub small_prime_count: usize,
    pub min_chain_length: u32,
    pub long_chain_length: u32,
    pub max_long_chains: usize,
    pub histogram_max: usize,
    pub estimated_chains_per_million: u64,
    pub threads: usize,
}

impl Default for SieveConfig {
    fn default() -> Self {
        SieveConfig {
            segment_words: 8192,
            segments_per_block: 64,
            num_blocks: 256,
            small_prime_count: 23,
            min_chain_length: 8,
            long_chain_length: 10,
            max_long_chains: 32,
            histogram_max: 10,
            estimated_chains_per_million: 30,
            threads: 0,
        }
    }
}

impl SieveConfig {
    /// Sieve size in words implied by the block layout.
    pub fn sieve_word_count(&self) -> usize {
        self.segment_words * self.segments_per_block * self.num_blocks
    }

    /// Integer span covered by one full sieve pass.
    pub fn sieve_range(&self) -> u64 {
        wheel::words_range(self.sieve_word_count())
    }

    /// General pool capacity: ten times the expected chain yield of a range.
    pub fn max_chains(&self) -> usize {
        self.max_chains_for(self.sieve_word_count())
    }

    /// General pool capacity for a buffer of `words` words.
    pub fn max_chains_for(&self, words: usize) -> usize {
        let range = wheel::words_range(words) as u128;
        let estimate = 10 * self.estimated_chains_per_million as u128 * range / 1_000_000;
        (estimate as usize).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("segment_words", self.segment_words),
            ("segments_per_block", self.segments_per_block),
            ("num_blocks", self.num_blocks),
            ("min_chain_length", self.min_chain_length as usize),
            ("histogram_max", self.histogram_max),
        ];
        if let Some((name, _)) = nonzero.iter().find(|(_, v)| *v == 0) {
            return Err(SieveError::Config {
                message: format!("{} must be greater than zero", name),
            });
        }
        if self.long_chain_length < self.min_chain_length {
            return Err(SieveError::Config {
                message: format!(
                    "long_chain_length ({}) is below min_chain_length ({})",
                    self.long_chain_length, self.min_chain_length
                ),
            });
        }
        Ok(())
    }
}
