//! # Engine — Two-Phase Segmented Sieve Kernels
//!
//! Strikes multiples of the sieving primes out of a [`SieveBuffer`]. The
//! kernels here are the per-unit bodies; a [`crate::backend::SieveBackend`]
//! decides how units are scheduled (rayon pool, or one after another).
//!
//! ## Small-prime phase
//!
//! Small primes hit every few wheel bytes, so a unit takes a whole segment,
//! strikes every small prime into a private word mask with plain stores,
//! then folds the mask into the shared buffer with one `fetch_and` per word.
//! The per-prime first-byte computation is done once per range
//! ([`small_prime_plan`]), not once per segment.
//!
//! ## Large-prime phase
//!
//! Large primes hit a segment at most a handful of times, so the unit of
//! work is one prime: compute its first multiple per residue and clear each
//! struck bit directly with an atomic `fetch_and`.
//!
//! Both phases only clear bits, so they commute with each other and across
//! units.

use std::ops::Range;

use crate::buffer::SieveBuffer;
use crate::config::SieveConfig;
use crate::error::{Result, SieveError};
use crate::primes::PrimeEntry;
use crate::wheel::{BITS_PER_BYTE, BYTES_PER_WORD, RESIDUES, WHEEL, WORD_BITS};

/// How a buffer of `words` words is cut into work groups and segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SieveLayout {
    words: usize,
    segment_words: usize,
    block_words: usize,
}

impl SieveLayout {
    /// Spread `words` over at most `config.num_blocks` work groups, each
    /// iterating over whole segments of `config.segment_words` words.
    /// `config.segments_per_block` is not consulted: for the default word
    /// count the division lands on it exactly.
    pub fn new(config: &SieveConfig, words: usize) -> Result<Self> {
        if words == 0 {
            return Err(SieveError::Config {
                message: "sieve word count must be greater than zero".into(),
            });
        }
        if config.segment_words == 0 || words % config.segment_words != 0 {
            return Err(SieveError::Config {
                message: format!(
                    "sieve word count {} is not a multiple of the segment size {}",
                    words, config.segment_words
                ),
            });
        }
        let segments = words / config.segment_words;
        let segments_per_block = segments.div_ceil(config.num_blocks.max(1));
        Ok(SieveLayout {
            words,
            segment_words: config.segment_words,
            block_words: segments_per_block * config.segment_words,
        })
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn bits(&self) -> usize {
        self.words * WORD_BITS
    }

    pub fn block_count(&self) -> usize {
        self.words.div_ceil(self.block_words)
    }

    /// Word range of every work group.
    pub fn blocks(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.words)
            .step_by(self.block_words)
            .map(move |start| start..(start + self.block_words).min(self.words))
    }

    /// Bit range of every work group.
    pub fn block_bits(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.blocks()
            .map(|r| r.start * WORD_BITS..r.end * WORD_BITS)
    }

    /// Segments of one work group, as word ranges.
    pub fn segments(&self, block: Range<usize>) -> impl Iterator<Item = Range<usize>> {
        let seg = self.segment_words;
        let end = block.end;
        block
            .step_by(seg)
            .map(move |start| start..(start + seg).min(end))
    }
}

/// First struck wheel byte per residue for every small prime in this range.
pub fn small_prime_plan(primes: &[PrimeEntry], starts: &[u32], range_base: u64) -> Vec<[u32; 8]> {
    primes
        .iter()
        .zip(starts)
        .map(|(entry, &start)| {
            let mut firsts = [0u32; 8];
            for (slot, &r) in firsts.iter_mut().zip(RESIDUES.iter()) {
                *slot = entry.first_byte(start, range_base, r) as u32;
            }
            firsts
        })
        .collect()
}

/// Strike every small prime into the segment `words` of `buffer`.
pub fn strike_segment(
    buffer: &SieveBuffer,
    words: Range<usize>,
    primes: &[PrimeEntry],
    plan: &[[u32; 8]],
) {
    let mut mask = vec![u32::MAX; words.len()];
    let seg_first_byte = (words.start * BYTES_PER_WORD) as u64;
    let seg_end_byte = (words.end * BYTES_PER_WORD) as u64;
    let seg_first_bit = words.start * WORD_BITS;

    for (entry, firsts) in primes.iter().zip(plan) {
        let p = entry.prime as u64;
        for (j, &first) in firsts.iter().enumerate() {
            // First k >= seg_first_byte with k ≡ first (mod p).
            let lag = (first as u64 + p - seg_first_byte % p) % p;
            let mut k = seg_first_byte + lag;
            while k < seg_end_byte {
                let bit = k as usize * BITS_PER_BYTE + j - seg_first_bit;
                mask[bit / WORD_BITS] &= !(1 << (bit % WORD_BITS));
                k += p;
            }
        }
    }

    for (i, m) in mask.into_iter().enumerate() {
        buffer.and_word(words.start + i, m);
    }
}

/// Strike one large prime across the whole buffer.
pub fn strike_prime(buffer: &SieveBuffer, entry: &PrimeEntry, start: u32, range_base: u64) {
    let p = entry.prime as u64;
    let total_bytes = (buffer.len_words() * BYTES_PER_WORD) as u64;
    for (j, &r) in RESIDUES.iter().enumerate() {
        let mut k = entry.first_byte(start, range_base, r);
        while k < total_bytes {
            buffer.clear_bit(k as usize * BITS_PER_BYTE + j);
            k += p;
        }
    }
}

/// Range offsets must keep candidates on the wheel.
pub fn check_alignment(range_base: u64) -> Result<()> {
    if range_base % WHEEL != 0 {
        return Err(SieveError::MisalignedOffset { offset: range_base });
    }
    Ok(())
}
