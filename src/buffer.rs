//! # Buffer — Bit-Packed Shared Sieve Buffer
//!
//! One bit per wheel candidate, packed into 32-bit atomic words so that any
//! number of parallel units can strike the same buffer without locks.
//!
//! Writes are clear-only (`fetch_and`), which makes concurrent strikes
//! commute: two units clearing the same bit, or different bits of the same
//! word, always converge to the same final word. The only operation that
//! sets bits is [`SieveBuffer::fill`], which runs between stages when no
//! unit is striking. Stage boundaries are rayon joins, so `Relaxed` is
//! enough for every access.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Result, SieveError};
use crate::wheel::WORD_BITS;

pub struct SieveBuffer {
    words: Vec<AtomicU32>,
}

impl SieveBuffer {
    /// Allocate `len` words, all bits alive. Allocation failure is reported
    /// instead of aborting the process.
    pub fn allocate(len: usize) -> Result<Self> {
        let mut words = Vec::new();
        words
            .try_reserve_exact(len)
            .map_err(|_| SieveError::Allocation { words: len })?;
        words.extend((0..len).map(|_| AtomicU32::new(u32::MAX)));
        Ok(SieveBuffer { words })
    }

    /// Buffer holding exactly the given words.
    pub fn from_words(words: &[u32]) -> Self {
        SieveBuffer {
            words: words.iter().map(|&w| AtomicU32::new(w)).collect(),
        }
    }

    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    pub fn len_bits(&self) -> usize {
        self.words.len() * WORD_BITS
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[AtomicU32] {
        &self.words
    }

    /// Mark every candidate alive.
    pub fn fill(&self) {
        for w in &self.words {
            w.store(u32::MAX, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.words[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_alive(&self, bit: usize) -> bool {
        self.word(bit / WORD_BITS) & (1 << (bit % WORD_BITS)) != 0
    }

    /// Eliminate one candidate.
    #[inline]
    pub fn clear_bit(&self, bit: usize) {
        self.words[bit / WORD_BITS].fetch_and(!(1 << (bit % WORD_BITS)), Ordering::Relaxed);
    }

    /// Eliminate every candidate whose bit is zero in `mask`.
    #[inline]
    pub fn and_word(&self, index: usize, mask: u32) {
        if mask != u32::MAX {
            self.words[index].fetch_and(mask, Ordering::Relaxed);
        }
    }

    pub fn count_alive(&self) -> u64 {
        count_alive(&self.words)
    }

    /// Copy of the current word contents.
    pub fn snapshot(&self) -> Vec<u32> {
        self.words.iter().map(|w| w.load(Ordering::Relaxed)).collect()
    }

    /// First alive bit in `[from, limit)`.
    pub fn next_alive(&self, from: usize, limit: usize) -> Option<usize> {
        self.next_matching(from, limit, false)
    }

    /// First eliminated bit in `[from, limit)`, or `limit` if every bit in
    /// the interval is alive.
    pub fn next_dead(&self, from: usize, limit: usize) -> usize {
        self.next_matching(from, limit, true).unwrap_or(limit)
    }

    fn next_matching(&self, from: usize, limit: usize, dead: bool) -> Option<usize> {
        let limit = limit.min(self.len_bits());
        let mut bit = from;
        while bit < limit {
            let raw = self.word(bit / WORD_BITS);
            let word = if dead { !raw } else { raw };
            let masked = word & (u32::MAX << (bit % WORD_BITS));
            if masked != 0 {
                let found = (bit / WORD_BITS) * WORD_BITS + masked.trailing_zeros() as usize;
                return (found < limit).then_some(found);
            }
            bit = (bit / WORD_BITS + 1) * WORD_BITS;
        }
        None
    }

    pub fn iter_alive(&self) -> impl Iterator<Item = usize> + '_ {
        let limit = self.len_bits();
        std::iter::successors(self.next_alive(0, limit), move |&b| {
            self.next_alive(b + 1, limit)
        })
    }
}

/// Population count over a slice of words.
pub fn count_alive(words: &[AtomicU32]) -> u64 {
    words
        .iter()
        .map(|w| w.load(Ordering::Relaxed).count_ones() as u64)
        .sum()
}
