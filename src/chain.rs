//! # Chain — Chain Extraction and Cleaning
//!
//! A chain is a maximal run of consecutive alive wheel candidates. Adjacency
//! is in wheel space: the candidates at bits `b` and `b + 1` are neighbours
//! even though their integer gap is 2, 4 or 6.
//!
//! ## Finding
//!
//! Each work unit scans its own bit range with [`scan_unit`]. A run that
//! begins before the unit's range is traced back to its true start, and a
//! run that continues past the unit's end is read through to its true end,
//! so units never report a fragment. Two units sharing a run both report the
//! identical chain; [`clean_chains`] collapses them.
//!
//! Members are not stored: the wheel fixes every gap once the first
//! member's residue is known, so a chain is just its start and length.
//!
//! ## Boundary runs
//!
//! A run touching the first or last bit of the buffer may continue in the
//! neighbouring range. It is flagged [`Chain::boundary`] and otherwise kept
//! as is: no cross-range merge is attempted.

use rug::Integer;
use serde::{Deserialize, Serialize};

use crate::buffer::SieveBuffer;
use crate::wheel::{bit_offset, gap_after, offset_bit, WHEEL};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    /// Offset of the first member from the search base.
    pub start_offset: u64,
    /// Member count, saturating at `u32::MAX`.
    pub length: u32,
    /// The run touches an edge of the buffer and may be truncated.
    pub boundary: bool,
}

impl Chain {
    /// Chain for the alive bits `[start, end)` of a buffer holding `total_bits`.
    pub fn from_run(start: usize, end: usize, total_bits: usize, range_base: u64) -> Self {
        Chain {
            start_offset: range_base + bit_offset(start),
            length: u32::try_from(end - start).unwrap_or(u32::MAX),
            boundary: start == 0 || end == total_bits,
        }
    }

    /// Wheel byte base and residue index of the first member. An offset off
    /// the wheel is treated as residue 1.
    fn wheel_position(&self) -> (u64, usize) {
        let idx = offset_bit(self.start_offset % WHEEL).unwrap_or(0);
        let byte_base = self.start_offset - self.start_offset % WHEEL;
        (byte_base, idx)
    }

    /// Integer gaps between consecutive members (`length - 1` of them).
    pub fn gaps(&self) -> impl Iterator<Item = u8> {
        let (_, idx) = self.wheel_position();
        let span = (self.length as usize).saturating_sub(1);
        (idx..idx + span).map(gap_after)
    }

    /// Offsets of every member, starting with `start_offset`.
    pub fn offsets(&self) -> impl Iterator<Item = u64> {
        let (byte_base, idx) = self.wheel_position();
        (idx..idx + self.length as usize).map(move |bit| byte_base + bit_offset(bit))
    }

    pub fn end_offset(&self) -> u64 {
        let (byte_base, idx) = self.wheel_position();
        let last = idx + (self.length as usize).saturating_sub(1);
        byte_base + bit_offset(last)
    }

    /// Absolute candidate integers for the primality tester.
    pub fn members(&self, base: &Integer) -> Vec<Integer> {
        self.offsets().map(|o| Integer::from(base + o)).collect()
    }
}

/// Find every run of at least `min_length` alive bits that has a bit in
/// `bits`. Reads outside `bits` only to complete such runs.
pub fn scan_unit(
    buffer: &SieveBuffer,
    bits: std::ops::Range<usize>,
    range_base: u64,
    min_length: u32,
) -> Vec<Chain> {
    let total = buffer.len_bits();
    let mut chains = Vec::new();
    let mut cursor = bits.start;
    while let Some(alive) = buffer.next_alive(cursor, bits.end) {
        let mut start = alive;
        if start == bits.start {
            while start > 0 && buffer.is_alive(start - 1) {
                start -= 1;
            }
        }
        let end = buffer.next_dead(alive, total);
        if end - start >= min_length as usize {
            chains.push(Chain::from_run(start, end, total, range_base));
        }
        cursor = end;
    }
    chains
}

/// Deduplicate by start offset (keeping the longest), drop chains shorter
/// than `min_length`, and order by start offset.
pub fn clean_chains(mut chains: Vec<Chain>, min_length: u32) -> Vec<Chain> {
    chains.sort_unstable_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then(b.length.cmp(&a.length))
    });
    chains.dedup_by_key(|c| c.start_offset);
    chains.retain(|c| c.length >= min_length);
    chains
}
