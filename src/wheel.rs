//! # Wheel — Mod-30 Candidate Addressing
//!
//! The sieve tracks only integers coprime to 30 = 2·3·5. Each block of 30
//! consecutive integers is one wheel byte holding 8 candidate bits, one per
//! residue in [`RESIDUES`]. A 32-bit sieve word therefore covers 120 integers.
//!
//! Bit `b` of the sieve lives in word `b / 32` at bit `b % 32` (LSB first),
//! belongs to wheel byte `b / 8`, and has residue `RESIDUES[b % 8]`.

/// The wheel modulus.
pub const WHEEL: u64 = 30;

/// Residues coprime to 30: these are the only positions we track.
pub const RESIDUES: [u8; 8] = [1, 7, 11, 13, 17, 19, 23, 29];

/// Candidate bits per wheel byte.
pub const BITS_PER_BYTE: usize = 8;

/// Bits per sieve word.
pub const WORD_BITS: usize = 32;

/// Wheel bytes per sieve word.
pub const BYTES_PER_WORD: usize = WORD_BITS / BITS_PER_BYTE;

/// Integers covered by one sieve word.
pub const WORD_RANGE: u64 = WHEEL * BYTES_PER_WORD as u64;

/// Map residue → index in the wheel (255 for residues sharing a factor with 30).
const RES_TO_IDX: [u8; 30] = [
    255, 0, 255, 255, 255, 255, 255, 1, 255, 255, 255, 2, 255, 3, 255, 255, 255, 4, 255, 5, 255,
    255, 255, 6, 255, 255, 255, 255, 255, 7,
];

/// Offset within a range of the candidate stored at bit `bit`.
#[inline]
pub fn bit_offset(bit: usize) -> u64 {
    (bit / BITS_PER_BYTE) as u64 * WHEEL + RESIDUES[bit % BITS_PER_BYTE] as u64
}

/// Inverse of [`bit_offset`]: the bit holding `offset`, or `None` when the
/// offset shares a factor with 30.
pub fn offset_bit(offset: u64) -> Option<usize> {
    let idx = RES_TO_IDX[(offset % WHEEL) as usize];
    if idx == 255 {
        return None;
    }
    Some((offset / WHEEL) as usize * BITS_PER_BYTE + idx as usize)
}

/// Integer distance from the candidate at `bit` to the one at `bit + 1`.
#[inline]
pub fn gap_after(bit: usize) -> u8 {
    match bit % BITS_PER_BYTE {
        7 => 2, // 29 → 31
        i => RESIDUES[i + 1] - RESIDUES[i],
    }
}

/// Total integer span covered by `words` sieve words.
pub fn words_range(words: usize) -> u64 {
    words as u64 * WORD_RANGE
}
