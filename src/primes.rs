//! # Primes — Sieving Prime Table and Wheel Offsets
//!
//! The immutable set of sieving primes a session strikes with, each paired
//! with the modular inverse of the wheel modulus (30⁻¹ mod p). The inverse
//! turns "first multiple of p at or after the range base" into a wheel-byte
//! index per residue without any division in the strike loops.
//!
//! Entries below the configured small-prime cutoff are struck by the dense
//! small-prime phase; the rest by the sparse large-prime phase.
//!
//! ## Starting multiples
//!
//! For a search base `B` (a multiple of 30), the starting multiple of `p` is
//! `(-B) mod p`: the offset from `B` of the first multiple of `p`. It does
//! not depend on the range, so one set of starting multiples serves every
//! range offset measured from the same base.

use rug::Integer;

use crate::error::{Result, SieveError};
use crate::wheel::{RESIDUES, WHEEL};

/// A sieving prime with `inverse = 30⁻¹ mod prime`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimeEntry {
    pub prime: u32,
    pub inverse: u32,
}

impl PrimeEntry {
    /// First wheel byte `k` whose candidate with residue `r` is a multiple of
    /// this prime, for a range starting `range_base` past the search base.
    ///
    /// Solves `range_base + 30k + r ≡ start (mod p)` where `start` is the
    /// prime's starting multiple.
    #[inline]
    pub fn first_byte(&self, start: u32, range_base: u64, residue: u8) -> u64 {
        let p = self.prime as u64;
        let shift = (range_base % p + residue as u64) % p;
        let target = (start as u64 % p + p - shift) % p;
        target * self.inverse as u64 % p
    }
}

/// Per-prime starting multiples split the way [`crate::SieveSession::init`]
/// takes them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StartingMultiples {
    /// Entries at and after the small-prime cutoff.
    pub large: Vec<u32>,
    /// Entries before the small-prime cutoff.
    pub small: Vec<u32>,
}

/// Immutable, explicitly constructed sieving prime table.
///
/// The small/large classification is an index cutoff chosen by the session
/// configuration, so the same table can be shared by sessions tuned
/// differently.
#[derive(Clone, Debug)]
pub struct PrimeTable {
    entries: Vec<PrimeEntry>,
}

impl PrimeTable {
    /// Build a table from parallel prime / inverse slices.
    pub fn new(primes: &[u32], inverses: &[u32]) -> Result<Self> {
        if primes.len() != inverses.len() {
            return Err(SieveError::InvalidTable {
                message: format!(
                    "{} primes but {} modular inverses",
                    primes.len(),
                    inverses.len()
                ),
            });
        }
        let mut entries = Vec::with_capacity(primes.len());
        for (&prime, &inverse) in primes.iter().zip(inverses) {
            if prime <= 5 {
                return Err(SieveError::InvalidTable {
                    message: format!("prime {} is excluded by the wheel", prime),
                });
            }
            if (WHEEL * inverse as u64) % prime as u64 != 1 {
                return Err(SieveError::InvalidTable {
                    message: format!("{} is not the inverse of 30 mod {}", inverse, prime),
                });
            }
            entries.push(PrimeEntry { prime, inverse });
        }
        Ok(PrimeTable { entries })
    }

    /// All primes in `7..=limit` with their inverses.
    pub fn generate(limit: u32) -> Self {
        let entries = generate_primes(limit as u64)
            .into_iter()
            .filter(|&p| p > 5)
            .map(|p| PrimeEntry {
                prime: p as u32,
                inverse: wheel_inverse(p as u32),
            })
            .collect();
        PrimeTable { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PrimeEntry] {
        &self.entries
    }

    /// Split into (small, large) at `small_count`, clamped to the table size.
    pub fn split(&self, small_count: usize) -> (&[PrimeEntry], &[PrimeEntry]) {
        self.entries.split_at(small_count.min(self.entries.len()))
    }

    pub fn largest(&self) -> Option<u32> {
        self.entries.last().map(|e| e.prime)
    }

    /// Starting multiples `(-base) mod p` for every prime in the table.
    pub fn starting_multiples(&self, base: &Integer, small_count: usize) -> StartingMultiples {
        let start = |e: &PrimeEntry| {
            let r = base.mod_u(e.prime);
            (e.prime - r) % e.prime
        };
        let (small, large) = self.split(small_count);
        StartingMultiples {
            large: large.iter().map(start).collect(),
            small: small.iter().map(start).collect(),
        }
    }
}

/// 30⁻¹ mod p via Fermat's little theorem. Requires p prime and p > 5.
pub fn wheel_inverse(p: u32) -> u32 {
    pow_mod(WHEEL, p as u64 - 2, p as u64) as u32
}

/// Modular exponentiation: base^exp mod modulus.
/// Uses u128 intermediates to avoid overflow for moduli up to ~2^63.
pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result: u64 = 1;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result as u128 * base as u128 % modulus as u128) as u64;
        }
        exp >>= 1;
        base = (base as u128 * base as u128 % modulus as u128) as u64;
    }
    result
}

/// Generate all primes up to `limit` using a wheel-30 sieve.
///
/// Only residues coprime to 30 are stored, one bit each, eight per byte.
pub fn generate_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return vec![];
    }
    if limit < 7 {
        return [2, 3, 5].iter().copied().filter(|&p| p <= limit).collect();
    }

    let limit = limit as usize;
    let num_segments = limit / 30 + 1;
    let mut sieve = vec![0xFFu8; num_segments];

    let sqrt_limit = (limit as f64).sqrt() as usize + 1;
    for seg in 0..num_segments {
        for (idx, &ri) in RESIDUES.iter().enumerate() {
            let n = seg * 30 + ri as usize;
            if n < 7 || n > sqrt_limit {
                continue;
            }
            if sieve[seg] & (1 << idx) == 0 {
                continue;
            }
            let mut m = n * n;
            while m <= limit {
                if let Some(bit) = crate::wheel::offset_bit(m as u64) {
                    sieve[bit / 8] &= !(1 << (bit % 8));
                }
                m += 2 * n;
            }
        }
    }

    let mut primes = Vec::with_capacity(estimate_prime_count(limit));
    primes.extend_from_slice(&[2, 3, 5]);
    for (seg, &byte) in sieve.iter().enumerate() {
        if byte == 0 {
            continue;
        }
        for (bit_idx, &r) in RESIDUES.iter().enumerate() {
            if byte & (1 << bit_idx) != 0 {
                let n = seg * 30 + r as usize;
                if n > 5 && n <= limit {
                    primes.push(n as u64);
                }
            }
        }
    }
    primes
}

fn estimate_prime_count(n: usize) -> usize {
    if n < 10 {
        return 4;
    }
    let nf = n as f64;
    (1.3 * nf / nf.ln()) as usize
}
